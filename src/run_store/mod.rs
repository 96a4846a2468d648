//! Run Store (C4.2): durable, append-only run records under
//! `<repo>/.huskycat/runs/` (`spec.md` §4.2, §6).
pub mod gate;
pub mod record;

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sysinfo::{Pid, System};
use tracing::warn;

use crate::error::RunStoreError;
pub use gate::Decision;
pub use record::{OverallStatus, RunRecord, ToolResult};

/// Default retention window for finished run directories, in days. The Open
/// Question in `spec.md` §9 resolves this as "default but configurable" —
/// callers may override via [`RunStore::with_retention_days`].
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// A handle to a run that is open for appending results.
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// Identifier of this run, also its directory name.
    pub run_id: String,
    /// Absolute path to this run's directory.
    pub dir: PathBuf,
}

/// Result of attempting to open a new run.
#[derive(Debug)]
pub enum OpenOutcome {
    /// A fresh run was created and is ready to accept results.
    Started(RunHandle),
    /// Another run is already in flight for this repository (its owning
    /// process is still alive); the caller should not start a second one.
    AlreadyInFlight(RunRecord),
}

/// Manages the on-disk run history for one repository.
#[derive(Debug, Clone)]
pub struct RunStore {
    repo_root: PathBuf,
    retention_days: i64,
}

impl RunStore {
    /// Open a store rooted at `repo_root`, using the default retention window.
    #[must_use]
    pub fn new(repo_root: PathBuf) -> Self {
        Self {
            repo_root,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Override the retention window (days) used by [`RunStore::open`].
    #[must_use]
    pub const fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// The repository root this store is rooted at.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn runs_dir(&self) -> PathBuf {
        self.repo_root.join(".huskycat").join("runs")
    }

    fn pids_dir(&self) -> PathBuf {
        self.runs_dir().join("pids")
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(run_id)
    }

    fn latest_pointer_path(&self) -> PathBuf {
        self.runs_dir().join("latest")
    }

    /// Start a new run over `files`, performing the retention sweep first.
    ///
    /// Refuses to start a second run if an in-flight record's owning
    /// process is still alive, returning [`OpenOutcome::AlreadyInFlight`]
    /// instead (`spec.md` §4.2 "at most one in-flight record").
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError`] if the run directory cannot be created or
    /// the initial record cannot be written.
    pub fn open(&self, files: &[String]) -> Result<OpenOutcome, RunStoreError> {
        fs::create_dir_all(self.runs_dir()).map_err(|e| RunStoreError::AppendFailed {
            run_id: "<init>".to_string(),
            source: e,
        })?;
        fs::create_dir_all(self.pids_dir()).map_err(|e| RunStoreError::AppendFailed {
            run_id: "<init>".to_string(),
            source: e,
        })?;

        self.sweep();

        if let Some(existing) = self.latest() {
            if existing.is_in_progress() && process_is_alive(existing.pid) {
                return Ok(OpenOutcome::AlreadyInFlight(existing));
            }
        }

        let run_id = new_run_id();
        let dir = self.run_dir(&run_id);
        fs::create_dir_all(&dir).map_err(|e| RunStoreError::AppendFailed {
            run_id: run_id.clone(),
            source: e,
        })?;

        let record = RunRecord {
            run_id: run_id.clone(),
            started_at: Utc::now(),
            finished_at: None,
            overall_status: OverallStatus::InProgress,
            per_tool: Vec::new(),
            files: files.to_vec(),
            pid: std::process::id(),
        };
        write_record_atomic(&dir, &record)?;
        self.mark_pid(record.pid, &run_id)?;
        self.set_latest(&run_id)?;

        Ok(OpenOutcome::Started(RunHandle { run_id, dir }))
    }

    /// Append one tool's result to an open run.
    ///
    /// I/O failures here are logged and swallowed rather than propagated:
    /// losing one tool's record must not abort an otherwise-successful run.
    pub fn append_result(&self, handle: &RunHandle, result: ToolResult) {
        if let Err(e) = self.try_append(handle, result) {
            warn!(run_id = %handle.run_id, error = %e, "failed to append tool result");
        }
    }

    fn try_append(&self, handle: &RunHandle, result: ToolResult) -> Result<(), RunStoreError> {
        let mut record = read_record(&handle.dir.join("record.json"))?;
        record.per_tool.push(result);
        write_record_atomic(&handle.dir, &record)
    }

    /// Finalize a run with its overall status.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::FinalizeFailed`] if the final record cannot
    /// be written; this is fatal since an unfinalized run permanently blocks
    /// future gate decisions.
    pub fn finalize(&self, handle: &RunHandle, overall_status: OverallStatus) -> Result<(), RunStoreError> {
        let mut record =
            read_record(&handle.dir.join("record.json")).map_err(|e| RunStoreError::FinalizeFailed {
                run_id: handle.run_id.clone(),
                source: io_source(&e),
            })?;
        record.finished_at = Some(Utc::now());
        record.overall_status = overall_status;
        write_record_atomic(&handle.dir, &record).map_err(|e| RunStoreError::FinalizeFailed {
            run_id: handle.run_id.clone(),
            source: io_source(&e),
        })?;
        let _ = fs::remove_file(self.pids_dir().join(record.pid.to_string()));
        Ok(())
    }

    /// The most recent run record (by the `latest` pointer), if any run has
    /// ever started.
    #[must_use]
    pub fn latest(&self) -> Option<RunRecord> {
        let run_id = fs::read_to_string(self.latest_pointer_path()).ok()?;
        read_record(&self.run_dir(run_id.trim()).join("record.json")).ok()
    }

    /// Decide whether a blocking consumer should proceed, per
    /// [`gate::decide`].
    #[must_use]
    pub fn should_gate(&self, interactive: bool) -> Decision {
        gate::decide(self.latest().as_ref(), interactive)
    }

    /// Reclassify in-flight records whose owning process has died as
    /// `Aborted`, and drop finished run directories past the retention
    /// window. Safe to call with no prior runs (a no-op).
    pub fn reclaim_orphans(&self) {
        self.sweep();
    }

    /// Rebind an open run's owning pid, e.g. after the fork controller hands
    /// an in-flight run off from the short-lived parent to the detached
    /// child that actually does the work. Without this, `should_gate` and
    /// orphan reclamation would judge the run's liveness by a pid that exits
    /// within milliseconds, not the pid still doing the validating.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError`] if the record cannot be re-read or rewritten.
    pub fn rebind_pid(&self, handle: &RunHandle, new_pid: u32) -> Result<(), RunStoreError> {
        let mut record = read_record(&handle.dir.join("record.json"))?;
        let old_pid = record.pid;
        record.pid = new_pid;
        write_record_atomic(&handle.dir, &record)?;
        let _ = fs::remove_file(self.pids_dir().join(old_pid.to_string()));
        self.mark_pid(new_pid, &handle.run_id)
    }

    fn mark_pid(&self, pid: u32, run_id: &str) -> Result<(), RunStoreError> {
        fs::write(self.pids_dir().join(pid.to_string()), run_id).map_err(|e| {
            RunStoreError::AppendFailed {
                run_id: run_id.to_string(),
                source: e,
            }
        })
    }

    fn set_latest(&self, run_id: &str) -> Result<(), RunStoreError> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".latest-")
            .tempfile_in(self.runs_dir())
            .map_err(|e| RunStoreError::AppendFailed {
                run_id: run_id.to_string(),
                source: e,
            })?;
        tmp.write_all(run_id.as_bytes())
            .map_err(|e| RunStoreError::AppendFailed {
                run_id: run_id.to_string(),
                source: e,
            })?;
        tmp.persist(self.latest_pointer_path())
            .map_err(|e| RunStoreError::AppendFailed {
                run_id: run_id.to_string(),
                source: e.error,
            })
    }

    /// Reclassify abandoned in-flight records (owning process no longer
    /// alive) as `Aborted`, and delete finished run directories older than
    /// the retention window.
    fn sweep(&self) {
        let Ok(entries) = fs::read_dir(self.runs_dir()) else {
            return;
        };
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);

        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_dir() || path.file_name().is_some_and(|n| n == "pids") {
                continue;
            }
            let record_path = path.join("record.json");
            let Ok(mut record) = read_record(&record_path) else {
                continue;
            };

            if record.is_in_progress() && !process_is_alive(record.pid) {
                record.finished_at = Some(Utc::now());
                record.overall_status = OverallStatus::Aborted;
                let _ = write_record_atomic(&path, &record);
                let _ = fs::remove_file(self.pids_dir().join(record.pid.to_string()));
            }

            if !record.is_in_progress() && record.started_at < cutoff {
                let _ = fs::remove_dir_all(&path);
            }
        }
    }
}

fn new_run_id() -> String {
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S%6f"), std::process::id())
}

fn process_is_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_all();
    system.process(Pid::from_u32(pid)).is_some()
}

fn read_record(path: &Path) -> Result<RunRecord, RunStoreError> {
    let contents = fs::read_to_string(path).map_err(|e| RunStoreError::ReadFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| RunStoreError::ReadFailed {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

fn write_record_atomic(dir: &Path, record: &RunRecord) -> Result<(), RunStoreError> {
    let contents = serde_json::to_string_pretty(record).map_err(|e| RunStoreError::AppendFailed {
        run_id: record.run_id.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".record-")
        .tempfile_in(dir)
        .map_err(|e| RunStoreError::AppendFailed {
            run_id: record.run_id.clone(),
            source: e,
        })?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| RunStoreError::AppendFailed {
            run_id: record.run_id.clone(),
            source: e,
        })?;
    tmp.persist(dir.join("record.json"))
        .map_err(|e| RunStoreError::AppendFailed {
            run_id: record.run_id.clone(),
            source: e.error,
        })
}

fn io_source(e: &RunStoreError) -> std::io::Error {
    match e {
        RunStoreError::AppendFailed { source, .. }
        | RunStoreError::FinalizeFailed { source, .. }
        | RunStoreError::ReadFailed { source, .. } => {
            std::io::Error::new(source.kind(), source.to_string())
        }
    }
}
