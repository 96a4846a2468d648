//! Mode Adapter & Fork Controller (C6): translates an invocation mode into a
//! selection profile, output format, and concurrency posture, and — for
//! `GitHooksNonBlocking` — detaches the scheduler into a background child
//! process (`spec.md` §4.6).
use std::env;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::registry::SelectionProfile;
use crate::run_store::{Decision, OverallStatus, RunRecord, RunStore};
use crate::scheduler::{default_max_workers, process_group};

/// Which surface invoked the engine. Only [`Mode::GitHooksNonBlocking`]
/// changes the execution topology; the rest select different output shapes
/// and defaults over the same in-process scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A git hook that blocks the git operation on failure.
    GitHooksBlocking,
    /// A git hook that returns immediately and validates in the background.
    GitHooksNonBlocking,
    /// Continuous integration: full coverage, structured report artifact.
    CI,
    /// Direct interactive CLI invocation.
    CLI,
    /// A scripted pipeline step: full coverage, single JSON document on stdout.
    Pipeline,
    /// Driven programmatically by a Model Context Protocol collaborator.
    MCP,
}

impl Mode {
    /// Parse a mode name from a CLI flag or environment variable value.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "githooksblocking" | "git-hooks-blocking" => Some(Self::GitHooksBlocking),
            "githooksnonblocking" | "git-hooks-non-blocking" => Some(Self::GitHooksNonBlocking),
            "ci" => Some(Self::CI),
            "cli" => Some(Self::CLI),
            "pipeline" => Some(Self::Pipeline),
            "mcp" => Some(Self::MCP),
            _ => None,
        }
    }
}

/// The execution posture a mode resolves to: which tools to run, whether to
/// cancel on first failure, and how many may run concurrently.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Selection profile to hand to [`crate::registry::Registry::select`].
    pub profile: SelectionProfile,
    /// Whether a failing tool should cancel tools not yet dispatched.
    pub fail_fast: bool,
    /// Worker cap override; `None` means "use the request's existing value".
    pub max_workers: Option<usize>,
}

/// Resolve the selection-profile/fail-fast/concurrency defaults for `mode`,
/// per the table in `spec.md` §4.6. `configured` is the tool list from
/// `.huskycat.yaml`, used only by [`Mode::CLI`]'s Configured profile.
#[must_use]
pub fn plan_for(mode: Mode) -> ExecutionPlan {
    match mode {
        Mode::GitHooksBlocking => ExecutionPlan {
            profile: SelectionProfile::Fast,
            fail_fast: true,
            max_workers: None,
        },
        Mode::GitHooksNonBlocking => ExecutionPlan {
            profile: SelectionProfile::All,
            fail_fast: false,
            max_workers: Some(default_max_workers()),
        },
        Mode::CI | Mode::Pipeline => ExecutionPlan {
            profile: SelectionProfile::All,
            fail_fast: false,
            max_workers: None,
        },
        Mode::CLI => ExecutionPlan {
            profile: SelectionProfile::Configured,
            fail_fast: false,
            max_workers: None,
        },
        Mode::MCP => ExecutionPlan {
            profile: SelectionProfile::All,
            fail_fast: false,
            max_workers: None,
        },
    }
}

/// Output shape rendered from a finalized run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The shortest failing-tool-plus-first-error listing, for blocking hooks.
    Minimal,
    /// A JUnit-like structured report, for CI artifact consumption.
    JUnit,
    /// A human-readable multi-line summary, for interactive CLI use.
    Human,
    /// A single JSON document, for scripted pipeline steps.
    Json,
    /// JSON-RPC is rendered by the MCP collaborator itself; this crate emits
    /// the same [`OutputFormat::Json`] document for it to wrap.
    JsonRpc,
}

/// The output format a mode renders, per `spec.md` §4.6/§7.
#[must_use]
pub const fn output_format(mode: Mode) -> OutputFormat {
    match mode {
        Mode::GitHooksBlocking => OutputFormat::Minimal,
        Mode::GitHooksNonBlocking => OutputFormat::Minimal,
        Mode::CI => OutputFormat::JUnit,
        Mode::CLI => OutputFormat::Human,
        Mode::Pipeline => OutputFormat::Json,
        Mode::MCP => OutputFormat::JsonRpc,
    }
}

/// Render `record` in `format`. Pure function of the finalized run record;
/// the scheduler never sees or branches on output format.
#[must_use]
pub fn render(record: &RunRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Minimal => render_minimal(record),
        OutputFormat::JUnit => render_junit(record),
        OutputFormat::Human => render_human(record),
        OutputFormat::Json | OutputFormat::JsonRpc => {
            serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

fn render_minimal(record: &RunRecord) -> String {
    let mut lines = Vec::new();
    for tool in &record.per_tool {
        if tool.status == crate::logging::ToolOutcome::Failed {
            let first_line = tool.output.lines().next().unwrap_or("");
            lines.push(format!("{}: {first_line}", tool.tool));
        }
    }
    lines.join("\n")
}

fn render_junit(record: &RunRecord) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<testsuite name=\"huskycat\" tests=\"{}\">\n",
        record.per_tool.len()
    ));
    for tool in &record.per_tool {
        body.push_str(&format!("  <testcase name=\"{}\">", tool.tool));
        if tool.status == crate::logging::ToolOutcome::Failed {
            body.push_str(&format!(
                "\n    <failure message=\"{} error(s)\"/>\n  ",
                tool.error_count
            ));
        }
        body.push_str("</testcase>\n");
    }
    body.push_str("</testsuite>\n");
    body
}

fn render_human(record: &RunRecord) -> String {
    let mut lines = vec![format!("run {} — {:?}", record.run_id, record.overall_status)];
    for tool in &record.per_tool {
        lines.push(format!(
            "  {:<16} {:?} ({} errors, {} warnings)",
            tool.tool, tool.status, tool.error_count, tool.warning_count
        ));
    }
    lines.join("\n")
}

/// Read `HUSKYCAT_MODE`, if set and parseable.
#[must_use]
pub fn mode_from_env() -> Option<Mode> {
    env::var("HUSKYCAT_MODE").ok().and_then(|v| Mode::parse(&v))
}

/// Whether `HUSKYCAT_NONBLOCKING` is set to a truthy value.
#[must_use]
pub fn nonblocking_forced() -> bool {
    is_truthy_env("HUSKYCAT_NONBLOCKING")
}

/// Whether `SKIP_HOOKS` is set to a truthy value; GitHooks invocations must
/// exit 0 immediately without running the scheduler in this case.
#[must_use]
pub fn skip_hooks() -> bool {
    is_truthy_env("SKIP_HOOKS")
}

/// Whether `HUSKYCAT_AUTO_APPROVE` is set, treating interactive prompts as yes.
#[must_use]
pub fn auto_approve() -> bool {
    is_truthy_env("HUSKYCAT_AUTO_APPROVE")
}

fn is_truthy_env(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

/// Outcome of the parent-side fork-controller entry point.
#[derive(Debug)]
pub enum ForkOutcome {
    /// A child was spawned; the parent should exit 0 immediately.
    Detached,
    /// The gate blocked without an override; the parent should print
    /// `reason` and exit nonzero.
    Blocked {
        /// Human-readable reason for the block, to print to stderr.
        reason: String,
    },
    /// Another run is already in flight; no new child is spawned.
    AlreadyInFlight,
}

/// Parent-side half of `GitHooksNonBlocking`. Reclaims orphaned in-flight
/// records, consults [`RunStore::should_gate`], and — if allowed — spawns a
/// detached child re-invoking `current_exe` with `--internal-child
/// <run-id>`, then returns immediately without touching the registry,
/// resolver, or scheduler (the ≤100 ms parent budget from `spec.md` §4.6).
///
/// # Errors
///
/// Returns an I/O error only if the child process could not be spawned or
/// the initial run record could not be written; gate/in-flight outcomes are
/// reported through [`ForkOutcome`], not `Err`.
pub fn fork_and_detach(
    store: &RunStore,
    current_exe: &Path,
    files: &[String],
    extra_args: &[OsString],
    interactive: bool,
) -> io::Result<ForkOutcome> {
    store.reclaim_orphans();

    match store.should_gate(interactive) {
        Decision::Allow => {}
        Decision::Block => {
            return Ok(ForkOutcome::Blocked {
                reason: "previous validation run failed; fix it or pass --fork to retry"
                    .to_string(),
            });
        }
        Decision::Prompt => {
            if !auto_approve() {
                return Ok(ForkOutcome::Blocked {
                    reason: "previous validation run is unresolved; rerun interactively to decide"
                        .to_string(),
                });
            }
        }
    }

    let handle = match store
        .open(files)
        .map_err(|e| io::Error::other(e.to_string()))?
    {
        crate::run_store::OpenOutcome::Started(handle) => handle,
        crate::run_store::OpenOutcome::AlreadyInFlight(_) => {
            return Ok(ForkOutcome::AlreadyInFlight);
        }
    };

    let log_path = handle.dir.join("log");
    let log_file = File::create(&log_path)?;
    let log_file_err = log_file.try_clone()?;

    let mut command = Command::new(current_exe);
    command
        .arg("validate")
        .arg("--internal-child")
        .arg(&handle.run_id)
        .args(extra_args)
        .current_dir(store.repo_root())
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_file_err));

    detach_pre_exec(&mut command);
    let child = command.spawn()?;

    // The record was opened under the parent's own pid; rebind it to the
    // detached child now that it exists, so liveness checks track the
    // process that is actually still running after the parent exits.
    if store.rebind_pid(&handle, child.id()).is_err() {
        tracing::warn!(run_id = %handle.run_id, "failed to rebind run record to child pid");
    }

    Ok(ForkOutcome::Detached)
}

#[cfg(unix)]
fn detach_pre_exec(command: &mut Command) {
    use std::os::unix::process::CommandExt as _;
    // SAFETY: `detach_from_tty` only calls `setsid`/`setpgid`, both
    // async-signal-safe and touching only the child's own session/group.
    #[allow(unsafe_code)]
    unsafe {
        command.pre_exec(process_group::detach_from_tty);
    }
}

#[cfg(not(unix))]
fn detach_pre_exec(_command: &mut Command) {}

/// Child-side entry point for `--internal-child <run-id>`: finalize the run
/// record with `overall_status` once the scheduler has completed, returning
/// the process exit code (0 for Success, nonzero otherwise) though no one is
/// watching in the non-blocking path.
///
/// # Errors
///
/// Returns [`crate::error::RunStoreError`] if the record cannot be finalized.
pub fn finalize_child_run(
    store: &RunStore,
    repo_root: &Path,
    run_id: &str,
    overall_status: OverallStatus,
) -> Result<i32, crate::error::RunStoreError> {
    let handle = crate::run_store::RunHandle {
        run_id: run_id.to_string(),
        dir: repo_root
            .join(".huskycat")
            .join("runs")
            .join(run_id),
    };
    store.finalize(&handle, overall_status)?;
    Ok(match overall_status {
        OverallStatus::Success => 0,
        _ => 1,
    })
}

/// Ensure the run store's directories exist before the fork controller's
/// first touch; mirrors `RunStore::open`'s own directory creation so a
/// `should_gate` probe works even before any run has ever started.
///
/// # Errors
///
/// Returns the underlying I/O error if the directories cannot be created.
pub fn ensure_store_dirs(repo_root: &Path) -> io::Result<()> {
    fs::create_dir_all(repo_root.join(".huskycat").join("runs").join("pids"))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::run_store::RunStore;

    #[test]
    fn mode_parse_is_case_insensitive() {
        assert_eq!(Mode::parse("ci"), Some(Mode::CI));
        assert_eq!(Mode::parse("CI"), Some(Mode::CI));
        assert_eq!(Mode::parse("GitHooksNonBlocking"), Some(Mode::GitHooksNonBlocking));
        assert_eq!(Mode::parse("bogus"), None);
    }

    #[test]
    fn git_hooks_blocking_is_fast_and_fail_fast() {
        let plan = plan_for(Mode::GitHooksBlocking);
        assert!(matches!(plan.profile, SelectionProfile::Fast));
        assert!(plan.fail_fast);
    }

    #[test]
    fn non_blocking_uses_all_profile_and_cpu_workers() {
        let plan = plan_for(Mode::GitHooksNonBlocking);
        assert!(matches!(plan.profile, SelectionProfile::All));
        assert!(!plan.fail_fast);
        assert!(plan.max_workers.is_some());
    }

    #[test]
    fn minimal_output_lists_only_failed_tools() {
        let record = RunRecord {
            run_id: "r1".to_string(),
            started_at: chrono::Utc::now(),
            finished_at: Some(chrono::Utc::now()),
            overall_status: OverallStatus::Failed,
            per_tool: vec![crate::run_store::ToolResult {
                tool: "clippy".to_string(),
                status: crate::logging::ToolOutcome::Failed,
                started_at: chrono::Utc::now(),
                duration_ms: 10,
                exit_code: Some(1),
                error_count: 1,
                warning_count: 0,
                output: "error: unused variable".to_string(),
                skip_reason: None,
            }],
            files: vec![],
            pid: 1,
        };
        let out = render(&record, OutputFormat::Minimal);
        assert_eq!(out, "clippy: error: unused variable");
    }

    #[test]
    fn fork_and_detach_spawns_a_child_with_no_prior_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RunStore::new(dir.path().to_path_buf());
        ensure_store_dirs(dir.path()).expect("dirs");
        let outcome = fork_and_detach(&store, Path::new("/bin/true"), &[], &[], false)
            .expect("fork_and_detach succeeds with no prior run");
        assert!(matches!(outcome, ForkOutcome::Detached));
    }

    #[test]
    fn fork_and_detach_spawns_a_child_after_a_successful_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RunStore::new(dir.path().to_path_buf());
        ensure_store_dirs(dir.path()).expect("dirs");

        let handle = match store.open(&[]).expect("open") {
            crate::run_store::OpenOutcome::Started(handle) => handle,
            crate::run_store::OpenOutcome::AlreadyInFlight(_) => panic!("unexpected in-flight"),
        };
        store
            .finalize(&handle, OverallStatus::Success)
            .expect("finalize");

        let outcome = fork_and_detach(&store, Path::new("/bin/true"), &[], &[], false)
            .expect("fork_and_detach succeeds");
        assert!(matches!(outcome, ForkOutcome::Detached));

        // The new in-flight record must be rebound away from the parent's own
        // pid (std::process::id(), assigned by RunStore::open) to the
        // spawned child's pid.
        let record = store.latest().expect("in-flight record present");
        assert!(record.is_in_progress());
        assert_ne!(record.pid, std::process::id());
    }
}
