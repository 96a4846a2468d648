//! The `validate` command: wires the Mode Adapter, Validator Registry, Tool
//! Resolver, DAG Scheduler, and Run Store together for one invocation.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::git_scope;
use crate::cli::ValidateOpts;
use crate::config::HuskycatConfig;
use crate::logging::Logger;
use crate::modes::{self, ExecutionPlan, Mode, OutputFormat};
use crate::platform::Platform;
use crate::registry::{builtin, Registry};
use crate::resolver::Resolver;
use crate::run_store::{OpenOutcome, OverallStatus, RunStore};
use crate::scheduler::{self, RunRequest, ToolSelection};
use crate::tui::LoggerProgressSink;

/// Run the `validate` command, returning the process exit code.
///
/// # Errors
///
/// Returns an error for configuration problems (exit code 3 territory) or
/// unexpected I/O/internal failures (exit code 4 territory); per-tool
/// failures are reported through the overall status, not `Err`.
pub fn run(opts: &ValidateOpts, log: &Arc<Logger>) -> Result<i32> {
    let repo_root = git_scope::discover_repo_root(None)?;

    if let Some(run_id) = &opts.internal_child {
        return run_child(&repo_root, run_id, opts);
    }

    let config = HuskycatConfig::load(&repo_root)?;
    for warning in config.validate() {
        log.warn(&warning);
    }

    let mode = resolve_mode(opts, &config);
    let hook_mode = matches!(mode, Mode::GitHooksBlocking | Mode::GitHooksNonBlocking);

    if hook_mode && modes::skip_hooks() {
        return Ok(0);
    }

    let files = resolve_files(opts, &repo_root)?;
    let retention_days = config.retention_days(crate::run_store::DEFAULT_RETENTION_DAYS);

    if matches!(mode, Mode::GitHooksNonBlocking) || opts.fork {
        return run_forked(&repo_root, &files, log, retention_days);
    }

    let request = build_request(opts, &config, mode, &repo_root, files);
    run_inline(&repo_root, &request, mode, log, retention_days)
}

fn resolve_mode(opts: &ValidateOpts, config: &HuskycatConfig) -> Mode {
    if let Some(name) = &opts.mode {
        if let Some(mode) = Mode::parse(name) {
            return mode;
        }
    }
    if let Some(mode) = modes::mode_from_env() {
        return mode;
    }
    if modes::nonblocking_forced() || config.non_blocking_hooks {
        return Mode::GitHooksNonBlocking;
    }
    Mode::CLI
}

fn resolve_files(opts: &ValidateOpts, repo_root: &Path) -> Result<Vec<PathBuf>> {
    if !opts.files.is_empty() {
        return Ok(opts.files.clone());
    }
    if opts.staged {
        return git_scope::staged_files(repo_root);
    }
    if opts.all {
        return git_scope::all_tracked_files(repo_root);
    }
    git_scope::staged_files(repo_root)
}

fn build_request(
    opts: &ValidateOpts,
    config: &HuskycatConfig,
    mode: Mode,
    repo_root: &Path,
    files: Vec<PathBuf>,
) -> RunRequest {
    let ExecutionPlan {
        profile,
        fail_fast: default_fail_fast,
        max_workers: plan_workers,
    } = modes::plan_for(mode);

    let configured = config.tools.as_ref().map(|names| names.iter().cloned().collect::<HashSet<_>>());

    RunRequest {
        files,
        tool_selection: ToolSelection::Profile { profile, configured },
        fix: opts.fix,
        fail_fast: opts.fail_fast_override().unwrap_or(config.fail_fast || default_fail_fast),
        max_workers: opts
            .workers
            .or(plan_workers)
            .or(config.max_workers)
            .unwrap_or_else(scheduler::default_max_workers),
        per_tool_timeout: opts
            .timeout
            .map_or_else(|| config.per_tool_timeout(Duration::from_secs(120)), Duration::from_secs),
        repo_root: repo_root.to_path_buf(),
        interactive: is_interactive(),
    }
}

fn is_interactive() -> bool {
    use std::io::IsTerminal as _;
    std::io::stdin().is_terminal()
}

fn run_inline(
    repo_root: &Path,
    request: &RunRequest,
    mode: Mode,
    log: &Arc<Logger>,
    retention_days: i64,
) -> Result<i32> {
    let registry = Registry::new(builtin::builtin_descriptors()?)?;
    let platform = Platform::detect();
    let resolver = Resolver::new(platform, tool_cache_dir()?);
    let store = RunStore::new(repo_root.to_path_buf()).with_retention_days(retention_days);

    let files_rel: Vec<String> = request
        .files
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    let handle = match store.open(&files_rel).context("failed to open a run")? {
        OpenOutcome::Started(handle) => handle,
        OpenOutcome::AlreadyInFlight(existing) => {
            log.warn(&format!("a validation run ({}) is already in flight", existing.run_id));
            return Ok(exit_code_for(OverallStatus::Aborted));
        }
    };

    let sink = LoggerProgressSink::new(&**log);
    let overall_status = scheduler::run(&registry, &resolver, request, &store, &handle, &sink)
        .context("scheduler encountered an internal error")?;
    store
        .finalize(&handle, overall_status)
        .context("failed to finalize the run record")?;

    log.print_summary();

    if let Some(record) = store.latest() {
        emit_output(&record, mode, repo_root)?;
    }

    Ok(exit_code_for(overall_status))
}

fn run_forked(
    repo_root: &Path,
    files: &[PathBuf],
    log: &Arc<Logger>,
    retention_days: i64,
) -> Result<i32> {
    modes::ensure_store_dirs(repo_root)?;
    let store = RunStore::new(repo_root.to_path_buf()).with_retention_days(retention_days);
    let current_exe = std::env::current_exe().context("failed to resolve current executable")?;
    let files_rel: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();

    match modes::fork_and_detach(&store, &current_exe, &files_rel, &[], false)? {
        modes::ForkOutcome::Detached | modes::ForkOutcome::AlreadyInFlight => Ok(0),
        modes::ForkOutcome::Blocked { reason } => {
            log.error(&reason);
            Ok(1)
        }
    }
}

fn run_child(repo_root: &Path, run_id: &str, opts: &ValidateOpts) -> Result<i32> {
    let config = HuskycatConfig::load(repo_root)?;
    let registry = Registry::new(builtin::builtin_descriptors()?)?;
    let platform = Platform::detect();
    let resolver = Resolver::new(platform, tool_cache_dir()?);
    let store = RunStore::new(repo_root.to_path_buf())
        .with_retention_days(config.retention_days(crate::run_store::DEFAULT_RETENTION_DAYS));

    let files = resolve_files(opts, repo_root)?;
    let plan = modes::plan_for(Mode::GitHooksNonBlocking);
    let request = RunRequest {
        files,
        tool_selection: ToolSelection::Profile {
            profile: plan.profile,
            configured: None,
        },
        fix: opts.fix,
        fail_fast: plan.fail_fast,
        max_workers: plan.max_workers.unwrap_or_else(scheduler::default_max_workers),
        per_tool_timeout: opts
            .timeout
            .map_or(Duration::from_secs(120), Duration::from_secs),
        repo_root: repo_root.to_path_buf(),
        interactive: false,
    };

    let handle = crate::run_store::RunHandle {
        run_id: run_id.to_string(),
        dir: repo_root.join(".huskycat").join("runs").join(run_id),
    };

    let overall_status =
        scheduler::run(&registry, &resolver, &request, &store, &handle, &scheduler::NullProgressSink)
            .context("scheduler encountered an internal error")?;

    modes::finalize_child_run(&store, repo_root, run_id, overall_status).map_err(Into::into)
}

fn emit_output(record: &crate::run_store::RunRecord, mode: Mode, repo_root: &Path) -> Result<()> {
    let format = modes::output_format(mode);
    let rendered = modes::render(record, format);
    match mode {
        Mode::GitHooksBlocking => {
            if record.overall_status == OverallStatus::Failed {
                eprintln!("{rendered}");
            }
        }
        Mode::GitHooksNonBlocking => {}
        Mode::CI => {
            let artifact_dir = repo_root.join(".huskycat");
            std::fs::create_dir_all(&artifact_dir).context("failed to create artifact directory")?;
            std::fs::write(artifact_dir.join("report.xml"), rendered)
                .context("failed to write CI report")?;
        }
        Mode::CLI | Mode::Pipeline | Mode::MCP => println!("{rendered}"),
    }
    Ok(())
}

/// Map an overall status to the process exit code, per `spec.md` §6.
const fn exit_code_for(status: OverallStatus) -> i32 {
    match status {
        OverallStatus::Success => 0,
        OverallStatus::Failed => 1,
        OverallStatus::Aborted | OverallStatus::InProgress => 2,
    }
}

fn tool_cache_dir() -> Result<PathBuf> {
    let base = std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    let dir = base.join("huskycat").join("tools");
    std::fs::create_dir_all(&dir).context("failed to create tool cache directory")?;
    Ok(dir)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_matches_spec_mapping() {
        assert_eq!(exit_code_for(OverallStatus::Success), 0);
        assert_eq!(exit_code_for(OverallStatus::Failed), 1);
        assert_eq!(exit_code_for(OverallStatus::Aborted), 2);
        assert_eq!(exit_code_for(OverallStatus::InProgress), 2);
    }

    #[test]
    fn resolve_mode_defaults_to_cli() {
        let opts = ValidateOpts {
            staged: false,
            all: true,
            files: vec![],
            fix: false,
            mode: None,
            fail_fast: false,
            no_fail_fast: false,
            workers: None,
            timeout: None,
            fork: false,
            internal_child: None,
        };
        let config = HuskycatConfig::default();
        assert!(matches!(resolve_mode(&opts, &config), Mode::CLI));
    }

    #[test]
    fn resolve_mode_honors_explicit_flag() {
        let opts = ValidateOpts {
            staged: false,
            all: true,
            files: vec![],
            fix: false,
            mode: Some("ci".to_string()),
            fail_fast: false,
            no_fail_fast: false,
            workers: None,
            timeout: None,
            fork: false,
            internal_child: None,
        };
        let config = HuskycatConfig::default();
        assert!(matches!(resolve_mode(&opts, &config), Mode::CI));
    }
}
