//! Phase 2 of the DAG Scheduler: dispatch each level's tools concurrently,
//! bounded by `max_workers`, honoring dependency skips, per-tool timeouts,
//! and fail-fast cancellation (`spec.md` §4.4, §5, §8).
use std::io::Read as _;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;

use super::graph::{CompletionTracker, Semaphore};
use super::levels::compute_levels;
use super::process_group;
use super::request::{RunRequest, ToolSelection};
use crate::error::InternalError;
use crate::logging::ToolOutcome;
use crate::registry::{ArgvToken, Registry, ToolDescriptor, ToolName};
use crate::resolver::{Resolution, Resolver};
use crate::run_store::{OverallStatus, RunHandle, RunStore, ToolResult};

/// Progress notifications emitted during dispatch, consumed by a
/// [`ProgressSink`] (the Progress TUI, or a no-op in non-interactive modes).
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A tool has been placed in a level and is waiting on dependencies/a
    /// worker slot.
    ToolQueued(ToolName),
    /// A tool's process has been dispatched.
    ToolStarted(ToolName),
    /// A tool reached a terminal outcome.
    ToolFinished(ToolName, ToolOutcome),
}

/// Receives [`ProgressEvent`]s as the scheduler runs.
pub trait ProgressSink: Send + Sync {
    /// Handle one event. Implementations must not block meaningfully; the
    /// scheduler calls this from worker threads.
    fn on_event(&self, event: ProgressEvent);
}

/// A [`ProgressSink`] that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Run every selected tool to completion, appending each result to
/// `run_store` as it lands, and return the run's overall status.
///
/// # Errors
///
/// Returns [`InternalError`] if level computation finds a cycle in the
/// selected subgraph — this indicates a bug, since the full registry was
/// already validated acyclic at construction.
pub fn run(
    registry: &Registry,
    resolver: &Resolver,
    request: &RunRequest,
    run_store: &RunStore,
    handle: &RunHandle,
    progress: &dyn ProgressSink,
) -> Result<OverallStatus, InternalError> {
    let selected = match &request.tool_selection {
        ToolSelection::Profile { profile, configured } => {
            registry.select(&request.files, *profile, configured.as_ref())
        }
        ToolSelection::Explicit(names) => names.clone(),
    };
    if selected.is_empty() {
        return Ok(OverallStatus::Success);
    }

    let dag = registry.subgraph(&selected);
    let levels = compute_levels(&dag)?;

    let tracker = CompletionTracker::new();
    let semaphore = Semaphore::new(request.max_workers.max(1));
    let cancelled = AtomicBool::new(false);
    let mut results = Vec::new();

    for level in &levels {
        for name in level {
            progress.on_event(ProgressEvent::ToolQueued(name.clone()));
        }

        let level_results: Vec<ToolResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = level
                .iter()
                .filter_map(|name| registry.get(name).map(|tool| (name, tool)))
                .map(|(name, tool)| {
                    let tracker = &tracker;
                    let semaphore = &semaphore;
                    let cancelled = &cancelled;
                    scope.spawn(move || {
                        dispatch_one(
                            tool,
                            request,
                            resolver,
                            tracker,
                            semaphore,
                            cancelled,
                            progress,
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().ok())
                .collect()
        });

        for result in level_results {
            let outcome = result.status;
            let name = result.tool.clone();
            run_store.append_result(handle, result.clone());
            tracker.mark_complete(name.clone(), outcome);
            progress.on_event(ProgressEvent::ToolFinished(name, outcome));
            if matches!(outcome, ToolOutcome::Failed | ToolOutcome::TimedOut) && request.fail_fast {
                cancelled.store(true, Ordering::SeqCst);
            }
            results.push(result);
        }
    }

    Ok(overall_status(&results, cancelled.load(Ordering::SeqCst)))
}

fn overall_status(results: &[ToolResult], cancelled: bool) -> OverallStatus {
    let any_failed = results
        .iter()
        .any(|r| matches!(r.status, ToolOutcome::Failed | ToolOutcome::TimedOut));
    if any_failed {
        OverallStatus::Failed
    } else if cancelled {
        OverallStatus::Aborted
    } else {
        OverallStatus::Success
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_one(
    tool: &ToolDescriptor,
    request: &RunRequest,
    resolver: &Resolver,
    tracker: &CompletionTracker,
    semaphore: &Semaphore,
    cancelled: &AtomicBool,
    progress: &dyn ProgressSink,
) -> ToolResult {
    let started_at = Utc::now();

    if cancelled.load(Ordering::SeqCst) {
        return skipped(tool, started_at, "run was cancelled (fail-fast)".to_string());
    }

    let dep_outcomes = tracker.wait_for_deps(&tool.depends_on);
    if let Some(failed_dep) = tool
        .depends_on
        .iter()
        .zip(dep_outcomes.iter())
        .find(|(_, outcome)| matches!(outcome, ToolOutcome::Failed | ToolOutcome::TimedOut | ToolOutcome::Skipped))
        .map(|(name, _)| name)
    {
        return skipped(tool, started_at, format!("dependency '{failed_dep}' did not succeed"));
    }

    let matched_files: Vec<PathBuf> = request
        .files
        .iter()
        .filter(|f| tool.matches(f))
        .cloned()
        .collect();
    let needs_files = tool
        .argv_template
        .iter()
        .any(|t| matches!(t, ArgvToken::FilePlaceholder | ArgvToken::FilesPlaceholder));
    if needs_files && matched_files.is_empty() {
        return ToolResult {
            tool: tool.name.clone(),
            status: ToolOutcome::NotApplicable,
            started_at,
            duration_ms: 0,
            exit_code: None,
            error_count: 0,
            warning_count: 0,
            output: String::new(),
            skip_reason: Some("no matching files".to_string()),
        };
    }

    let resolution = resolver.resolve(&tool.executable);
    let (program, prefix_args) = match resolution {
        Resolution::Found(path) => (path.to_string_lossy().into_owned(), Vec::new()),
        Resolution::Delegated(launcher) => (launcher.program, launcher.args),
        Resolution::NotFound => {
            return ToolResult {
                tool: tool.name.clone(),
                status: ToolOutcome::Failed,
                started_at,
                duration_ms: 0,
                exit_code: None,
                error_count: 1,
                warning_count: 0,
                output: format!("executable '{}' could not be resolved", tool.executable),
                skip_reason: None,
            };
        }
    };

    progress.on_event(ProgressEvent::ToolStarted(tool.name.clone()));
    let _permit = semaphore.acquire();

    let invocations = render_invocations(tool, &matched_files, request.fix);
    let mut combined_output = String::new();
    let mut worst_exit: Option<i32> = None;
    let mut timed_out = false;

    for argv in invocations {
        let mut full_args = prefix_args.clone();
        full_args.extend(argv);
        let (exit_code, output, did_time_out) = run_one(&program, &full_args, &request.repo_root, request.per_tool_timeout);
        combined_output.push_str(&output);
        combined_output.push('\n');
        timed_out = timed_out || did_time_out;
        if exit_code != Some(0) {
            worst_exit = exit_code.or(worst_exit).or(Some(1));
        }
    }

    let exit_success = worst_exit.is_none_or(|c| c == 0) && !timed_out;
    let (error_count, warning_count) = ToolDescriptor::parse_counts(&combined_output, exit_success);
    let status = if timed_out {
        ToolOutcome::TimedOut
    } else if exit_success && error_count == 0 {
        ToolOutcome::Success
    } else {
        ToolOutcome::Failed
    };

    ToolResult {
        tool: tool.name.clone(),
        status,
        started_at,
        duration_ms: u64::try_from(Utc::now().signed_duration_since(started_at).num_milliseconds().max(0))
            .unwrap_or(u64::MAX),
        exit_code: worst_exit,
        error_count,
        warning_count,
        output: crate::run_store::record::truncate_output(&combined_output),
        skip_reason: None,
    }
}

fn skipped(tool: &ToolDescriptor, started_at: chrono::DateTime<Utc>, reason: String) -> ToolResult {
    ToolResult {
        tool: tool.name.clone(),
        status: ToolOutcome::Skipped,
        started_at,
        duration_ms: 0,
        exit_code: None,
        error_count: 0,
        warning_count: 0,
        output: String::new(),
        skip_reason: Some(reason),
    }
}

/// Expand a tool's argv template into one or more concrete invocations.
///
/// `{file}` yields one invocation per matched file (run sequentially within
/// this tool); `{files…}` yields a single invocation with every matched file
/// appended; a template with neither yields exactly one invocation.
fn render_invocations(tool: &ToolDescriptor, matched_files: &[PathBuf], fix: bool) -> Vec<Vec<String>> {
    let per_file = tool
        .argv_template
        .iter()
        .any(|t| matches!(t, ArgvToken::FilePlaceholder));

    if per_file {
        matched_files
            .iter()
            .map(|file| render_argv(tool, Some(file), matched_files, fix))
            .collect()
    } else {
        vec![render_argv(tool, None, matched_files, fix)]
    }
}

fn render_argv(tool: &ToolDescriptor, file: Option<&PathBuf>, files: &[PathBuf], fix: bool) -> Vec<String> {
    let mut argv = Vec::with_capacity(tool.argv_template.len());
    for token in &tool.argv_template {
        match token {
            ArgvToken::Literal(value) => argv.push(value.clone()),
            ArgvToken::FilePlaceholder => {
                if let Some(file) = file {
                    argv.push(file.to_string_lossy().into_owned());
                }
            }
            ArgvToken::FilesPlaceholder => {
                argv.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));
            }
            ArgvToken::FixPlaceholder => {
                let flag = if fix { tool.fix_flag.as_ref() } else { tool.check_flag.as_ref() };
                if let Some(flag) = flag {
                    argv.push(flag.clone());
                }
            }
        }
    }
    argv
}

/// Spawn one invocation, capture combined stdout/stderr, and enforce
/// `timeout` via SIGTERM-then-SIGKILL against the child's process group.
fn run_one(program: &str, args: &[String], cwd: &std::path::Path, timeout: Duration) -> (Option<i32>, String, bool) {
    let mut command = Command::new(program);
    command.args(args).current_dir(cwd).stdout(Stdio::piped()).stderr(Stdio::piped());
    pre_exec_process_group(&mut command);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return (None, format!("failed to spawn '{program}': {e}"), false),
    };

    let out_buf = spawn_reader(child.stdout.take());
    let err_buf = spawn_reader(child.stderr.take());

    let timed_out = wait_with_timeout(&mut child, timeout);
    let exit_code = child.wait().ok().and_then(|s| s.code());

    let mut output = drain(out_buf);
    output.push_str(&drain(err_buf));
    (exit_code, output, timed_out)
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn pre_exec_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt as _;
    // SAFETY: `set_process_group` only calls `setpgid(0, 0)`, which is
    // async-signal-safe and touches no shared state; safe between fork/exec.
    unsafe {
        command.pre_exec(|| process_group::set_process_group());
    }
}

#[cfg(not(unix))]
fn pre_exec_process_group(_command: &mut Command) {}

fn spawn_reader(pipe: Option<impl std::io::Read + Send + 'static>) -> Arc<Mutex<String>> {
    let buf = Arc::new(Mutex::new(String::new()));
    if let Some(mut pipe) = pipe {
        let buf = Arc::clone(&buf);
        std::thread::spawn(move || {
            let mut contents = String::new();
            let _ = pipe.read_to_string(&mut contents);
            if let Ok(mut guard) = buf.lock() {
                *guard = contents;
            }
        });
    }
    buf
}

fn drain(buf: Arc<Mutex<String>>) -> String {
    Arc::try_unwrap(buf)
        .map(|m| m.into_inner().unwrap_or_default())
        .unwrap_or_default()
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return false,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(_) => return false,
        }
    }

    let _ = process_group::terminate(child.id());
    let grace_deadline = Instant::now() + process_group::GRACE_PERIOD;
    while Instant::now() < grace_deadline {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let _ = process_group::kill(child.id());
    true
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::registry::Category;

    fn tool(name: &str, argv: Vec<ArgvToken>) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            executable: name.to_string(),
            argv_template: argv,
            applies_to: vec![ToolDescriptor::compile_glob(name, "**/*").expect("valid glob")],
            depends_on: vec![],
            fixable: true,
            fix_flag: Some("--fix".to_string()),
            check_flag: Some("--check".to_string()),
            category: Category::Linter,
        }
    }

    #[test]
    fn render_argv_substitutes_fix_flag() {
        let tool = tool("t", vec![ArgvToken::FixPlaceholder]);
        assert_eq!(render_argv(&tool, None, &[], true), vec!["--fix".to_string()]);
        assert_eq!(render_argv(&tool, None, &[], false), vec!["--check".to_string()]);
    }

    #[test]
    fn render_invocations_yields_one_per_file_for_file_placeholder() {
        let tool = tool("t", vec![ArgvToken::FilePlaceholder]);
        let files = vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")];
        let invocations = render_invocations(&tool, &files, false);
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0], vec!["a.rs".to_string()]);
    }

    #[test]
    fn render_invocations_yields_single_call_for_files_placeholder() {
        let tool = tool("t", vec![ArgvToken::FilesPlaceholder]);
        let files = vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")];
        let invocations = render_invocations(&tool, &files, false);
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0], vec!["a.rs".to_string(), "b.rs".to_string()]);
    }

    #[test]
    fn overall_status_is_success_when_nothing_failed() {
        let results = vec![ToolResult {
            tool: "t".to_string(),
            status: ToolOutcome::Success,
            started_at: Utc::now(),
            duration_ms: 1,
            exit_code: Some(0),
            error_count: 0,
            warning_count: 0,
            output: String::new(),
            skip_reason: None,
        }];
        assert_eq!(overall_status(&results, false), OverallStatus::Success);
    }

    #[test]
    fn overall_status_is_failed_when_any_tool_failed() {
        let results = vec![ToolResult {
            tool: "t".to_string(),
            status: ToolOutcome::Failed,
            started_at: Utc::now(),
            duration_ms: 1,
            exit_code: Some(1),
            error_count: 1,
            warning_count: 0,
            output: String::new(),
            skip_reason: None,
        }];
        assert_eq!(overall_status(&results, false), OverallStatus::Failed);
    }

    #[test]
    fn overall_status_is_aborted_when_cancelled_without_failures() {
        assert_eq!(overall_status(&[], true), OverallStatus::Aborted);
    }
}
