//! Core logging types: tool entries, status, and the [`Log`] trait.
use serde::{Deserialize, Serialize};

use super::diagnostic::DiagnosticLog;

/// Tool execution result for summary reporting.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    /// Tool name.
    pub name: String,
    /// Final status of the tool run.
    pub status: ToolOutcome,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a completed tool run.
///
/// Mirrors `ToolResult::status` (`run_store::record`); kept as a separate
/// type here because the logger's summary only needs the outcome kind, not
/// the full result payload (duration, output, counts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolOutcome {
    /// Tool ran and exited zero with no errors reported.
    Success,
    /// Tool ran and reported at least one error, or exited non-zero.
    Failed,
    /// Tool was not dispatched because a dependency failed or was skipped.
    Skipped,
    /// Tool was killed after exceeding its timeout.
    TimedOut,
    /// Tool does not apply to the current selection (no matching files, or
    /// resolution failed and the tool is treated as absent).
    NotApplicable,
}

/// Abstraction over logging backends.
///
/// Both [`Logger`](super::logger::Logger) (direct output) and
/// [`BufferedLog`](super::buffered::BufferedLog) (deferred output for
/// parallel tool runs) implement this trait, allowing scheduler code to log
/// without knowing whether output is immediate or buffered.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run/fix-preview action message.
    fn dry_run(&self, msg: &str);
    /// Record a tool result for the summary.
    fn record_task(&self, name: &str, status: ToolOutcome, message: Option<&str>);
    /// Access the high-precision diagnostic log, if available.
    fn diagnostic(&self) -> Option<&DiagnosticLog> {
        None
    }
}
