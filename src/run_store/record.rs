//! Persisted shapes: a single tool's result and a run's full record
//! (`spec.md` §3, §4.2).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logging::ToolOutcome;
use crate::registry::ToolName;

/// Output captured per tool is capped to keep run records small; beyond this
/// many bytes the tail is dropped and replaced with the truncation marker.
pub const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Truncate `output` to [`MAX_OUTPUT_BYTES`], appending a marker noting how
/// many bytes were omitted.
#[must_use]
pub fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_OUTPUT_BYTES {
        return output.to_string();
    }
    let omitted = output.len() - MAX_OUTPUT_BYTES;
    let mut boundary = MAX_OUTPUT_BYTES;
    while !output.is_char_boundary(boundary) {
        boundary -= 1;
    }
    format!("{}... [truncated, {omitted} bytes omitted]", &output[..boundary])
}

/// The recorded outcome of running one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool, as declared in the registry.
    pub tool: ToolName,
    /// Final outcome of the run.
    pub status: ToolOutcome,
    /// When the tool was dispatched.
    pub started_at: DateTime<Utc>,
    /// Wall-clock runtime in milliseconds.
    pub duration_ms: u64,
    /// Process exit code, if the tool was actually spawned.
    pub exit_code: Option<i32>,
    /// Heuristic error count parsed from output.
    pub error_count: u32,
    /// Heuristic warning count parsed from output.
    pub warning_count: u32,
    /// Captured stdout+stderr, truncated to [`MAX_OUTPUT_BYTES`].
    pub output: String,
    /// Human-readable reason, set only when `status` is `Skipped`.
    pub skip_reason: Option<String>,
}

/// Overall status of a run, derived from its per-tool results
/// (`spec.md` §4.4 "overall status rule").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    /// Every dispatched tool succeeded (or was not applicable).
    Success,
    /// At least one tool reported errors, timed out, or could not be resolved.
    Failed,
    /// The run was cancelled (fail-fast, signal) before all tools finished.
    Aborted,
    /// The run has not finished yet; only valid for the in-flight record.
    InProgress,
}

/// A full run: identity, timing, and every tool's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique identifier for this run (also its directory name under `runs/`).
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, if it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// Aggregate status across all tools.
    pub overall_status: OverallStatus,
    /// Per-tool results, in the order tools completed.
    pub per_tool: Vec<ToolResult>,
    /// Repository-relative files this run validated.
    pub files: Vec<String>,
    /// PID of the process that owns this run, for liveness probing of
    /// in-flight records abandoned by a crashed process.
    pub pid: u32,
}

impl RunRecord {
    /// Whether this record still has an owning process that may append more
    /// results to it.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.finished_at.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_not_truncated() {
        assert_eq!(truncate_output("all good"), "all good");
    }

    #[test]
    fn long_output_is_truncated_with_marker() {
        let output = "x".repeat(MAX_OUTPUT_BYTES + 100);
        let truncated = truncate_output(&output);
        assert!(truncated.ends_with("... [truncated, 100 bytes omitted]"));
        assert!(truncated.len() < output.len());
    }

    #[test]
    fn run_record_in_progress_without_finished_at() {
        let record = RunRecord {
            run_id: "20260101-000000".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            overall_status: OverallStatus::InProgress,
            per_tool: vec![],
            files: vec![],
            pid: 1234,
        };
        assert!(record.is_in_progress());
    }

    #[test]
    fn tool_result_round_trips_through_json() {
        let result = ToolResult {
            tool: "rustfmt".to_string(),
            status: ToolOutcome::Success,
            started_at: Utc::now(),
            duration_ms: 42,
            exit_code: Some(0),
            error_count: 0,
            warning_count: 0,
            output: String::new(),
            skip_reason: None,
        };
        let json = serde_json::to_string(&result).expect("serializes");
        let back: ToolResult = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.tool, result.tool);
        assert_eq!(back.status, result.status);
    }
}
