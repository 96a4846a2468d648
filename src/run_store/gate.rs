//! Gate decisions: whether a blocking hook should let a commit proceed,
//! derived from the most recent run record (`spec.md` §4.2, §6).
use chrono::Duration;

use super::record::{OverallStatus, RunRecord};

/// How recently a record must have finished for an `Aborted` status to still
/// prompt, rather than be treated as stale (`spec.md` P8, "within the
/// recency window"). No concrete duration is given in the spec; five
/// minutes covers the hook-retry timeframe a crash or cancel is actually
/// actionable in.
const RECENCY_WINDOW: Duration = Duration::minutes(5);

/// What a blocking consumer (e.g. a git hook) should do given a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Reject the action (non-zero exit from the hook).
    Block,
    /// Allow the action to proceed.
    Allow,
    /// Ask the user interactively; callers that cannot prompt must treat this
    /// as [`Decision::Block`] (Open Question resolution, `spec.md` §9).
    Prompt,
}

/// Decide the gate outcome for `record`, given whether the caller can prompt.
///
/// No prior record at all means this repository has never produced a run —
/// there is nothing to block on, so the action is allowed (`spec.md` §4.2,
/// "Allow otherwise").
#[must_use]
pub fn decide(record: Option<&RunRecord>, interactive: bool) -> Decision {
    let Some(record) = record else {
        return Decision::Allow;
    };
    let decision = match record.overall_status {
        OverallStatus::Success => Decision::Allow,
        OverallStatus::Failed => Decision::Block,
        OverallStatus::Aborted => {
            let since = record.finished_at.unwrap_or(record.started_at);
            if chrono::Utc::now() - since <= RECENCY_WINDOW {
                Decision::Prompt
            } else {
                Decision::Block
            }
        }
        OverallStatus::InProgress => Decision::Prompt,
    };
    if decision == Decision::Prompt && !interactive {
        Decision::Block
    } else {
        decision
    }
}
