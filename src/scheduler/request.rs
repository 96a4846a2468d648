//! The inputs to one validation run (`spec.md` §3, §4.4).
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::{SelectionProfile, ToolName};

/// Which tools a run should execute.
#[derive(Debug, Clone)]
pub enum ToolSelection {
    /// Select by [`SelectionProfile`] against the applicable files.
    Profile {
        /// Eligibility filter independent of file matching.
        profile: SelectionProfile,
        /// The enabled-tool set from configuration, consulted only by
        /// [`SelectionProfile::Configured`].
        configured: Option<HashSet<ToolName>>,
    },
    /// Run exactly these tools, ignoring `applies_to` filtering.
    Explicit(Vec<ToolName>),
}

impl ToolSelection {
    /// A selection by profile with no configured-tool restriction.
    #[must_use]
    pub const fn profile(profile: SelectionProfile) -> Self {
        Self::Profile {
            profile,
            configured: None,
        }
    }
}

/// A single validation request, as assembled by the CLI or an embedding mode.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Repository-relative files to validate.
    pub files: Vec<PathBuf>,
    /// Which tools to run.
    pub tool_selection: ToolSelection,
    /// Whether fixable tools should run in fix (autocorrect) mode.
    pub fix: bool,
    /// Whether a failed tool should cancel tools not yet dispatched.
    pub fail_fast: bool,
    /// Maximum number of tool processes running concurrently.
    pub max_workers: usize,
    /// Per-tool wall-clock timeout before SIGTERM is sent.
    pub per_tool_timeout: Duration,
    /// Absolute path to the repository root, used to resolve relative paths
    /// and to locate the run store.
    pub repo_root: PathBuf,
    /// Whether the invoking context can prompt a human (affects gate
    /// decisions and `Prompt` resolution).
    pub interactive: bool,
}

impl RunRequest {
    /// A request with sensible defaults, for tests and simple CLI invocations.
    #[must_use]
    pub fn new(repo_root: PathBuf, files: Vec<PathBuf>) -> Self {
        Self {
            files,
            tool_selection: ToolSelection::profile(SelectionProfile::All),
            fix: false,
            fail_fast: false,
            max_workers: default_max_workers(),
            per_tool_timeout: Duration::from_secs(120),
            repo_root,
            interactive: false,
        }
    }
}

/// Default worker count: the number of available parallelism units, as the
/// teacher's own task scheduler assumes (falls back to 4 if undetectable).
#[must_use]
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4)
}
