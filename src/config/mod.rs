//! `.huskycat.yaml` loading: per-repository overrides layered on top of the
//! built-in tool registry and scheduler defaults (`spec.md` §2, §6).
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The parsed contents of `.huskycat.yaml`.
///
/// A missing file is not an error: [`HuskycatConfig::load`] returns
/// [`HuskycatConfig::default`] in that case, since the engine is fully
/// usable with no configuration at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuskycatConfig {
    /// Tool names to run; `None` means "every applicable built-in tool".
    pub tools: Option<Vec<String>>,
    /// Maximum concurrent tool processes.
    pub max_workers: Option<usize>,
    /// Per-tool timeout, in seconds.
    pub per_tool_timeout_secs: Option<u64>,
    /// Default for `--fail-fast` when the CLI flag is not given.
    pub fail_fast: bool,
    /// Default for non-blocking hook mode (`spec.md` §4.6 `GitHooksNonBlocking`).
    pub non_blocking_hooks: bool,
    /// Whether the resolver may delegate to a container runtime
    /// (`spec.md` §4.1 step 4) when no local binary is found.
    pub use_container: bool,
    /// Retention window for finished run records, in days.
    pub retention_days: Option<i64>,
}

impl Default for HuskycatConfig {
    fn default() -> Self {
        Self {
            tools: None,
            max_workers: None,
            per_tool_timeout_secs: None,
            fail_fast: false,
            non_blocking_hooks: false,
            use_container: true,
            retention_days: None,
        }
    }
}

impl HuskycatConfig {
    /// Load configuration from `repo_root/.huskycat.yaml`, falling back to
    /// defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read, or
    /// [`ConfigError::Parse`] if it is not valid YAML for this schema.
    pub fn load(repo_root: &Path) -> Result<Self, ConfigError> {
        let path = repo_root.join(".huskycat.yaml");
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// The per-tool timeout as a [`Duration`], or `default` if unset.
    #[must_use]
    pub fn per_tool_timeout(&self, default: Duration) -> Duration {
        self.per_tool_timeout_secs.map_or(default, Duration::from_secs)
    }

    /// The run-record retention window in days, clamped to non-negative, or
    /// `default` if unset.
    #[must_use]
    pub fn retention_days(&self, default: i64) -> i64 {
        self.retention_days.map_or(default, |days| days.max(0))
    }

    /// Validate values that parse successfully but are not usable, returning
    /// human-readable warnings rather than failing the load.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_workers == Some(0) {
            warnings.push("max_workers is 0; treating as 1".to_string());
        }
        if let Some(days) = self.retention_days {
            if days < 0 {
                warnings.push("retention_days is negative; treating as 0".to_string());
            }
        }
        warnings
    }
}
