//! Domain-specific error types for the validation engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`ConfigError`], [`ToolError`])
//! while command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! HuskyCatError
//! ├── Config(ConfigError)       — registry construction, config parsing
//! ├── Resolver(ResolverError)   — tool extraction/lookup failures
//! ├── Tool(ToolError)           — validator process failures
//! ├── RunStore(RunStoreError)   — persistence failures
//! └── Internal(InternalError)   — invariant violations
//! ```
//!
//! Propagation policy (see `SPEC_FULL.md` §7): `ToolError` and `ResolverError`
//! never propagate past their immediate handler — they become data recorded
//! on a [`crate::run_store::record::ToolResult`]/[`crate::run_store::record::RunRecord`].
//! Everything else propagates to `main`, which maps it to an exit code.

#![allow(dead_code)]

use thiserror::Error;

/// Top-level error type for the validation engine.
///
/// Aggregates domain-specific sub-errors and is convertible to
/// [`anyhow::Error`] for use at CLI command boundaries.
#[derive(Error, Debug)]
pub enum HuskyCatError {
    /// Registry or configuration error. Fatal at construction; exit code 3.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tool resolution error (extraction, cache access).
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// Validator process error (recorded per-tool, does not normally reach here).
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Run store persistence error.
    #[error("Run store error: {0}")]
    RunStore(#[from] RunStoreError),

    /// Invariant violation. Fatal; exit code 4.
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

impl HuskyCatError {
    /// Map this error to the process exit code defined by `SPEC_FULL.md` §6/§7.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 3,
            Self::Resolver(_) | Self::Tool(_) | Self::RunStore(_) | Self::Internal(_) => 4,
        }
    }

    /// Map a command's top-level error to a process exit code, for errors
    /// that were propagated as [`anyhow::Error`] rather than constructed as
    /// a [`HuskyCatError`] directly. Falls back to 4 (internal/unexpected)
    /// for anything not in the known hierarchy (e.g. git discovery or I/O
    /// failures during file-scope resolution).
    #[must_use]
    pub fn exit_code_for(err: &anyhow::Error) -> i32 {
        if let Some(e) = err.downcast_ref::<Self>() {
            return e.exit_code();
        }
        if err.downcast_ref::<ConfigError>().is_some() {
            return 3;
        }
        4
    }
}

/// Errors that arise from registry construction and `.huskycat.yaml` parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The tool dependency graph contains a cycle.
    #[error("dependency cycle detected among tools: {0}")]
    CyclicDependency(String),

    /// A tool's `depends_on` names a tool that does not exist in the registry.
    #[error("tool '{tool}' depends on unknown tool '{dependency}'")]
    UnknownDependency {
        /// The tool whose dependency is unresolved.
        tool: String,
        /// The missing dependency name.
        dependency: String,
    },

    /// A tool's `argv_template` references a placeholder outside `{file, files, fix}`.
    #[error("tool '{tool}' references unknown argv placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder {
        /// The tool whose argv template is invalid.
        tool: String,
        /// The unrecognized placeholder text (without braces).
        placeholder: String,
    },

    /// A glob pattern or other configuration value failed to parse.
    #[error("invalid configuration value for '{field}': {message}")]
    InvalidValue {
        /// Name of the offending field.
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// An I/O error occurred while reading `.huskycat.yaml`.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `.huskycat.yaml` exists but is not valid YAML for the expected schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path to the file that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors that arise from tool resolution (extraction, cache access).
///
/// Recovered locally by falling through to the next resolution strategy;
/// never aborts a run.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Extracting the embedded tool set failed (disk space, permissions).
    #[error("failed to extract embedded tool set: {0}")]
    ExtractFailed(String),

    /// The tool cache directory could not be written to.
    #[error("permission denied accessing tool cache at {0}")]
    PermissionDenied(String),
}

/// Errors that arise from running a validator process.
///
/// Recorded per-tool in the [`crate::run_store::record::ToolResult`];
/// contributes to an overall Failed status but is never returned as a Rust
/// error past the scheduler worker that produced it.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool process exited with a non-zero status.
    #[error("tool '{tool}' exited with status {code}")]
    NonZeroExit {
        /// Name of the tool.
        tool: String,
        /// Process exit code.
        code: i32,
    },

    /// The tool process could not be spawned at all.
    #[error("tool '{tool}' failed to spawn: {source}")]
    SpawnFailed {
        /// Name of the tool.
        tool: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The tool process exceeded its configured timeout.
    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    TimedOut {
        /// Name of the tool.
        tool: String,
        /// The timeout that was exceeded.
        timeout_secs: u64,
    },
}

/// Errors that arise from persisting or reading run records.
#[derive(Error, Debug)]
pub enum RunStoreError {
    /// Writing a tool result failed. Logged; the scheduler proceeds.
    #[error("failed to append result for run {run_id}: {source}")]
    AppendFailed {
        /// The run the append was for.
        run_id: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Finalizing the run record failed. Fatal to reportability; exit code 4.
    #[error("failed to finalize run {run_id}: {source}")]
    FinalizeFailed {
        /// The run that could not be finalized.
        run_id: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An existing run record could not be read back.
    #[error("failed to read run record at {path}: {source}")]
    ReadFailed {
        /// Path of the record that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors representing invariant violations that indicate a bug rather than
/// an expected failure mode.
#[derive(Error, Debug)]
pub enum InternalError {
    /// A generic invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A scheduler worker observed a dependency that was never resolved to a
    /// terminal status before dispatch — a bug in level computation.
    #[error("worker observed an unresolved dependency for tool '{0}'")]
    UnresolvedDependency(String),
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn config_error_cyclic_dependency_display() {
        let e = ConfigError::CyclicDependency("clippy -> rustfmt -> clippy".to_string());
        assert!(e.to_string().contains("cycle"));
    }

    #[test]
    fn config_error_unknown_dependency_display() {
        let e = ConfigError::UnknownDependency {
            tool: "clippy".to_string(),
            dependency: "ghost".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "tool 'clippy' depends on unknown tool 'ghost'"
        );
    }

    #[test]
    fn config_error_unknown_placeholder_display() {
        let e = ConfigError::UnknownPlaceholder {
            tool: "clippy".to_string(),
            placeholder: "bogus".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "tool 'clippy' references unknown argv placeholder '{bogus}'"
        );
    }

    #[test]
    fn config_error_io_display() {
        let e = ConfigError::Io {
            path: "/repo/.huskycat.yaml".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.to_string().contains("/repo/.huskycat.yaml"));
    }

    #[test]
    fn config_error_io_has_source() {
        use std::error::Error as StdError;
        let e = ConfigError::Io {
            path: "/repo/.huskycat.yaml".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn resolver_error_extract_failed_display() {
        let e = ResolverError::ExtractFailed("disk full".to_string());
        assert_eq!(
            e.to_string(),
            "failed to extract embedded tool set: disk full"
        );
    }

    #[test]
    fn tool_error_non_zero_exit_display() {
        let e = ToolError::NonZeroExit {
            tool: "clippy".to_string(),
            code: 1,
        };
        assert_eq!(e.to_string(), "tool 'clippy' exited with status 1");
    }

    #[test]
    fn tool_error_timed_out_display() {
        let e = ToolError::TimedOut {
            tool: "clippy".to_string(),
            timeout_secs: 30,
        };
        assert_eq!(e.to_string(), "tool 'clippy' timed out after 30s");
    }

    #[test]
    fn tool_error_spawn_failed_has_source() {
        use std::error::Error as StdError;
        let e = ToolError::SpawnFailed {
            tool: "clippy".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn run_store_error_finalize_failed_display() {
        let e = RunStoreError::FinalizeFailed {
            run_id: "20260101-000000".to_string(),
            source: io::Error::other("disk full"),
        };
        assert!(e.to_string().contains("20260101-000000"));
    }

    #[test]
    fn internal_error_invariant_violation_display() {
        let e = InternalError::InvariantViolation("level barrier broken".to_string());
        assert_eq!(e.to_string(), "invariant violated: level barrier broken");
    }

    #[test]
    fn huskycat_error_exit_codes() {
        assert_eq!(
            HuskyCatError::Config(ConfigError::CyclicDependency(String::new())).exit_code(),
            3
        );
        assert_eq!(
            HuskyCatError::Internal(InternalError::InvariantViolation(String::new())).exit_code(),
            4
        );
        assert_eq!(
            HuskyCatError::RunStore(RunStoreError::FinalizeFailed {
                run_id: String::new(),
                source: io::Error::other("x"),
            })
            .exit_code(),
            4
        );
    }

    #[test]
    fn huskycat_error_from_config_error() {
        let config_err = ConfigError::CyclicDependency("a -> a".to_string());
        let e: HuskyCatError = config_err.into();
        assert!(e.to_string().contains("Configuration error"));
    }

    #[test]
    fn huskycat_error_from_tool_error() {
        let tool_err = ToolError::NonZeroExit {
            tool: "clippy".to_string(),
            code: 2,
        };
        let e: HuskyCatError = tool_err.into();
        assert!(e.to_string().contains("Tool error"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<HuskyCatError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<ResolverError>();
        assert_send_sync::<ToolError>();
        assert_send_sync::<RunStoreError>();
        assert_send_sync::<InternalError>();
    }

    #[test]
    fn config_error_converts_to_anyhow() {
        let e = ConfigError::CyclicDependency("a -> a".to_string());
        let _anyhow_err: anyhow::Error = e.into();
    }

    #[test]
    fn internal_error_converts_to_anyhow() {
        let e = InternalError::InvariantViolation("x".to_string());
        let _anyhow_err: anyhow::Error = e.into();
    }
}
