//! Tool descriptors: the immutable, per-tool catalog entries that the
//! Validator Registry holds (`spec.md` §3, §4.3).
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of a tool, as declared in the registry. Tools are configuration
/// entries rather than Rust types, so the dependency graph is keyed on this
/// `String` newtype instead of `TypeId`.
pub type ToolName = String;

/// Informational grouping used only to break selection-order ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Rewrites files in place to a canonical style.
    Formatter,
    /// Reports style or correctness issues without rewriting.
    Linter,
    /// Checks static types or type-adjacent contracts.
    Typechecker,
    /// Checks for known-vulnerable dependencies or unsafe patterns.
    Security,
    /// Validates structured data (YAML, JSON, TOML) against a schema.
    Schema,
}

/// A single token of a tool's argv template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgvToken {
    /// A literal, unsubstituted argument.
    Literal(String),
    /// `{file}` — expands per applicable file (the tool is invoked once per file).
    FilePlaceholder,
    /// `{files…}` — expands to every applicable file in a single invocation.
    FilesPlaceholder,
    /// `{fix?}` — expands to the tool's fix/check flag depending on `run.fix`.
    FixPlaceholder,
}

impl ArgvToken {
    /// Parse one raw argv token, rejecting any `{...}` placeholder outside the
    /// known set of `{file, files…, fix?}`.
    ///
    /// # Errors
    ///
    /// Returns the bare placeholder text (without braces) if `raw` looks like
    /// a placeholder but is not one of the three recognized forms.
    pub fn try_parse(raw: &str) -> Result<Self, String> {
        if raw.starts_with('{') && raw.ends_with('}') {
            match raw {
                "{file}" => Ok(Self::FilePlaceholder),
                "{files…}" | "{files...}" => Ok(Self::FilesPlaceholder),
                "{fix?}" => Ok(Self::FixPlaceholder),
                other => Err(other.trim_matches(['{', '}']).to_string()),
            }
        } else {
            Ok(Self::Literal(raw.to_string()))
        }
    }
}

/// An immutable tool descriptor, declared at registry build time.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Unique identifier within the registry.
    pub name: ToolName,
    /// Logical executable name, used for PATH lookup and the embedded-tool key.
    pub executable: String,
    /// Ordered argv tokens, substituted at dispatch time.
    pub argv_template: Vec<ArgvToken>,
    /// Glob patterns over repository-relative paths.
    pub applies_to: Vec<globset::GlobMatcher>,
    /// Other tool names whose success must precede this one.
    pub depends_on: Vec<ToolName>,
    /// Whether this tool accepts a fix/autocorrect invocation.
    pub fixable: bool,
    /// Argv token emitted for `{fix?}` when `run.fix` is true.
    pub fix_flag: Option<String>,
    /// Argv token emitted for `{fix?}` when `run.fix` is false.
    pub check_flag: Option<String>,
    /// Informational category, used only to order selection ties.
    pub category: Category,
}

impl ToolDescriptor {
    /// Build a glob matcher from a pattern, wrapping parse failures into the
    /// registry's error type with the offending field named.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `pattern` is not a valid glob.
    pub fn compile_glob(tool: &str, pattern: &str) -> Result<globset::GlobMatcher, ConfigError> {
        globset::Glob::new(pattern)
            .map(|g| g.compile_matcher())
            .map_err(|e| ConfigError::InvalidValue {
                field: format!("{tool}.applies_to"),
                message: e.to_string(),
            })
    }

    /// Whether this tool applies to the given repository-relative path.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.applies_to.iter().any(|g| g.is_match(path))
    }

    /// Best-effort error/warning count heuristic over captured tool output.
    ///
    /// A real registry would dispatch to tool-specific parsers; this core
    /// implements the fallback described in `spec.md` §4.4: a line containing
    /// "error"/"warning" (case-insensitively) counts toward the respective
    /// total, and a non-zero exit with no matched lines counts as one error.
    #[must_use]
    pub fn parse_counts(output: &str, exit_success: bool) -> (u32, u32) {
        let mut errors = 0u32;
        let mut warnings = 0u32;
        for line in output.lines() {
            let lower = line.to_lowercase();
            if lower.contains("error") {
                errors = errors.saturating_add(1);
            } else if lower.contains("warn") {
                warnings = warnings.saturating_add(1);
            }
        }
        if errors == 0 && warnings == 0 && !exit_success {
            errors = 1;
        }
        (errors, warnings)
    }
}
