//! Built-in validator descriptors shipped with the engine.
//!
//! A small representative set grounded in the common formatter/linter
//! pipeline for a Rust project, plus a shell and a YAML validator to exercise
//! multiple `applies_to` categories.
use crate::error::ConfigError;

use super::descriptor::{ArgvToken, Category, ToolDescriptor};

fn argv(tokens: &[&str]) -> Result<Vec<ArgvToken>, ConfigError> {
    tokens
        .iter()
        .map(|t| {
            ArgvToken::try_parse(t).map_err(|placeholder| ConfigError::UnknownPlaceholder {
                tool: "<builtin>".to_string(),
                placeholder,
            })
        })
        .collect()
}

/// Construct the built-in tool descriptors.
///
/// # Errors
///
/// Returns [`ConfigError`] if a built-in glob pattern or argv token is
/// malformed — this would indicate a bug in this module, not user input.
pub fn builtin_descriptors() -> Result<Vec<ToolDescriptor>, ConfigError> {
    Ok(vec![
        ToolDescriptor {
            name: "rustfmt".into(),
            executable: "rustfmt".into(),
            argv_template: argv(&["{fix?}", "{file}"])?,
            applies_to: vec![ToolDescriptor::compile_glob("rustfmt", "**/*.rs")?],
            depends_on: vec![],
            fixable: true,
            fix_flag: None,
            check_flag: Some("--check".to_string()),
            category: Category::Formatter,
        },
        ToolDescriptor {
            name: "clippy".into(),
            executable: "cargo-clippy".into(),
            argv_template: argv(&["clippy", "--", "-D", "warnings"])?,
            applies_to: vec![ToolDescriptor::compile_glob("clippy", "**/*.rs")?],
            depends_on: vec!["rustfmt".to_string()],
            fixable: false,
            fix_flag: None,
            check_flag: None,
            category: Category::Linter,
        },
        ToolDescriptor {
            name: "shellcheck".into(),
            executable: "shellcheck".into(),
            argv_template: argv(&["{file}"])?,
            applies_to: vec![
                ToolDescriptor::compile_glob("shellcheck", "**/*.sh")?,
                ToolDescriptor::compile_glob("shellcheck", "**/*.bash")?,
            ],
            depends_on: vec![],
            fixable: false,
            fix_flag: None,
            check_flag: None,
            category: Category::Linter,
        },
        ToolDescriptor {
            name: "yamllint".into(),
            executable: "yamllint".into(),
            argv_template: argv(&["{file}"])?,
            applies_to: vec![
                ToolDescriptor::compile_glob("yamllint", "**/*.yaml")?,
                ToolDescriptor::compile_glob("yamllint", "**/*.yml")?,
            ],
            depends_on: vec![],
            fixable: false,
            fix_flag: None,
            check_flag: None,
            category: Category::Schema,
        },
    ])
}
