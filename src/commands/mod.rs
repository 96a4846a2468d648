//! Top-level command handlers.
mod git_scope;
pub mod validate;
