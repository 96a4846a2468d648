use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "huskycat",
    about = "Local code-validation orchestration engine",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run applicable validators over the selected files
    Validate(ValidateOpts),
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateOpts {
    /// Validate files staged for commit
    #[arg(long, group = "scope")]
    pub staged: bool,

    /// Validate every tracked file in the repository
    #[arg(long, group = "scope")]
    pub all: bool,

    /// Validate exactly these files
    #[arg(long, value_delimiter = ',', group = "scope")]
    pub files: Vec<PathBuf>,

    /// Run fixable tools in autocorrect mode
    #[arg(long)]
    pub fix: bool,

    /// Invocation mode: githooksblocking, githooksnonblocking, ci, cli, pipeline, mcp
    #[arg(long)]
    pub mode: Option<String>,

    /// Cancel tools not yet dispatched after the first failure
    #[arg(long, overrides_with = "no_fail_fast")]
    pub fail_fast: bool,

    /// Let every selected tool run to completion regardless of failures
    #[arg(long, overrides_with = "fail_fast")]
    pub no_fail_fast: bool,

    /// Maximum number of tool processes running concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-tool wall-clock timeout, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Detach into a background child process (`GitHooksNonBlocking` posture)
    #[arg(long)]
    pub fork: bool,

    /// Internal fork-controller handoff: resume as the detached child of
    /// the given run id. Not a user-facing flag.
    #[arg(long, hide = true)]
    pub internal_child: Option<String>,
}

impl ValidateOpts {
    /// Whether `--fail-fast` should override the mode's default.
    #[must_use]
    pub fn fail_fast_override(&self) -> Option<bool> {
        if self.fail_fast {
            Some(true)
        } else if self.no_fail_fast {
            Some(false)
        } else {
            None
        }
    }
}
