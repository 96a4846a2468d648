//! Validation orchestration engine binary entry point.
use clap::Parser;
use huskycat::{cli, commands, error::HuskyCatError, logging};

fn main() {
    enable_ansi_support::enable_ansi_support().ok(); // best-effort; no-op on non-Windows
    let args = cli::Cli::parse();
    let command_name = match &args.command {
        cli::Command::Validate(_) => "validate",
    };
    logging::init_subscriber(args.verbose, command_name);
    let log = std::sync::Arc::new(logging::Logger::new(command_name));

    let result = match &args.command {
        cli::Command::Validate(opts) => commands::validate::run(opts, &log),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log.error(&e.to_string());
            std::process::exit(HuskyCatError::exit_code_for(&e));
        }
    }
}
