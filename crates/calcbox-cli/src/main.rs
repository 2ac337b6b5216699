//! calcbox helper binary.
//!
//! Invoked by a supervising process, never interactively:
//!
//! ```text
//! calcbox update
//! calcbox <expressions> <mode> <base>
//! ```
//!
//! Stdout carries protocol frames only; logging goes to stderr. Any other
//! argument shape exits 1 with no output. Failure exit codes are the
//! dispatcher's fixed table.

use std::io;
use std::process::ExitCode;

use calcbox::{dispatch, security, Invocation, SandboxMode, EXIT_USAGE};
use calcbox_engine::RationalEngine;

fn main() -> ExitCode {
    // Before anything else - before argv is even looked at.
    security::drop_privileges();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let Some(invocation) = Invocation::parse(std::env::args().skip(1)) else {
        return ExitCode::from(EXIT_USAGE);
    };

    let mut engine = RationalEngine::new();
    let stdout = io::stdout().lock();
    match dispatch::run(&mut engine, invocation, stdout, SandboxMode::Enforce) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            tracing::debug!(%failure, code = failure.exit_code(), "invocation failed");
            ExitCode::from(failure.exit_code())
        }
    }
}
