//! Security staging: privilege drop, then syscall lockdown.
//!
//! Two sequential, non-reversible setup phases with no teardown:
//!
//! 1. **drop_privileges** - unconditionally the first action of the
//!    process, before argument parsing, before anything reads the
//!    environment. A setuid/setgid identity is dropped permanently.
//! 2. **engage_sandbox** - after the engine is fully configured and
//!    strictly before the first untrusted expression is parsed. From then
//!    on a syscall outside the allow-list kills the process (SIGSYS); that
//!    is OS enforcement, not an application error path.
//!
//! Both phases abort on failure. Continuing privileged or unsandboxed is
//! never an option, and there is nothing to unwind.

use std::process;

use calcbox_sys::creds;
use calcbox_sys::seccomp::{self, EVALUATION_ALLOWLIST};

/// Whether dispatch actually installs the syscall filter.
///
/// `Bypass` exists for tests: the filter applies to the calling process,
/// so installing it under a test harness would kill the harness at its
/// next disallowed syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxMode {
    Enforce,
    Bypass,
}

/// Permanently drop any elevated identity. Aborts on failure.
///
/// Runs before logging is initialized, hence `eprintln!` for the fatal
/// path.
pub fn drop_privileges() {
    match creds::drop_to_unprivileged() {
        Ok(_) => {}
        Err(e) => {
            eprintln!("calcbox: failed to drop privileges: {e}");
            process::abort();
        }
    }
}

/// Install the evaluation syscall filter. Aborts on failure.
pub fn engage_sandbox() {
    let filter = seccomp::build_allowlist_filter(EVALUATION_ALLOWLIST);
    // SAFETY: the filter comes from build_allowlist_filter, whose jump
    // offsets are in bounds by construction.
    if let Err(e) = unsafe { seccomp::install_filter(&filter) } {
        eprintln!("calcbox: failed to install syscall filter: {e}");
        process::abort();
    }
    tracing::debug!(
        rules = filter.len(),
        syscalls = EVALUATION_ALLOWLIST.len(),
        "syscall filter installed"
    );
}
