//! calcbox: privilege-minimized front end for an expression engine.
//!
//! One process invocation evaluates one batch of expressions against an
//! external computation engine and reports results through a compact
//! framed byte protocol on stdout. Defense in depth against the engine's
//! parser (the largest untrusted-input attack surface) comes in two
//! one-way stages:
//!
//! 1. **Privilege drop** - any setuid/setgid identity is dropped before
//!    arguments are even looked at.
//! 2. **Seccomp allow-list** - after engine configuration and before the
//!    first untrusted expression is parsed, the process locks itself down
//!    to the syscalls evaluation needs. A violation kills the process.
//!
//! The engine itself is opaque behind the [`engine::Engine`] trait; this
//! crate owns the staging sequence, the frame protocol, the expression
//! pipeline and the exit-code mapping.
//!
//! ## Flow
//!
//! ```text
//! drop_privileges -> parse argv -> configure engine -> engage sandbox
//!     -> evaluate lines, emitting message frames
//!     -> emit result frame -> exit code
//! ```

pub mod dispatch;
pub mod engine;
pub mod frame;
pub mod options;
pub mod pipeline;
pub mod security;
pub mod testing;

pub use dispatch::{run, Failure, Invocation, EXIT_OK, EXIT_USAGE};
pub use engine::{
    AliasUnit, Diagnostic, Engine, EngineError, Evaluation, ExprView, Rendered, Severity,
    UserFunction,
};
pub use frame::FrameEncoder;
pub use options::{EvalOptions, ModeFlags, Profile, RenderOptions};
pub use pipeline::Batch;
pub use security::SandboxMode;
