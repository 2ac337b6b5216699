//! Invocation dispatch and exit-code mapping.
//!
//! The process does exactly one of two things: update the exchange-rate
//! cache, or evaluate a batch of expressions. The two paths are deliberately
//! separate - update mode needs network access and never goes anywhere near
//! the sandboxed evaluation path.
//!
//! Failures are a closed set carried as values to the top of the process,
//! where each kind maps to a fixed exit code:
//!
//! | code | meaning |
//! |------|---------|
//! | 0    | success |
//! | 1    | malformed invocation (no output) |
//! | 3    | evaluation or rendering timed out |
//! | 4    | exchange-rate update unavailable |
//! | 5    | writing a frame to stdout failed |
//! | ≥16  | engine domain error, code assigned by the engine |

use std::io::{self, Write};
use std::time::Duration;

use thiserror::Error;

use crate::engine::{AliasUnit, Engine, EngineError, UserFunction};
use crate::frame::FrameEncoder;
use crate::options::{self, ModeFlags};
use crate::pipeline::{self, Batch};
use crate::security::{self, SandboxMode};

/// Budget for fetching exchange rates in update mode.
pub const TIMEOUT_UPDATE: Duration = Duration::from_secs(15);

/// Exit code for a successful invocation.
pub const EXIT_OK: u8 = 0;
/// Exit code for a malformed invocation; nothing is written.
pub const EXIT_USAGE: u8 = 1;

const EXIT_TIMEOUT: u8 = 3;
const EXIT_UPDATE_UNAVAILABLE: u8 = 4;
const EXIT_OUTPUT: u8 = 5;

/// The sentinel argument selecting update mode.
const COMMAND_UPDATE: &str = "update";

/// Everything that can abort an invocation after arguments parsed.
#[derive(Debug, Error)]
pub enum Failure {
    /// An evaluation or a render exceeded its budget.
    #[error("calculation timed out")]
    Timeout,

    /// Update mode on an engine without a fetch backend.
    #[error("exchange rate update unavailable")]
    UpdateUnavailable,

    /// A frame could not be written to stdout.
    #[error("output: {0}")]
    Output(#[from] io::Error),

    /// Engine-raised domain error; the code is the engine's.
    #[error("engine: {message}")]
    Engine { code: u8, message: String },
}

impl From<EngineError> for Failure {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Timeout => Failure::Timeout,
            EngineError::Fault { code, message } => Failure::Engine { code, message },
        }
    }
}

impl Failure {
    /// The process exit code for this failure, per the fixed table.
    pub fn exit_code(&self) -> u8 {
        match self {
            Failure::Timeout => EXIT_TIMEOUT,
            Failure::UpdateUnavailable => EXIT_UPDATE_UNAVAILABLE,
            Failure::Output(_) => EXIT_OUTPUT,
            Failure::Engine { code, .. } => *code,
        }
    }
}

/// A parsed process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Update,
    Evaluate {
        batch: Batch,
        mode: ModeFlags,
        base: i32,
    },
}

impl Invocation {
    /// Parse the user-supplied arguments (program name excluded).
    ///
    /// `None` means malformed: wrong argument count, an unknown single
    /// argument, or a non-numeric mode/base. The caller exits 1 without
    /// writing anything.
    pub fn parse<I>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        match args.as_slice() {
            [command] if command == COMMAND_UPDATE => Some(Invocation::Update),
            [expressions, mode, base] => {
                let mode = mode.parse::<u32>().ok()?;
                let base = base.parse::<i32>().ok()?;
                Some(Invocation::Evaluate {
                    batch: Batch::parse(expressions),
                    mode: ModeFlags::from_bits(mode),
                    base,
                })
            }
            _ => None,
        }
    }
}

/// Run one parsed invocation against an engine, writing frames to `out`.
///
/// The caller has already dropped privileges; this function engages the
/// sandbox itself, in evaluate mode only, after the engine is fully
/// configured.
pub fn run<E: Engine, W: Write>(
    engine: &mut E,
    invocation: Invocation,
    out: W,
    sandbox: SandboxMode,
) -> Result<(), Failure> {
    engine.harden();

    match invocation {
        Invocation::Update => update(engine),
        Invocation::Evaluate { batch, mode, base } => {
            let mut encoder = FrameEncoder::new(out);
            evaluate(engine, &batch, mode, base, &mut encoder, sandbox)?;
            encoder.flush()?;
            Ok(())
        }
    }
}

fn update<E: Engine>(engine: &mut E) -> Result<(), Failure> {
    if !engine.can_fetch_rates() {
        return Err(Failure::UpdateUnavailable);
    }
    engine.fetch_rates(TIMEOUT_UPDATE)?;
    Ok(())
}

fn evaluate<E: Engine, W: Write>(
    engine: &mut E,
    batch: &Batch,
    mode: ModeFlags,
    base: i32,
    encoder: &mut FrameEncoder<W>,
    sandbox: SandboxMode,
) -> Result<(), Failure> {
    // Rates come from the local cache here; fetching over the network is
    // update mode's job.
    engine.set_rate_warnings(false);
    engine.load_exchange_rates()?;
    engine.load_definitions()?;
    register_deployment_definitions(engine)?;

    let profile = options::configure(mode, base);
    engine.set_precision(profile.precision);

    // Last setup step: nothing after this line may need a syscall outside
    // the evaluation allow-list.
    if sandbox == SandboxMode::Enforce {
        security::engage_sandbox();
    }

    pipeline::evaluate_batch(engine, batch, &profile, encoder)
}

/// Site-specific units and functions registered on every evaluate run.
fn register_deployment_definitions<E: Engine>(engine: &mut E) -> Result<(), Failure> {
    engine.register_alias_unit(AliasUnit {
        name: "tick".into(),
        plural: "ticks".into(),
        title: "Minecraft Tick".into(),
        ratio: "0.05".into(),
    })?;
    // Discord snowflake -> unix timestamp: the snowflake's upper bits are
    // milliseconds since the Discord epoch. floor(x / 2^22) stands in for
    // the right shift.
    engine.register_function(UserFunction {
        name: "snowstamp".into(),
        parameters: vec!["x".into()],
        body: "floor(x / 4194304) / 1000 + 1420070400".into(),
        title: "Discord Snowflake to time".into(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Invocation> {
        Invocation::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_is_malformed() {
        assert_eq!(parse(&[]), None);
    }

    #[test]
    fn single_update_argument_selects_update_mode() {
        assert_eq!(parse(&["update"]), Some(Invocation::Update));
    }

    #[test]
    fn single_non_update_argument_is_malformed() {
        assert_eq!(parse(&["2+2"]), None);
        assert_eq!(parse(&["UPDATE"]), None);
    }

    #[test]
    fn two_arguments_is_malformed() {
        assert_eq!(parse(&["2+2", "0"]), None);
    }

    #[test]
    fn four_arguments_is_malformed() {
        assert_eq!(parse(&["2+2", "0", "10", "extra"]), None);
    }

    #[test]
    fn three_arguments_select_evaluate_mode() {
        let invocation = parse(&["x := 2\nx + 3", "6", "16"]).unwrap();
        let Invocation::Evaluate { batch, mode, base } = invocation else {
            panic!("expected evaluate mode");
        };
        assert_eq!(batch.lines(), ["x := 2", "x + 3"]);
        assert!(mode.contains(ModeFlags::EXACT));
        assert!(mode.contains(ModeFlags::NOCOLOR));
        assert_eq!(base, 16);
    }

    #[test]
    fn non_numeric_mode_or_base_is_malformed() {
        assert_eq!(parse(&["2+2", "fast", "10"]), None);
        assert_eq!(parse(&["2+2", "0", "ten"]), None);
        assert_eq!(parse(&["2+2", "-1", "10"]), None);
    }

    #[test]
    fn negative_base_is_accepted() {
        assert!(parse(&["2+2", "0", "-10"]).is_some());
    }

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(Failure::Timeout.exit_code(), 3);
        assert_eq!(Failure::UpdateUnavailable.exit_code(), 4);
        assert_eq!(
            Failure::Output(io::Error::from(io::ErrorKind::BrokenPipe)).exit_code(),
            5
        );
        assert_eq!(
            Failure::Engine {
                code: 42,
                message: "boom".into()
            }
            .exit_code(),
            42
        );
    }
}
