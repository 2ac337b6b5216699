//! The engine collaborator surface.
//!
//! The computation engine (parsing, evaluation, rendering) is an external
//! collaborator. This module pins down exactly what the front end consumes
//! from it, so the pipeline and dispatcher stay engine-agnostic and tests
//! can script an engine outright.
//!
//! Diagnostics are an explicit per-call collector: `evaluate` returns every
//! message the engine produced for that expression, instead of parking them
//! in a process-wide queue the caller has to remember to drain.

use std::time::Duration;

use thiserror::Error;

use crate::options::{EvalOptions, RenderOptions};

/// Diagnostic category, mapped from the engine's native message types.
///
/// Anything the engine reports that is not information, warning or error
/// maps to `Unknown` - the protocol reserves a byte for it so callers can
/// distinguish "engine said something new" from the known levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Unknown,
}

/// One engine message, produced as a side effect of evaluating an
/// expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub text: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

/// Read-only view of an engine expression node.
///
/// The front end never builds or mutates engine expressions; it only walks
/// them to recognize pure comparisons and zero/one results. Size and child
/// access are all it needs.
pub trait ExprView {
    fn is_comparison(&self) -> bool;
    fn is_logical_and(&self) -> bool;
    fn is_logical_or(&self) -> bool;
    fn child_count(&self) -> usize;
    fn child(&self, index: usize) -> Option<&Self>;
    fn is_zero(&self) -> bool;
    fn is_one(&self) -> bool;
}

/// Outcome of evaluating one expression: the computed value, the engine's
/// re-rendering of the input, and every diagnostic produced along the way.
#[derive(Debug)]
pub struct Evaluation<N> {
    pub result: N,
    pub parsed: N,
    pub diagnostics: Vec<Diagnostic>,
}

/// A rendered expression plus the exactness flag the renderer accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// True if the rendering is a bounded approximation of the value.
    pub approximate: bool,
}

/// Failures the engine can raise.
///
/// Most evaluation problems (division by zero, unknown names) are
/// diagnostics, not errors: the engine reports them and still produces a
/// result node. `EngineError` is reserved for conditions that abort the
/// whole invocation. `Fault` codes must be stable per failure kind and at
/// least 16 - lower values belong to the dispatcher's fixed table.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("calculation timed out")]
    Timeout,

    #[error("{message}")]
    Fault { code: u8, message: String },
}

/// Alias unit registration descriptor (e.g. a game tick as 0.05 s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasUnit {
    pub name: String,
    pub plural: String,
    pub title: String,
    /// Ratio to the base unit, as an expression the engine can parse.
    pub ratio: String,
}

/// User function registration descriptor; the body is an expression over
/// the named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFunction {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: String,
    pub title: String,
}

/// Everything the front end asks of the computation engine.
///
/// Configuration calls happen once, before the sandbox is engaged; after
/// that only `evaluate`, `render`, `bool_constant` and `timed_out_marker`
/// are used. One engine instance serves one process invocation - variable
/// assignments persist across `evaluate` calls within it.
pub trait Engine {
    type Expr: ExprView;

    /// Disable engine capabilities evaluation does not need (file access,
    /// process spawning, plugin loading). Called before anything else.
    fn harden(&mut self);

    fn load_definitions(&mut self) -> Result<(), EngineError>;

    /// Load previously fetched exchange rates from local cache. Never
    /// touches the network - that is what update mode is for.
    fn load_exchange_rates(&mut self) -> Result<(), EngineError>;

    fn set_rate_warnings(&mut self, enabled: bool);

    fn register_alias_unit(&mut self, unit: AliasUnit) -> Result<(), EngineError>;

    fn register_function(&mut self, function: UserFunction) -> Result<(), EngineError>;

    /// Working precision in significant digits.
    fn set_precision(&mut self, digits: u32);

    /// Parse and evaluate one expression within `budget`.
    fn evaluate(
        &mut self,
        expression: &str,
        options: &EvalOptions,
        budget: Duration,
    ) -> Result<Evaluation<Self::Expr>, EngineError>;

    /// Render an expression within `budget`. A render that exceeds its
    /// budget produces text ending in [`Engine::timed_out_marker`] rather
    /// than failing - the caller decides what that means.
    fn render(&self, expr: &Self::Expr, options: &RenderOptions, budget: Duration) -> Rendered;

    /// The engine's canonical true/false symbol, if resolvable.
    fn bool_constant(&self, value: bool) -> Option<Self::Expr>;

    /// Suffix the renderer appends when it runs out of budget.
    fn timed_out_marker(&self) -> &str;

    /// Whether a network backend for exchange-rate fetching is available.
    fn can_fetch_rates(&self) -> bool;

    fn fetch_rates(&mut self, budget: Duration) -> Result<(), EngineError>;
}
