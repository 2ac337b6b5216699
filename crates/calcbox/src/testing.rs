//! Scripted engine for pipeline and dispatch tests.
//!
//! `ScriptedEngine` replays pre-built evaluations in order and records
//! every trait call it receives, so tests can assert both the frames that
//! come out and the order the front end drove the engine in. `FakeExpr` is
//! the matching minimal node type.

use std::collections::VecDeque;
use std::time::Duration;

use crate::engine::{
    AliasUnit, Diagnostic, Engine, EngineError, Evaluation, ExprView, Rendered, UserFunction,
};
use crate::options::{EvalOptions, RenderOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
enum FakeKind {
    Number { zero: bool, one: bool },
    Symbol,
    Comparison,
    And,
    Or,
}

/// A scriptable expression node; renders as its fixed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeExpr {
    kind: FakeKind,
    text: String,
    approximate: bool,
    children: Vec<FakeExpr>,
}

impl FakeExpr {
    pub fn number(text: &str, zero: bool, one: bool) -> Self {
        Self {
            kind: FakeKind::Number { zero, one },
            text: text.into(),
            approximate: false,
            children: Vec::new(),
        }
    }

    pub fn symbol(text: &str) -> Self {
        Self {
            kind: FakeKind::Symbol,
            text: text.into(),
            approximate: false,
            children: Vec::new(),
        }
    }

    pub fn comparison(text: &str) -> Self {
        Self {
            kind: FakeKind::Comparison,
            text: text.into(),
            approximate: false,
            children: Vec::new(),
        }
    }

    pub fn and(children: Vec<FakeExpr>) -> Self {
        Self {
            kind: FakeKind::And,
            text: children
                .iter()
                .map(|c| c.text.clone())
                .collect::<Vec<_>>()
                .join(" and "),
            approximate: false,
            children,
        }
    }

    pub fn or(children: Vec<FakeExpr>) -> Self {
        Self {
            kind: FakeKind::Or,
            text: children
                .iter()
                .map(|c| c.text.clone())
                .collect::<Vec<_>>()
                .join(" or "),
            approximate: false,
            children,
        }
    }

    /// Mark this node as rendering approximately.
    pub fn approximate(mut self) -> Self {
        self.approximate = true;
        self
    }
}

impl ExprView for FakeExpr {
    fn is_comparison(&self) -> bool {
        self.kind == FakeKind::Comparison
    }

    fn is_logical_and(&self) -> bool {
        self.kind == FakeKind::And
    }

    fn is_logical_or(&self) -> bool {
        self.kind == FakeKind::Or
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> Option<&Self> {
        self.children.get(index)
    }

    fn is_zero(&self) -> bool {
        matches!(self.kind, FakeKind::Number { zero: true, .. })
    }

    fn is_one(&self) -> bool {
        matches!(self.kind, FakeKind::Number { one: true, .. })
    }
}

/// One scripted response to an `evaluate` call.
pub type ScriptedOutcome = Result<Evaluation<FakeExpr>, EngineError>;

/// An engine that replays scripted outcomes and records its call log.
pub struct ScriptedEngine {
    outcomes: VecDeque<ScriptedOutcome>,
    /// Trait calls in the order they happened, by name.
    pub calls: Vec<String>,
    /// Expressions passed to `evaluate`, in order.
    pub evaluated: Vec<String>,
    /// Last eval options seen.
    pub last_eval_options: Option<EvalOptions>,
    /// Last precision set.
    pub precision: Option<u32>,
    pub fetch_supported: bool,
    /// Whether `bool_constant` resolves.
    pub bools_resolvable: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            outcomes: VecDeque::new(),
            calls: Vec::new(),
            evaluated: Vec::new(),
            last_eval_options: None,
            precision: None,
            fetch_supported: false,
            bools_resolvable: true,
        }
    }

    /// Queue an evaluation that succeeds with `result`/`parsed` and the
    /// given diagnostics.
    pub fn will_evaluate(
        mut self,
        result: FakeExpr,
        parsed: FakeExpr,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        self.outcomes.push_back(Ok(Evaluation {
            result,
            parsed,
            diagnostics,
        }));
        self
    }

    /// Queue an evaluation that fails.
    pub fn will_fail(mut self, error: EngineError) -> Self {
        self.outcomes.push_back(Err(error));
        self
    }

    pub fn with_fetch_support(mut self, supported: bool) -> Self {
        self.fetch_supported = supported;
        self
    }

    pub fn with_resolvable_bools(mut self, resolvable: bool) -> Self {
        self.bools_resolvable = resolvable;
        self
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for ScriptedEngine {
    type Expr = FakeExpr;

    fn harden(&mut self) {
        self.calls.push("harden".into());
    }

    fn load_definitions(&mut self) -> Result<(), EngineError> {
        self.calls.push("load_definitions".into());
        Ok(())
    }

    fn load_exchange_rates(&mut self) -> Result<(), EngineError> {
        self.calls.push("load_exchange_rates".into());
        Ok(())
    }

    fn set_rate_warnings(&mut self, enabled: bool) {
        self.calls.push(format!("set_rate_warnings({enabled})"));
    }

    fn register_alias_unit(&mut self, unit: AliasUnit) -> Result<(), EngineError> {
        self.calls.push(format!("register_alias_unit({})", unit.name));
        Ok(())
    }

    fn register_function(&mut self, function: UserFunction) -> Result<(), EngineError> {
        self.calls
            .push(format!("register_function({})", function.name));
        Ok(())
    }

    fn set_precision(&mut self, digits: u32) {
        self.calls.push(format!("set_precision({digits})"));
        self.precision = Some(digits);
    }

    fn evaluate(
        &mut self,
        expression: &str,
        options: &EvalOptions,
        _budget: Duration,
    ) -> Result<Evaluation<Self::Expr>, EngineError> {
        self.calls.push("evaluate".into());
        self.evaluated.push(expression.to_owned());
        self.last_eval_options = Some(options.clone());
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted evaluate call for {expression:?}"))
    }

    fn render(&self, expr: &Self::Expr, _options: &RenderOptions, _budget: Duration) -> Rendered {
        Rendered {
            text: expr.text.clone(),
            approximate: expr.approximate,
        }
    }

    fn bool_constant(&self, value: bool) -> Option<Self::Expr> {
        self.bools_resolvable
            .then(|| FakeExpr::symbol(if value { "true" } else { "false" }))
    }

    fn timed_out_marker(&self) -> &str {
        "timed out"
    }

    fn can_fetch_rates(&self) -> bool {
        self.fetch_supported
    }

    fn fetch_rates(&mut self, _budget: Duration) -> Result<(), EngineError> {
        self.calls.push("fetch_rates".into());
        Ok(())
    }
}
