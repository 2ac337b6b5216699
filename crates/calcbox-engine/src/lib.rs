//! calcbox-engine: exact rational-arithmetic backend.
//!
//! The default [`calcbox::Engine`] implementation: a tokenizer,
//! shunting-yard parser, deadline-checked evaluator over `BigRational`,
//! and a base/precision-aware renderer. One engine instance serves one
//! process invocation; variable assignments persist across `evaluate`
//! calls so multi-line batches can build on earlier lines.
//!
//! The engine has no currency backend: `can_fetch_rates` is false and
//! loading cached exchange rates is a no-op. Everything else the front
//! end asks for - hardening, definition loading, alias units, user
//! functions, boolean symbols, the timed-out render marker - is real.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use num_rational::BigRational;
use num_traits::{One, Zero};

use calcbox::engine::{
    AliasUnit, Diagnostic, Engine, EngineError, Evaluation, Rendered, Severity, UserFunction,
};
use calcbox::options::{EvalOptions, RenderOptions};

mod eval;
mod node;
mod parse;
mod render;
mod token;

pub use node::Node;

use eval::{EvalError, Evaluator, FunctionDef};

/// Exit code carried by definition/registration faults.
pub const CODE_DEFINITION: u8 = 16;
/// Exit code carried by exchange-rate fetch faults.
pub const CODE_FETCH: u8 = 17;

/// The default engine.
pub struct RationalEngine {
    variables: HashMap<String, BigRational>,
    functions: HashMap<String, FunctionDef>,
    /// Names the parser treats as callable: builtins plus registrations.
    function_names: HashSet<String>,
    /// Working precision in significant digits; caps rendered expansion.
    precision: u32,
    /// Definition text queued by [`RationalEngine::with_definitions`];
    /// cleared by `harden`.
    pending_definitions: Option<String>,
}

impl RationalEngine {
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
            functions: HashMap::new(),
            function_names: HashSet::new(),
            precision: 16,
            pending_definitions: None,
        }
    }

    /// Queue extra definitions (`name = expr` per line) to be bound by
    /// `load_definitions`. A hardened engine drops them unread.
    pub fn with_definitions(mut self, text: impl Into<String>) -> Self {
        self.pending_definitions = Some(text.into());
        self
    }

    fn definition_fault(message: impl Into<String>) -> EngineError {
        EngineError::Fault {
            code: CODE_DEFINITION,
            message: message.into(),
        }
    }

    fn parse_line(&self, expression: &str) -> Result<Node, String> {
        let tokens = token::tokenize(expression)?;
        if tokens.is_empty() {
            // An empty line evaluates to zero, silently.
            return Ok(Node::Number(BigRational::zero()));
        }
        parse::parse(&tokens, &self.function_names)
    }

    fn bind(&mut self, name: &str, value: BigRational) {
        self.variables.insert(name.to_owned(), value);
    }

    fn evaluate_constant(&mut self, expression: &str) -> Result<BigRational, String> {
        let node = self.parse_line(expression)?;
        let mut evaluator = Evaluator {
            variables: &mut self.variables,
            functions: &self.functions,
            deadline: Instant::now() + Duration::from_secs(1),
        };
        evaluator.evaluate(&node).map_err(|e| e.to_string())
    }
}

impl Default for RationalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for RationalEngine {
    type Expr = Node;

    fn harden(&mut self) {
        // Drop externally supplied definition text unread; after this the
        // engine only ever binds what the front end registers explicitly.
        self.pending_definitions = None;
    }

    fn load_definitions(&mut self) -> Result<(), EngineError> {
        for name in eval::builtin_names() {
            self.function_names.insert(name.to_owned());
        }
        self.bind("true", BigRational::one());
        self.bind("false", BigRational::zero());

        if let Some(text) = self.pending_definitions.take() {
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (name, expression) = line
                    .split_once('=')
                    .ok_or_else(|| Self::definition_fault(format!("bad definition: {line}")))?;
                let value = self
                    .evaluate_constant(expression.trim())
                    .map_err(Self::definition_fault)?;
                self.bind(name.trim(), value);
            }
        }
        Ok(())
    }

    fn load_exchange_rates(&mut self) -> Result<(), EngineError> {
        // No currency backend; nothing cached to load.
        Ok(())
    }

    fn set_rate_warnings(&mut self, _enabled: bool) {
        // No currency backend, so no stale-rate warnings to silence.
    }

    fn register_alias_unit(&mut self, unit: AliasUnit) -> Result<(), EngineError> {
        // Without a unit system the alias binds as a named constant of its
        // base-unit ratio, singular and plural.
        let ratio = self
            .evaluate_constant(&unit.ratio)
            .map_err(Self::definition_fault)?;
        self.bind(&unit.name, ratio.clone());
        self.bind(&unit.plural, ratio);
        Ok(())
    }

    fn register_function(&mut self, function: UserFunction) -> Result<(), EngineError> {
        let tokens = token::tokenize(&function.body).map_err(Self::definition_fault)?;
        let body = parse::parse(&tokens, &self.function_names).map_err(Self::definition_fault)?;
        self.functions.insert(
            function.name.clone(),
            FunctionDef {
                parameters: function.parameters,
                body,
            },
        );
        self.function_names.insert(function.name);
        Ok(())
    }

    fn set_precision(&mut self, digits: u32) {
        self.precision = digits;
    }

    fn evaluate(
        &mut self,
        expression: &str,
        _options: &EvalOptions,
        budget: Duration,
    ) -> Result<Evaluation<Node>, EngineError> {
        let parsed = match self.parse_line(expression) {
            Ok(node) => node,
            Err(message) => {
                // Parse problems are diagnostics; the raw input is echoed
                // as both parsed form and result.
                let echo = Node::symbol(expression);
                return Ok(Evaluation {
                    result: echo.clone(),
                    parsed: echo,
                    diagnostics: vec![Diagnostic::new(Severity::Error, message)],
                });
            }
        };

        let deadline = Instant::now() + budget;
        let mut evaluator = Evaluator {
            variables: &mut self.variables,
            functions: &self.functions,
            deadline,
        };
        match evaluator.evaluate(&parsed) {
            Ok(value) => Ok(Evaluation {
                result: Node::Number(value),
                parsed,
                diagnostics: Vec::new(),
            }),
            Err(EvalError::Timeout) => Err(EngineError::Timeout),
            Err(EvalError::Math(message)) => Ok(Evaluation {
                result: parsed.clone(),
                parsed,
                diagnostics: vec![Diagnostic::new(Severity::Error, message)],
            }),
        }
    }

    fn render(&self, expr: &Node, options: &RenderOptions, budget: Duration) -> Rendered {
        let max_digits = options.precision.min(self.precision);
        render::render(expr, options, max_digits, Instant::now() + budget)
    }

    fn bool_constant(&self, value: bool) -> Option<Node> {
        let name = if value { "true" } else { "false" };
        self.variables
            .contains_key(name)
            .then(|| Node::symbol(name))
    }

    fn timed_out_marker(&self) -> &str {
        render::TIMED_OUT_MARKER
    }

    fn can_fetch_rates(&self) -> bool {
        false
    }

    fn fetch_rates(&mut self, _budget: Duration) -> Result<(), EngineError> {
        Err(EngineError::Fault {
            code: CODE_FETCH,
            message: "no exchange rate backend".into(),
        })
    }
}
