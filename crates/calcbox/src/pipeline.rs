//! The expression pipeline.
//!
//! One invocation carries a batch of newline-separated expressions. Every
//! line is evaluated in order against the same engine instance - earlier
//! lines may assign variables later lines use - but only the last line's
//! outcome is printed. Diagnostics from every line are emitted as message
//! frames as soon as that line has been evaluated, tagged with its 1-based
//! line number.
//!
//! The retained outcome goes through a post-processing step before the
//! result frame is emitted:
//!
//! 1. render the parsed form of the input;
//! 2. if the parsed form is a pure comparison, normalize a 0/1 numeric
//!    result to the engine's false/true symbol;
//! 3. render the result;
//! 4. re-check the rendered text for the engine's timed-out marker -
//!    rendering has its own budget and can time out even when evaluation
//!    did not;
//! 5. emit the result frame.

use std::io::Write;
use std::time::Duration;

use crate::dispatch::Failure;
use crate::engine::{Engine, Evaluation, ExprView};
use crate::frame::FrameEncoder;
use crate::options::Profile;

/// Budget for evaluating a single expression.
pub const TIMEOUT_CALC: Duration = Duration::from_secs(10);
/// Budget for rendering a parsed form or a result.
pub const TIMEOUT_PRINT: Duration = Duration::from_secs(2);

/// An ordered batch of expression lines.
///
/// Splitting preserves empty segments, including trailing ones: the batch
/// for `"a\n"` is `["a", ""]` and the empty final line is what gets
/// printed. A batch is never empty - splitting `""` yields one empty
/// expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch(Vec<String>);

impl Batch {
    pub fn parse(raw: &str) -> Self {
        Self(raw.split('\n').map(str::to_owned).collect())
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }
}

/// Recognize a pure comparison: a comparison node, or a non-empty logical
/// AND/OR all of whose operands are themselves pure comparisons.
///
/// Read-only recursion over the engine's node view; empty conjunctions and
/// disjunctions are excluded.
pub fn is_pure_comparison<N: ExprView>(node: &N) -> bool {
    if node.is_comparison() {
        return true;
    }
    if (node.is_logical_and() || node.is_logical_or()) && node.child_count() > 0 {
        return (0..node.child_count())
            .all(|i| node.child(i).is_some_and(is_pure_comparison));
    }
    false
}

/// Evaluate a batch and emit its frames.
///
/// On failure no result frame is emitted; whatever message frames were
/// already written stay written.
pub fn evaluate_batch<E: Engine, W: Write>(
    engine: &mut E,
    batch: &Batch,
    profile: &Profile,
    encoder: &mut FrameEncoder<W>,
) -> Result<(), Failure> {
    let lines = batch.lines();

    let mut retained: Option<Evaluation<E::Expr>> = None;
    for (index, expression) in lines.iter().enumerate() {
        let line = index + 1;
        let evaluation = engine.evaluate(expression, &profile.eval, TIMEOUT_CALC)?;
        for diagnostic in &evaluation.diagnostics {
            encoder.emit_message(diagnostic.severity, line, &diagnostic.text)?;
        }
        retained = Some(evaluation);
    }

    // Batch::parse never yields an empty batch.
    let Some(evaluation) = retained else {
        return Ok(());
    };

    tracing::debug!(lines = lines.len(), "batch evaluated");
    print_result(engine, evaluation, profile, encoder)
}

/// Post-process and emit the retained outcome.
fn print_result<E: Engine, W: Write>(
    engine: &E,
    evaluation: Evaluation<E::Expr>,
    profile: &Profile,
    encoder: &mut FrameEncoder<W>,
) -> Result<(), Failure> {
    let parsed = engine.render(&evaluation.parsed, &profile.render, TIMEOUT_PRINT);

    // Comparisons evaluate to 0/1; show them as the engine's false/true
    // symbols when those resolve. A result that is neither stays numeric.
    let mut result_node = evaluation.result;
    if is_pure_comparison(&evaluation.parsed) {
        let symbol = if result_node.is_zero() {
            engine.bool_constant(false)
        } else if result_node.is_one() {
            engine.bool_constant(true)
        } else {
            None
        };
        if let Some(symbol) = symbol {
            result_node = symbol;
        }
    }

    let result = engine.render(&result_node, &profile.render, TIMEOUT_PRINT);

    // Second, independent timeout check: rendering under a high-precision
    // profile can exhaust its budget even though evaluation finished.
    if result.text.ends_with(engine.timed_out_marker()) {
        return Err(Failure::Timeout);
    }

    // Either render may have flagged inexactness; the frame carries the
    // accumulated flag.
    let approximate = parsed.approximate || result.approximate;
    encoder.emit_result(&parsed.text, &result.text, approximate)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExpr;

    fn cmp() -> FakeExpr {
        FakeExpr::comparison("2 > 1")
    }

    fn num() -> FakeExpr {
        FakeExpr::number("5", false, false)
    }

    #[test]
    fn batch_preserves_empty_segments() {
        assert_eq!(Batch::parse("a\n\nb").lines(), ["a", "", "b"]);
        assert_eq!(Batch::parse("a\n").lines(), ["a", ""]);
        assert_eq!(Batch::parse("").lines(), [""]);
    }

    #[test]
    fn comparison_is_pure() {
        assert!(is_pure_comparison(&cmp()));
    }

    #[test]
    fn number_is_not_pure() {
        assert!(!is_pure_comparison(&num()));
    }

    #[test]
    fn conjunction_of_comparisons_is_pure() {
        assert!(is_pure_comparison(&FakeExpr::and(vec![cmp(), cmp()])));
    }

    #[test]
    fn conjunction_with_non_comparison_operand_is_not_pure() {
        assert!(!is_pure_comparison(&FakeExpr::and(vec![cmp(), num()])));
    }

    #[test]
    fn empty_conjunction_is_not_pure() {
        assert!(!is_pure_comparison(&FakeExpr::and(vec![])));
        assert!(!is_pure_comparison(&FakeExpr::or(vec![])));
    }

    #[test]
    fn nested_logical_structure_recurses() {
        let inner = FakeExpr::or(vec![cmp(), cmp()]);
        assert!(is_pure_comparison(&FakeExpr::and(vec![inner, cmp()])));
    }
}
