//! Expression rendering.
//!
//! Turns nodes back into text under the caller's render options: numeric
//! base, fraction format, sign conventions, optional ANSI color on
//! numbers, and a digit budget past which a non-terminating expansion is
//! truncated and flagged approximate. Rendering runs under a deadline;
//! when it is exceeded the output is replaced by the timed-out marker so
//! the caller's suffix check fires.

use std::time::Instant;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use calcbox::engine::Rendered;
use calcbox::options::{FractionFormat, RenderOptions};

use crate::node::{BinOp, CmpOp, LogicOp, Node};

/// Suffix the renderer leaves when it runs out of budget.
pub const TIMED_OUT_MARKER: &str = "timed out";

const COLOR_NUMBER: &str = "\u{1b}[0;36m";
const COLOR_RESET: &str = "\u{1b}[0m";

// Precedence levels for parenthesization, mirroring the parser.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_CMP: u8 = 3;
const PREC_ADD: u8 = 4;
const PREC_MUL: u8 = 5;
const PREC_POW: u8 = 6;
const PREC_ATOM: u8 = 7;

/// Render a node to text.
///
/// `max_digits` bounds the fractional expansion (the engine caps it with
/// its working precision).
pub fn render(node: &Node, options: &RenderOptions, max_digits: u32, deadline: Instant) -> Rendered {
    let mut renderer = Renderer {
        options,
        max_digits,
        deadline,
        approximate: false,
        timed_out: false,
    };
    let text = renderer.node(node, 0);
    if renderer.timed_out {
        return Rendered {
            text: TIMED_OUT_MARKER.to_owned(),
            approximate: true,
        };
    }
    Rendered {
        text,
        approximate: renderer.approximate,
    }
}

struct Renderer<'a> {
    options: &'a RenderOptions,
    max_digits: u32,
    deadline: Instant,
    approximate: bool,
    timed_out: bool,
}

impl Renderer<'_> {
    fn node(&mut self, node: &Node, parent_precedence: u8) -> String {
        if self.timed_out || Instant::now() >= self.deadline {
            self.timed_out = true;
            return String::new();
        }

        let (text, precedence) = match node {
            Node::Number(value) => (self.number(value), PREC_ATOM),

            Node::Symbol(name) => (name.clone(), PREC_ATOM),

            Node::Assign(name, value) => {
                let value = self.node(value, 0);
                (format!("{name} := {value}"), PREC_CMP)
            }

            // `0 - x` is how the parser spells unary minus; give the sign
            // back without the zero.
            Node::Binary(BinOp::Sub, a, b) if a.is_zero_number() => {
                let operand = self.node(b, PREC_MUL + 1);
                (format!("{}{operand}", self.minus_sign()), PREC_MUL)
            }

            // Right-associative: the left side is wrapped unless atomic,
            // an equal-precedence right side stays bare (`2^3^2`).
            Node::Binary(BinOp::Pow, a, b) => {
                let a = self.node(a, PREC_ATOM);
                let b = self.node(b, PREC_POW);
                (format!("{a}^{b}"), PREC_POW)
            }

            Node::Binary(op, a, b) => {
                let precedence = binary_precedence(*op);
                // Same-precedence right operands keep their parentheses
                // under the non-commutative operators.
                let right_bump = matches!(op, BinOp::Sub | BinOp::Div | BinOp::Mod) as u8;
                let a = self.node(a, precedence);
                let b = self.node(b, precedence + right_bump);
                let symbol = match op {
                    BinOp::Add => " + ".to_owned(),
                    BinOp::Sub => format!(" {} ", self.minus_sign()),
                    BinOp::Mul => " * ".to_owned(),
                    BinOp::Div => " / ".to_owned(),
                    BinOp::Mod => " % ".to_owned(),
                    BinOp::Pow => unreachable!("handled above"),
                };
                (format!("{a}{symbol}{b}"), precedence)
            }

            Node::Comparison(op, a, b) => {
                let a = self.node(a, PREC_CMP + 1);
                let b = self.node(b, PREC_CMP + 1);
                (format!("{a} {} {b}", self.comparison_sign(*op)), PREC_CMP)
            }

            Node::Logical(op, operands) => {
                let connective = self.connective(*op);
                let precedence = match op {
                    LogicOp::And => PREC_AND,
                    LogicOp::Or => PREC_OR,
                };
                let parts: Vec<String> = operands
                    .iter()
                    .map(|operand| self.node(operand, precedence + 1))
                    .collect();
                (parts.join(&connective), precedence)
            }

            Node::Call(name, args) => {
                let parts: Vec<String> =
                    args.iter().map(|arg| self.node(arg, 0)).collect();
                (format!("{name}({})", parts.join(", ")), PREC_ATOM)
            }
        };

        if precedence < parent_precedence {
            format!("({text})")
        } else {
            text
        }
    }

    fn minus_sign(&self) -> &'static str {
        if self.options.unicode_signs {
            "−"
        } else {
            "-"
        }
    }

    fn comparison_sign(&self, op: CmpOp) -> &'static str {
        if self.options.unicode_signs {
            match op {
                CmpOp::Gt => ">",
                CmpOp::Lt => "<",
                CmpOp::Ge => "≥",
                CmpOp::Le => "≤",
                CmpOp::Eq => "=",
                CmpOp::Ne => "≠",
            }
        } else {
            match op {
                CmpOp::Gt => ">",
                CmpOp::Lt => "<",
                CmpOp::Ge => ">=",
                CmpOp::Le => "<=",
                CmpOp::Eq => "=",
                CmpOp::Ne => "!=",
            }
        }
    }

    fn connective(&self, op: LogicOp) -> String {
        if self.options.spell_out_logical {
            match op {
                LogicOp::And => " and ".to_owned(),
                LogicOp::Or => " or ".to_owned(),
            }
        } else {
            match op {
                LogicOp::And => " && ".to_owned(),
                LogicOp::Or => " || ".to_owned(),
            }
        }
    }

    fn number(&mut self, value: &BigRational) -> String {
        let base = effective_base(self.options.base);
        let negative = value.is_negative();
        let magnitude = value.abs();

        let body = match self.options.fraction {
            FractionFormat::Decimal => {
                let (text, exact) = decimal_expansion(&magnitude, base, self.max_digits);
                if !exact {
                    self.approximate = true;
                }
                if !exact && self.options.indicate_repeating {
                    format!("{text}…")
                } else {
                    text
                }
            }
            FractionFormat::DecimalExact => {
                let (text, exact) = decimal_expansion(&magnitude, base, self.max_digits);
                if exact {
                    text
                } else {
                    // The decimal form would lie; fall back to the exact
                    // fraction.
                    fraction_text(&magnitude, base)
                }
            }
        };

        let signed = if negative {
            format!("{}{body}", self.minus_sign())
        } else {
            body
        };

        if self.options.color {
            format!("{COLOR_NUMBER}{signed}{COLOR_RESET}")
        } else {
            signed
        }
    }
}

impl Node {
    fn is_zero_number(&self) -> bool {
        matches!(self, Node::Number(r) if r.is_zero())
    }
}

fn binary_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Add | BinOp::Sub => PREC_ADD,
        BinOp::Mul | BinOp::Div | BinOp::Mod => PREC_MUL,
        BinOp::Pow => PREC_POW,
    }
}

fn effective_base(base: i32) -> u32 {
    if (2..=36).contains(&base) {
        base as u32
    } else {
        10
    }
}

/// Expand a non-negative rational in `base`, truncating the fractional
/// part at `max_digits`. Returns the text and whether it is exact.
fn decimal_expansion(value: &BigRational, base: u32, max_digits: u32) -> (String, bool) {
    let numer = value.numer();
    let denom = value.denom();

    let int_part = numer / denom;
    let mut remainder = numer % denom;

    let mut text = digits_text(&int_part, base);
    if remainder.is_zero() {
        return (text, true);
    }

    text.push('.');
    let big_base = BigInt::from(base);
    let mut produced = 0;
    while !remainder.is_zero() && produced < max_digits {
        remainder *= &big_base;
        let digit = &remainder / denom;
        remainder %= denom;
        text.push_str(&digits_text(&digit, base));
        produced += 1;
    }

    (text, remainder.is_zero())
}

fn fraction_text(value: &BigRational, base: u32) -> String {
    format!(
        "{}/{}",
        digits_text(value.numer(), base),
        digits_text(value.denom(), base)
    )
}

fn digits_text(value: &BigInt, base: u32) -> String {
    let text = value.to_str_radix(base);
    if base > 10 {
        text.to_uppercase()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::token::tokenize;
    use std::collections::HashSet;
    use std::time::Duration;

    fn plain_options() -> RenderOptions {
        RenderOptions {
            color: false,
            unicode_signs: false,
            ..RenderOptions::default()
        }
    }

    fn render_str(s: &str, options: &RenderOptions) -> Rendered {
        let functions: HashSet<String> = ["floor".to_string()].into_iter().collect();
        let node = parse(&tokenize(s).unwrap(), &functions).unwrap();
        render(
            &node,
            options,
            options.precision,
            Instant::now() + Duration::from_secs(5),
        )
    }

    #[test]
    fn structure_renders_with_minimal_parentheses() {
        let options = plain_options();
        assert_eq!(render_str("2 + 3 * 4", &options).text, "2 + 3 * 4");
        assert_eq!(render_str("(2 + 3) * 4", &options).text, "(2 + 3) * 4");
        assert_eq!(render_str("2 - (3 - 4)", &options).text, "2 - (3 - 4)");
        assert_eq!(render_str("floor(7 / 2)", &options).text, "floor(7 / 2)");
    }

    #[test]
    fn unary_minus_renders_as_a_sign() {
        let options = plain_options();
        assert_eq!(render_str("-3", &options).text, "-3");
        assert_eq!(render_str("-(2 + 3)", &options).text, "-(2 + 3)");
    }

    #[test]
    fn assignment_renders_with_walrus() {
        let options = plain_options();
        assert_eq!(render_str("x := 2", &options).text, "x := 2");
    }

    #[test]
    fn comparisons_spell_out_and_connectives_too() {
        let options = plain_options();
        assert_eq!(
            render_str("2 > 1 && 1 != 2", &options).text,
            "2 > 1 and 1 != 2"
        );
    }

    #[test]
    fn unicode_signs_when_enabled() {
        let options = RenderOptions {
            color: false,
            ..RenderOptions::default()
        };
        assert_eq!(render_str("1 >= 2", &options).text, "1 ≥ 2");
        assert_eq!(render_str("-3", &options).text, "−3");
    }

    #[test]
    fn power_chains_render_right_associatively() {
        let options = plain_options();
        assert_eq!(render_str("2^3^2", &options).text, "2^3^2");
        assert_eq!(render_str("(2^3)^2", &options).text, "(2^3)^2");
        assert_eq!(render_str("-2^2", &options).text, "-2^2");
    }

    #[test]
    fn division_expression_renders_structurally() {
        // `1/3` parses as a division; structure rendering is exact, only
        // evaluated *values* can come out approximate.
        let rendered = render_str("1/3", &plain_options());
        assert_eq!(rendered.text, "1 / 3");
        assert!(!rendered.approximate);
    }

    #[test]
    fn terminating_number_is_exact() {
        let node = Node::Number(BigRational::new(BigInt::from(3), BigInt::from(4)));
        let rendered = render(
            &node,
            &plain_options(),
            16,
            Instant::now() + Duration::from_secs(5),
        );
        assert_eq!(rendered.text, "0.75");
        assert!(!rendered.approximate);
    }

    #[test]
    fn number_rendering_decimal_and_exact_fraction() {
        let third = BigRational::new(BigInt::from(1), BigInt::from(3));
        let node = Node::Number(third);

        let decimal = render(
            &node,
            &plain_options(),
            5,
            Instant::now() + Duration::from_secs(5),
        );
        assert_eq!(decimal.text, "0.33333…");
        assert!(decimal.approximate);

        let exact = render(
            &node,
            &RenderOptions {
                fraction: FractionFormat::DecimalExact,
                ..plain_options()
            },
            5,
            Instant::now() + Duration::from_secs(5),
        );
        assert_eq!(exact.text, "1/3");
        assert!(!exact.approximate);
    }

    #[test]
    fn base_sixteen_uses_uppercase_digits() {
        let value = BigRational::new(BigInt::from(255), BigInt::from(1));
        let node = Node::Number(value);
        let rendered = render(
            &node,
            &RenderOptions {
                base: 16,
                ..plain_options()
            },
            16,
            Instant::now() + Duration::from_secs(5),
        );
        assert_eq!(rendered.text, "FF");
    }

    #[test]
    fn unsupported_base_falls_back_to_ten() {
        let value = BigRational::new(BigInt::from(255), BigInt::from(1));
        let node = Node::Number(value);
        for base in [0, 1, 37, -16] {
            let rendered = render(
                &node,
                &RenderOptions {
                    base,
                    ..plain_options()
                },
                16,
                Instant::now() + Duration::from_secs(5),
            );
            assert_eq!(rendered.text, "255");
        }
    }

    #[test]
    fn color_wraps_numbers_only() {
        let value = BigRational::new(BigInt::from(4), BigInt::from(1));
        let node = Node::Number(value);
        let rendered = render(
            &node,
            &RenderOptions {
                unicode_signs: false,
                ..RenderOptions::default()
            },
            16,
            Instant::now() + Duration::from_secs(5),
        );
        assert_eq!(rendered.text, "\u{1b}[0;36m4\u{1b}[0m");
    }

    #[test]
    fn exceeded_deadline_yields_the_marker() {
        let node = Node::Number(BigRational::new(BigInt::from(1), BigInt::from(3)));
        let rendered = render(&node, &plain_options(), 16, Instant::now());
        assert_eq!(rendered.text, TIMED_OUT_MARKER);
        assert!(rendered.approximate);
    }
}
