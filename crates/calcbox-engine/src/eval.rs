//! Expression evaluation over exact rationals.
//!
//! Evaluation is deadline-checked at every node and depth-guarded against
//! pathological nesting. Math problems (division by zero, unknown names,
//! non-integer exponents) are reported as [`EvalError::Math`] - the engine
//! turns them into diagnostics, not hard failures.

use std::collections::HashMap;
use std::time::Instant;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use thiserror::Error;

use crate::node::{BinOp, CmpOp, LogicOp, Node};

/// Maximum expression nesting depth.
const MAX_DEPTH: usize = 512;
/// Largest absolute integer exponent accepted.
const MAX_EXPONENT: i64 = 4096;

/// A registered function: parameter names plus a parsed body.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub parameters: Vec<String>,
    pub body: Node,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("calculation timed out")]
    Timeout,

    /// A math-level problem; becomes an error diagnostic.
    #[error("{0}")]
    Math(String),
}

pub struct Evaluator<'a> {
    pub variables: &'a mut HashMap<String, BigRational>,
    pub functions: &'a HashMap<String, FunctionDef>,
    pub deadline: Instant,
}

impl Evaluator<'_> {
    pub fn evaluate(&mut self, node: &Node) -> Result<BigRational, EvalError> {
        self.eval(node, 0)
    }

    fn eval(&mut self, node: &Node, depth: usize) -> Result<BigRational, EvalError> {
        if Instant::now() >= self.deadline {
            return Err(EvalError::Timeout);
        }
        if depth > MAX_DEPTH {
            return Err(EvalError::Math("expression is nested too deeply".into()));
        }

        match node {
            Node::Number(value) => Ok(value.clone()),

            Node::Symbol(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Math(format!("unknown variable: {name}"))),

            Node::Assign(name, value) => {
                if name == "true" || name == "false" {
                    return Err(EvalError::Math(format!("cannot redefine constant {name}")));
                }
                let value = self.eval(value, depth + 1)?;
                self.variables.insert(name.clone(), value.clone());
                Ok(value)
            }

            Node::Binary(op, a, b) => {
                let a = self.eval(a, depth + 1)?;
                let b = self.eval(b, depth + 1)?;
                self.binary(*op, a, b)
            }

            Node::Comparison(op, a, b) => {
                let a = self.eval(a, depth + 1)?;
                let b = self.eval(b, depth + 1)?;
                let holds = match op {
                    CmpOp::Gt => a > b,
                    CmpOp::Lt => a < b,
                    CmpOp::Ge => a >= b,
                    CmpOp::Le => a <= b,
                    CmpOp::Eq => a == b,
                    CmpOp::Ne => a != b,
                };
                Ok(bool_value(holds))
            }

            Node::Logical(op, operands) => {
                // All operands are evaluated; no short-circuiting, so a
                // division by zero on the right is reported either way.
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    values.push(!self.eval(operand, depth + 1)?.is_zero());
                }
                let holds = match op {
                    LogicOp::And => values.iter().all(|v| *v),
                    LogicOp::Or => values.iter().any(|v| *v),
                };
                Ok(bool_value(holds))
            }

            Node::Call(name, args) => self.call(name, args, depth),
        }
    }

    fn binary(&self, op: BinOp, a: BigRational, b: BigRational) -> Result<BigRational, EvalError> {
        match op {
            BinOp::Add => Ok(a + b),
            BinOp::Sub => Ok(a - b),
            BinOp::Mul => Ok(a * b),
            BinOp::Div => {
                if b.is_zero() {
                    Err(EvalError::Math("division by zero".into()))
                } else {
                    Ok(a / b)
                }
            }
            BinOp::Mod => {
                if !a.is_integer() || !b.is_integer() {
                    return Err(EvalError::Math("modulo requires integers".into()));
                }
                if b.is_zero() {
                    return Err(EvalError::Math("division by zero".into()));
                }
                Ok(BigRational::from_integer(a.to_integer() % b.to_integer()))
            }
            BinOp::Pow => pow(&a, &b),
        }
    }

    fn call(&mut self, name: &str, args: &[Node], depth: usize) -> Result<BigRational, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, depth + 1)?);
        }

        if let Some(result) = builtin(name, &values)? {
            return Ok(result);
        }

        let Some(def) = self.functions.get(name) else {
            return Err(EvalError::Math(format!("unknown function: {name}")));
        };
        if def.parameters.len() != values.len() {
            return Err(EvalError::Math(format!(
                "{name}() takes {} argument(s), got {}",
                def.parameters.len(),
                values.len()
            )));
        }

        // Parameters shadow outer variables inside the body; assignments
        // made there stay local.
        let mut scope = self.variables.clone();
        for (parameter, value) in def.parameters.iter().zip(values) {
            scope.insert(parameter.clone(), value);
        }
        let mut inner = Evaluator {
            variables: &mut scope,
            functions: self.functions,
            deadline: self.deadline,
        };
        inner.eval(&def.body, depth + 1)
    }
}

/// Built-in single-argument functions. `Ok(None)` means "not a builtin".
fn builtin(name: &str, args: &[BigRational]) -> Result<Option<BigRational>, EvalError> {
    let apply = |f: fn(&BigRational) -> BigRational| {
        if args.len() == 1 {
            Ok(Some(f(&args[0])))
        } else {
            Err(EvalError::Math(format!(
                "{name}() takes 1 argument, got {}",
                args.len()
            )))
        }
    };

    match name {
        "abs" => apply(|r| r.abs()),
        "floor" => apply(|r| r.floor()),
        "ceil" => apply(|r| r.ceil()),
        "round" => apply(|r| r.round()),
        _ => Ok(None),
    }
}

pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    ["abs", "floor", "ceil", "round"].into_iter()
}

fn bool_value(b: bool) -> BigRational {
    if b {
        BigRational::one()
    } else {
        BigRational::zero()
    }
}

fn pow(base: &BigRational, exponent: &BigRational) -> Result<BigRational, EvalError> {
    if !exponent.is_integer() {
        return Err(EvalError::Math("exponent must be an integer".into()));
    }
    let exponent = exponent.to_integer();
    let Ok(exponent) = i64::try_from(&exponent) else {
        return Err(EvalError::Math("exponent too large".into()));
    };
    if exponent.unsigned_abs() > MAX_EXPONENT as u64 {
        return Err(EvalError::Math("exponent too large".into()));
    }
    let e = exponent.unsigned_abs() as u32;

    if exponent < 0 && base.is_zero() {
        return Err(EvalError::Math("division by zero".into()));
    }

    let numer = int_pow(base.numer(), e);
    let denom = int_pow(base.denom(), e);
    let result = if exponent < 0 {
        BigRational::new(denom, numer)
    } else {
        BigRational::new(numer, denom)
    };
    Ok(result)
}

/// Exponentiation by squaring; exponent already bounded.
fn int_pow(base: &BigInt, mut exponent: u32) -> BigInt {
    let mut result = BigInt::one();
    let mut base = base.clone();
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = &result * &base;
        }
        base = &base * &base;
        exponent >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::token::tokenize;
    use std::collections::HashSet;
    use std::time::Duration;

    fn eval_str(s: &str, variables: &mut HashMap<String, BigRational>) -> Result<BigRational, EvalError> {
        let function_names: HashSet<String> = builtin_names().map(str::to_owned).collect();
        let node = parse(&tokenize(s).unwrap(), &function_names).unwrap();
        let functions = HashMap::new();
        let mut evaluator = Evaluator {
            variables,
            functions: &functions,
            deadline: Instant::now() + Duration::from_secs(5),
        };
        evaluator.evaluate(&node)
    }

    fn eval_ok(s: &str) -> BigRational {
        eval_str(s, &mut HashMap::new()).unwrap()
    }

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn arithmetic_is_exact() {
        assert_eq!(eval_ok("1/2 + 1/3"), rat(5, 6));
        assert_eq!(eval_ok("2/3 * 3/4"), rat(1, 2));
        assert_eq!(eval_ok("0.1 + 0.2"), rat(3, 10));
    }

    #[test]
    fn negative_and_parenthesized() {
        assert_eq!(eval_ok("-(1/2) + 1"), rat(1, 2));
        assert_eq!(eval_ok("2 - -3"), rat(5, 1));
    }

    #[test]
    fn power_with_negative_exponent() {
        assert_eq!(eval_ok("2^10"), rat(1024, 1));
        assert_eq!(eval_ok("2^-2"), rat(1, 4));
        assert_eq!(eval_ok("-2^2"), rat(-4, 1));
    }

    #[test]
    fn fractional_exponent_is_a_math_error() {
        assert!(matches!(eval_str("2^(1/2)", &mut HashMap::new()), Err(EvalError::Math(_))));
    }

    #[test]
    fn oversized_exponent_is_a_math_error() {
        assert!(matches!(eval_str("2^99999", &mut HashMap::new()), Err(EvalError::Math(_))));
    }

    #[test]
    fn division_by_zero_is_a_math_error() {
        let err = eval_str("1/0", &mut HashMap::new()).unwrap_err();
        assert_eq!(err, EvalError::Math("division by zero".into()));
        assert!(eval_str("5 % 0", &mut HashMap::new()).is_err());
        assert!(eval_str("0^-1", &mut HashMap::new()).is_err());
    }

    #[test]
    fn modulo_of_integers() {
        assert_eq!(eval_ok("17 % 5"), rat(2, 1));
        assert!(eval_str("1/2 % 2", &mut HashMap::new()).is_err());
    }

    #[test]
    fn comparisons_yield_one_or_zero() {
        assert_eq!(eval_ok("2 > 1"), rat(1, 1));
        assert_eq!(eval_ok("1 > 2"), rat(0, 1));
        assert_eq!(eval_ok("1/3 <= 2/6"), rat(1, 1));
        assert_eq!(eval_ok("1 != 1"), rat(0, 1));
    }

    #[test]
    fn logical_connectives() {
        assert_eq!(eval_ok("2 > 1 && 3 > 2"), rat(1, 1));
        assert_eq!(eval_ok("2 > 1 && 2 > 3"), rat(0, 1));
        assert_eq!(eval_ok("1 > 2 or 2 > 1"), rat(1, 1));
    }

    #[test]
    fn assignment_updates_the_environment() {
        let mut variables = HashMap::new();
        assert_eq!(eval_str("x := 2", &mut variables).unwrap(), rat(2, 1));
        assert_eq!(eval_str("x + 3", &mut variables).unwrap(), rat(5, 1));
    }

    #[test]
    fn constants_cannot_be_redefined() {
        let mut variables = HashMap::new();
        variables.insert("true".into(), BigRational::one());
        assert!(eval_str("true := 0", &mut variables).is_err());
    }

    #[test]
    fn unknown_variable_is_a_math_error() {
        let err = eval_str("y + 1", &mut HashMap::new()).unwrap_err();
        assert_eq!(err, EvalError::Math("unknown variable: y".into()));
    }

    #[test]
    fn builtins() {
        assert_eq!(eval_ok("abs(-3)"), rat(3, 1));
        assert_eq!(eval_ok("floor(7/2)"), rat(3, 1));
        assert_eq!(eval_ok("ceil(7/2)"), rat(4, 1));
        assert_eq!(eval_ok("round(7/2)"), rat(4, 1));
    }

    #[test]
    fn user_function_binds_parameters_locally() {
        let function_names: HashSet<String> = ["twice".to_string()].into_iter().collect();
        let body = parse(&tokenize("x * 2").unwrap(), &function_names).unwrap();
        let functions: HashMap<String, FunctionDef> = [(
            "twice".to_string(),
            FunctionDef {
                parameters: vec!["x".into()],
                body,
            },
        )]
        .into_iter()
        .collect();

        let mut variables = HashMap::new();
        variables.insert("x".to_string(), rat(100, 1));

        let node = parse(&tokenize("twice(4)").unwrap(), &function_names).unwrap();
        let mut evaluator = Evaluator {
            variables: &mut variables,
            functions: &functions,
            deadline: Instant::now() + Duration::from_secs(5),
        };
        assert_eq!(evaluator.evaluate(&node).unwrap(), rat(8, 1));
        // The outer x is untouched.
        assert_eq!(variables["x"], rat(100, 1));
    }

    #[test]
    fn exhausted_deadline_times_out() {
        let node = parse(
            &tokenize("1 + 1").unwrap(),
            &HashSet::new(),
        )
        .unwrap();
        let mut variables = HashMap::new();
        let functions = HashMap::new();
        // A deadline of "now" has always passed by the time eval runs.
        let mut evaluator = Evaluator {
            variables: &mut variables,
            functions: &functions,
            deadline: Instant::now(),
        };
        assert_eq!(evaluator.evaluate(&node), Err(EvalError::Timeout));
    }
}
