//! Shunting-yard parser.
//!
//! Tokens are folded directly into [`Node`]s: operators wait on a stack
//! and are applied to the output as precedence demands. Unary minus is
//! expressed as `0 - x` with its own tighter-than-multiplication stack
//! entry, so `2 - -3` and `-2^2` both resolve the usual way, and the
//! renderer can give the `0 - x` shape back as a plain sign.
//!
//! Function identifiers are recognized against the registry the engine
//! passes in; an identifier not in the registry is a variable reference,
//! and adjacency of two values means multiplication (`5 ticks`, `2(3+4)`).

use std::collections::HashSet;

use num_rational::BigRational;
use num_traits::Zero;

use crate::node::{BinOp, CmpOp, LogicOp, Node};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Neg,
    Cmp(CmpOp),
    Logic(LogicOp),
}

fn precedence(op: OpKind) -> u8 {
    match op {
        OpKind::Logic(LogicOp::Or) => 1,
        OpKind::Logic(LogicOp::And) => 2,
        OpKind::Cmp(_) => 3,
        OpKind::Add | OpKind::Sub => 4,
        OpKind::Mul | OpKind::Div | OpKind::Mod => 5,
        OpKind::Neg => 6,
        OpKind::Pow => 7,
    }
}

fn right_associative(op: OpKind) -> bool {
    matches!(op, OpKind::Pow | OpKind::Neg)
}

enum OpEntry {
    Op(OpKind),
    Paren {
        /// Set when the parenthesis opens a call's argument list.
        function: Option<String>,
        commas: usize,
        /// Output length when the parenthesis opened, to count the values
        /// produced inside it.
        out_mark: usize,
    },
}

/// Parse a full expression line.
///
/// An assignment `name := expr` is only recognized at the start of the
/// line; everything else is an expression.
pub fn parse(tokens: &[Token], functions: &HashSet<String>) -> Result<Node, String> {
    if let [Token::Ident(name), Token::Assign, rest @ ..] = tokens {
        if rest.is_empty() {
            return Err("missing value after ':='".into());
        }
        let value = parse_expression(rest, functions)?;
        return Ok(Node::Assign(name.clone(), Box::new(value)));
    }
    parse_expression(tokens, functions)
}

fn parse_expression(tokens: &[Token], functions: &HashSet<String>) -> Result<Node, String> {
    let mut shunt = Shunt {
        functions,
        out: Vec::new(),
        ops: Vec::new(),
    };
    shunt.run(tokens)?;
    shunt.finish()
}

struct Shunt<'a> {
    functions: &'a HashSet<String>,
    out: Vec<Node>,
    ops: Vec<OpEntry>,
}

impl Shunt<'_> {
    fn run(&mut self, tokens: &[Token]) -> Result<(), String> {
        let mut prev_was_value = false;
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Number(value) => {
                    if prev_was_value {
                        self.push_op(OpKind::Mul)?;
                    }
                    self.out.push(Node::Number(value.clone()));
                    prev_was_value = true;
                }

                Token::Ident(name) => {
                    if prev_was_value {
                        self.push_op(OpKind::Mul)?;
                    }
                    if self.functions.contains(name)
                        && matches!(tokens.get(i + 1), Some(Token::LParen))
                    {
                        self.ops.push(OpEntry::Paren {
                            function: Some(name.clone()),
                            commas: 0,
                            out_mark: self.out.len(),
                        });
                        i += 2;
                        prev_was_value = false;
                        continue;
                    }
                    self.out.push(Node::symbol(name.clone()));
                    prev_was_value = true;
                }

                Token::LParen => {
                    if prev_was_value {
                        self.push_op(OpKind::Mul)?;
                    }
                    self.ops.push(OpEntry::Paren {
                        function: None,
                        commas: 0,
                        out_mark: self.out.len(),
                    });
                    prev_was_value = false;
                }

                Token::RParen => {
                    self.close_paren()?;
                    prev_was_value = true;
                }

                Token::Comma => {
                    self.drain_to_paren("unexpected ','")?;
                    match self.ops.last_mut() {
                        Some(OpEntry::Paren {
                            function: Some(_),
                            commas,
                            ..
                        }) => *commas += 1,
                        _ => return Err("unexpected ','".into()),
                    }
                    prev_was_value = false;
                }

                Token::Minus if !prev_was_value => {
                    // Prefix operator: pushed without flushing the stack,
                    // or a pending `^`/`*` would fire on the injected zero.
                    self.out.push(Node::Number(BigRational::zero()));
                    self.ops.push(OpEntry::Op(OpKind::Neg));
                }

                // Unary plus is a no-op.
                Token::Plus if !prev_was_value => {}

                Token::Assign => return Err("':=' is only allowed at the start of a line".into()),

                token => {
                    if !prev_was_value {
                        return Err("operator is missing its left operand".into());
                    }
                    let op = match token {
                        Token::Plus => OpKind::Add,
                        Token::Minus => OpKind::Sub,
                        Token::Star => OpKind::Mul,
                        Token::Slash => OpKind::Div,
                        Token::Percent => OpKind::Mod,
                        Token::Caret => OpKind::Pow,
                        Token::Gt => OpKind::Cmp(CmpOp::Gt),
                        Token::Lt => OpKind::Cmp(CmpOp::Lt),
                        Token::Ge => OpKind::Cmp(CmpOp::Ge),
                        Token::Le => OpKind::Cmp(CmpOp::Le),
                        Token::Eq => OpKind::Cmp(CmpOp::Eq),
                        Token::Ne => OpKind::Cmp(CmpOp::Ne),
                        Token::And => OpKind::Logic(LogicOp::And),
                        Token::Or => OpKind::Logic(LogicOp::Or),
                        _ => unreachable!("handled above"),
                    };
                    self.push_op(op)?;
                    prev_was_value = false;
                }
            }
            i += 1;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Node, String> {
        while let Some(entry) = self.ops.pop() {
            match entry {
                OpEntry::Op(op) => self.apply(op)?,
                OpEntry::Paren { .. } => return Err("unclosed parenthesis".into()),
            }
        }
        if self.out.len() == 1 {
            Ok(self.out.pop().expect("length checked"))
        } else {
            Err("invalid expression".into())
        }
    }

    /// Pop operators the precedence rules say must apply first, then push.
    fn push_op(&mut self, op: OpKind) -> Result<(), String> {
        while let Some(OpEntry::Op(top)) = self.ops.last() {
            let top = *top;
            let must_apply = precedence(top) > precedence(op)
                || (precedence(top) == precedence(op) && !right_associative(op));
            if !must_apply {
                break;
            }
            self.ops.pop();
            self.apply(top)?;
        }
        self.ops.push(OpEntry::Op(op));
        Ok(())
    }

    /// Apply pending operators down to, but not including, the nearest
    /// open parenthesis.
    fn drain_to_paren(&mut self, context: &str) -> Result<(), String> {
        loop {
            match self.ops.last() {
                Some(OpEntry::Op(op)) => {
                    let op = *op;
                    self.ops.pop();
                    self.apply(op)?;
                }
                Some(OpEntry::Paren { .. }) => return Ok(()),
                None => return Err(context.into()),
            }
        }
    }

    fn close_paren(&mut self) -> Result<(), String> {
        self.drain_to_paren("unmatched ')'")?;
        let Some(OpEntry::Paren {
            function,
            commas,
            out_mark,
        }) = self.ops.pop()
        else {
            return Err("unmatched ')'".into());
        };

        let produced = self.out.len() - out_mark;
        match function {
            Some(name) => {
                let arity = commas + 1;
                if produced != arity {
                    return Err(format!("wrong number of arguments to {name}()"));
                }
                let args = self.out.split_off(self.out.len() - arity);
                self.out.push(Node::Call(name, args));
            }
            None => {
                if produced != 1 {
                    return Err("empty parentheses".into());
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: OpKind) -> Result<(), String> {
        let b = self.out.pop().ok_or("invalid expression")?;
        let a = self.out.pop().ok_or("invalid expression")?;
        let node = match op {
            OpKind::Add => Node::Binary(BinOp::Add, Box::new(a), Box::new(b)),
            OpKind::Sub | OpKind::Neg => Node::Binary(BinOp::Sub, Box::new(a), Box::new(b)),
            OpKind::Mul => Node::Binary(BinOp::Mul, Box::new(a), Box::new(b)),
            OpKind::Div => Node::Binary(BinOp::Div, Box::new(a), Box::new(b)),
            OpKind::Mod => Node::Binary(BinOp::Mod, Box::new(a), Box::new(b)),
            OpKind::Pow => Node::Binary(BinOp::Pow, Box::new(a), Box::new(b)),
            OpKind::Cmp(cmp) => Node::Comparison(cmp, Box::new(a), Box::new(b)),
            // Left-flatten chains so `a && b && c` is one n-ary node.
            OpKind::Logic(logic) => match a {
                Node::Logical(existing, mut operands) if existing == logic => {
                    operands.push(b);
                    Node::Logical(existing, operands)
                }
                other => Node::Logical(logic, vec![other, b]),
            },
        };
        self.out.push(node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn parse_str(s: &str) -> Result<Node, String> {
        let functions: HashSet<String> =
            ["floor".to_string(), "max".to_string()].into_iter().collect();
        parse(&tokenize(s).unwrap(), &functions)
    }

    fn unwrap_binary(node: &Node) -> (BinOp, &Node, &Node) {
        match node {
            Node::Binary(op, a, b) => (*op, a.as_ref(), b.as_ref()),
            other => panic!("expected binary node, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let node = parse_str("2 + 3 * 4").unwrap();
        let (op, _, rhs) = unwrap_binary(&node);
        assert_eq!(op, BinOp::Add);
        assert_eq!(unwrap_binary(rhs).0, BinOp::Mul);
    }

    #[test]
    fn parentheses_override_precedence() {
        let node = parse_str("(2 + 3) * 4").unwrap();
        let (op, lhs, _) = unwrap_binary(&node);
        assert_eq!(op, BinOp::Mul);
        assert_eq!(unwrap_binary(lhs).0, BinOp::Add);
    }

    #[test]
    fn power_is_right_associative() {
        let node = parse_str("2 ^ 3 ^ 2").unwrap();
        let (op, _, rhs) = unwrap_binary(&node);
        assert_eq!(op, BinOp::Pow);
        assert_eq!(unwrap_binary(rhs).0, BinOp::Pow);
    }

    #[test]
    fn unary_minus_becomes_zero_minus() {
        let node = parse_str("-3").unwrap();
        let (op, lhs, _) = unwrap_binary(&node);
        assert_eq!(op, BinOp::Sub);
        assert!(matches!(lhs, Node::Number(r) if num_traits::Zero::is_zero(r)));
    }

    #[test]
    fn double_negative_subtraction_parses() {
        // 2 - -3: the inner minus is unary.
        let node = parse_str("2 - -3").unwrap();
        let (op, _, rhs) = unwrap_binary(&node);
        assert_eq!(op, BinOp::Sub);
        assert_eq!(unwrap_binary(rhs).0, BinOp::Sub);
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        // -2^2 is -(2^2).
        let node = parse_str("-2^2").unwrap();
        let (op, _, rhs) = unwrap_binary(&node);
        assert_eq!(op, BinOp::Sub);
        assert_eq!(unwrap_binary(rhs).0, BinOp::Pow);
    }

    #[test]
    fn comparison_chain_flattens_into_one_logical_node() {
        let node = parse_str("1 > 0 && 2 > 1 && 3 > 2").unwrap();
        let Node::Logical(LogicOp::And, operands) = node else {
            panic!("expected logical node");
        };
        assert_eq!(operands.len(), 3);
        assert!(operands.iter().all(|o| matches!(o, Node::Comparison(..))));
    }

    #[test]
    fn comparison_binds_tighter_than_logic() {
        let node = parse_str("1 > 0 or 0 > 1").unwrap();
        let Node::Logical(LogicOp::Or, operands) = node else {
            panic!("expected logical node");
        };
        assert_eq!(operands.len(), 2);
    }

    #[test]
    fn assignment_at_line_start() {
        let node = parse_str("x := 2 + 3").unwrap();
        let Node::Assign(name, value) = node else {
            panic!("expected assignment");
        };
        assert_eq!(name, "x");
        assert_eq!(unwrap_binary(&value).0, BinOp::Add);
    }

    #[test]
    fn assignment_elsewhere_is_an_error() {
        assert!(parse_str("1 + x := 2").is_err());
        assert!(parse_str("x :=").is_err());
    }

    #[test]
    fn registered_function_call() {
        let node = parse_str("floor(7/2)").unwrap();
        let Node::Call(name, args) = node else {
            panic!("expected call");
        };
        assert_eq!(name, "floor");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn two_argument_call() {
        let node = parse_str("max(1, 2)").unwrap();
        let Node::Call(_, args) = node else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn unregistered_identifier_is_a_variable() {
        // `x(3)` where x is no function: adjacency means multiplication.
        let node = parse_str("x(3)").unwrap();
        assert_eq!(unwrap_binary(&node).0, BinOp::Mul);
    }

    #[test]
    fn implicit_multiplication_between_values() {
        assert_eq!(unwrap_binary(&parse_str("5 ticks").unwrap()).0, BinOp::Mul);
        assert_eq!(unwrap_binary(&parse_str("2(3+4)").unwrap()).0, BinOp::Mul);
        assert_eq!(unwrap_binary(&parse_str("(1+1)(2+2)").unwrap()).0, BinOp::Mul);
    }

    #[test]
    fn malformed_expressions_are_errors() {
        assert!(parse_str("(2 + 3").is_err());
        assert!(parse_str("2 + 3)").is_err());
        assert!(parse_str("2 +").is_err());
        assert!(parse_str("* 2").is_err());
        assert!(parse_str("()").is_err());
        assert!(parse_str("1, 2").is_err());
        assert!(parse_str("floor(1, 2)").is_err());
        assert!(parse_str("max(1)").is_ok()); // arity checked at eval time
    }
}
