//! Expression tree.
//!
//! Logical connectives are n-ary so that a chain like `a > b && b > c &&
//! c > d` is one node whose operands the front end can walk when deciding
//! whether the whole expression is a pure comparison.

use calcbox::ExprView;
use num_rational::BigRational;
use num_traits::{One, Zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(BigRational),
    /// A name: variable reference, or the raw echo of unparseable input.
    Symbol(String),
    Assign(String, Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Comparison(CmpOp, Box<Node>, Box<Node>),
    Logical(LogicOp, Vec<Node>),
    Call(String, Vec<Node>),
}

impl Node {
    pub fn number(value: impl Into<BigRational>) -> Self {
        Node::Number(value.into())
    }

    pub fn symbol(text: impl Into<String>) -> Self {
        Node::Symbol(text.into())
    }
}

impl ExprView for Node {
    fn is_comparison(&self) -> bool {
        matches!(self, Node::Comparison(..))
    }

    fn is_logical_and(&self) -> bool {
        matches!(self, Node::Logical(LogicOp::And, _))
    }

    fn is_logical_or(&self) -> bool {
        matches!(self, Node::Logical(LogicOp::Or, _))
    }

    fn child_count(&self) -> usize {
        match self {
            Node::Number(_) | Node::Symbol(_) => 0,
            Node::Assign(_, _) => 1,
            Node::Binary(..) | Node::Comparison(..) => 2,
            Node::Logical(_, operands) => operands.len(),
            Node::Call(_, args) => args.len(),
        }
    }

    fn child(&self, index: usize) -> Option<&Self> {
        match self {
            Node::Number(_) | Node::Symbol(_) => None,
            Node::Assign(_, value) => (index == 0).then_some(value.as_ref()),
            Node::Binary(_, a, b) | Node::Comparison(_, a, b) => match index {
                0 => Some(a),
                1 => Some(b),
                _ => None,
            },
            Node::Logical(_, operands) => operands.get(index),
            Node::Call(_, args) => args.get(index),
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Node::Number(r) if r.is_zero())
    }

    fn is_one(&self) -> bool {
        matches!(self, Node::Number(r) if r.is_one())
    }
}
