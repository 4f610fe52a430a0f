//! Math expression trees over wrapped operands.

use crate::error::ScriptError;
use crate::object::Registry;
use crate::wrapper::ElementWrapper;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// Addition: `+`
    Add,
    /// Subtraction: `-`
    Sub,
    /// Multiplication: `*`
    Mul,
    /// Division: `/`
    Div,
}

impl MathOp {
    /// The operator's script symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
        }
    }
}

/// An operator tree producing a scalar from wrapped operands.
#[derive(Debug, Clone, PartialEq)]
pub enum MathNode {
    /// A single wrapped operand.
    Leaf(ElementWrapper),
    /// A binary operation.
    Binary {
        /// The operator.
        op: MathOp,
        /// Left operand.
        left: Box<MathNode>,
        /// Right operand.
        right: Box<MathNode>,
    },
    /// Unary negation.
    Negate(Box<MathNode>),
}

impl MathNode {
    /// Evaluate the tree against the given object map.
    pub fn evaluate(&self, map: &Registry) -> Result<f64, ScriptError> {
        match self {
            MathNode::Leaf(w) => w.evaluate_real(map),
            MathNode::Negate(inner) => Ok(-inner.evaluate(map)?),
            MathNode::Binary { op, left, right } => {
                let l = left.evaluate(map)?;
                let r = right.evaluate(map)?;
                match op {
                    MathOp::Add => Ok(l + r),
                    MathOp::Sub => Ok(l - r),
                    MathOp::Mul => Ok(l * r),
                    MathOp::Div => {
                        if r == 0.0 {
                            return Err(ScriptError::TypeMismatch(
                                "division by zero".to_string(),
                            ));
                        }
                        Ok(l / r)
                    }
                }
            }
        }
    }

    /// If the tree is a single leaf, expose it.
    pub fn as_leaf(&self) -> Option<&ElementWrapper> {
        match self {
            MathNode::Leaf(w) => Some(w),
            _ => None,
        }
    }

    /// Validate every wrapped operand against `map`.
    pub fn validate(&self, map: &Registry) -> Result<(), ScriptError> {
        match self {
            MathNode::Leaf(w) => w.validate(map),
            MathNode::Negate(inner) => inner.validate(map),
            MathNode::Binary { left, right, .. } => {
                left.validate(map)?;
                right.validate(map)
            }
        }
    }

    /// Names of all objects referenced anywhere in the tree.
    pub fn ref_object_names(&self) -> Vec<String> {
        match self {
            MathNode::Leaf(w) => w.ref_object_names(),
            MathNode::Negate(inner) => inner.ref_object_names(),
            MathNode::Binary { left, right, .. } => {
                let mut names = left.ref_object_names();
                names.extend(right.ref_object_names());
                names
            }
        }
    }

    /// Propagate an object rename through every operand.
    pub fn rename_object(&mut self, old: &str, new: &str) {
        match self {
            MathNode::Leaf(w) => w.rename_object(old, new),
            MathNode::Negate(inner) => inner.rename_object(old, new),
            MathNode::Binary { left, right, .. } => {
                left.rename_object(old, new);
                right.rename_object(old, new);
            }
        }
    }
}
