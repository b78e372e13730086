//! Surface expression tree and its type inference.

use crate::env::{TypeEnv, TypeResult};
use crate::ir::{AttrValue, BinOp};
use crate::tensor::{Dtype, TensorType};

/// Scalar payload of a literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Int(value)
    }
}

impl From<f64> for LiteralValue {
    fn from(value: f64) -> Self {
        LiteralValue::Float(value)
    }
}

impl From<&LiteralValue> for AttrValue {
    fn from(value: &LiteralValue) -> Self {
        match value {
            LiteralValue::Int(v) => AttrValue::Int(*v),
            LiteralValue::Float(v) => AttrValue::Float(*v),
        }
    }
}

/// Surface-language expression.
///
/// The variant set is closed by the language definition, so both operations
/// over it — type inference here and emission in
/// [`Lowering::emit`](crate::lower::Lowering::emit) — match exhaustively
/// rather than dispatching through a trait object.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant tensor with an explicit dtype and shape.
    Literal {
        value: LiteralValue,
        dtype: Dtype,
        shape: Vec<usize>,
    },
    /// Reference to a symbol declared in the type environment.
    Var { name: String },
    /// Binary combination of two subexpressions.
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn literal(
        value: impl Into<LiteralValue>,
        dtype: impl Into<Dtype>,
        shape: impl Into<Vec<usize>>,
    ) -> Self {
        Expr::Literal {
            value: value.into(),
            dtype: dtype.into(),
            shape: shape.into(),
        }
    }

    /// Rank-0 literal.
    pub fn scalar(value: impl Into<LiteralValue>, dtype: impl Into<Dtype>) -> Self {
        Self::literal(value, dtype, Vec::new())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var { name: name.into() }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Div, self, rhs)
    }

    pub fn maximum(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Maximum, self, rhs)
    }

    pub fn minimum(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Minimum, self, rhs)
    }

    pub fn matmul(self, rhs: Expr) -> Self {
        Self::binary(BinOp::MatMul, self, rhs)
    }

    /// Infers the result type against `env` without emitting anything.
    ///
    /// Literals validate their own declared type, variables resolve through
    /// the symbol table, and binary nodes dispatch on the operator tag: the
    /// contraction tag uses the matmul rule, everything else the
    /// elementwise/broadcast rule.
    pub fn infer_type(&self, env: &TypeEnv) -> TypeResult<TensorType> {
        match self {
            Expr::Literal { dtype, shape, .. } => {
                let tensor = TensorType::new(dtype.clone(), shape.clone());
                env.validate_tensor(&tensor)?;
                Ok(tensor)
            }
            Expr::Var { name } => Ok(env.resolve_symbol(name)?.clone()),
            Expr::Binary { op, lhs, rhs } => {
                let lhs_type = lhs.infer_type(env)?;
                let rhs_type = rhs.infer_type(env)?;
                if op.is_contraction() {
                    env.validate_matmul(&lhs_type, &rhs_type)
                } else {
                    env.validate_binop(*op, &lhs_type, &rhs_type)
                }
            }
        }
    }
}
