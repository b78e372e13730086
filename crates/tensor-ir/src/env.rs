//! Type environment: the recognized dtype vocabulary, the symbol table, and
//! the shape/dtype rules enforced before any instruction is emitted.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::ir::BinOp;
use crate::tensor::{Dtype, TensorType};

/// Failures raised during validation and type inference.
///
/// Every failure aborts the build that triggered it. None are downgraded to
/// warnings and none are deferred to emission time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown dtype `{dtype}`")]
    UnknownDtype { dtype: Dtype },
    #[error("shape {shape:?} has a non-positive dimension")]
    InvalidShape { shape: Vec<usize> },
    #[error("symbol `{name}` is not declared")]
    UndeclaredSymbol { name: String },
    #[error("cannot mix dtypes `{lhs}` and `{rhs}` in {op}")]
    DtypeMismatch { op: BinOp, lhs: Dtype, rhs: Dtype },
    #[error("shapes {lhs:?} and {rhs:?} are not broadcastable")]
    IncompatibleShapes { lhs: Vec<usize>, rhs: Vec<usize> },
    #[error("MatMul requires operands of rank 2 or greater, got {lhs_rank} and {rhs_rank}")]
    RankError { lhs_rank: usize, rhs_rank: usize },
    #[error("MatMul inner dimensions disagree: {lhs} vs {rhs}")]
    DimensionMismatch { lhs: usize, rhs: usize },
}

pub type TypeResult<T> = Result<T, TypeError>;

/// Recognized dtypes plus the symbol table one build compiles against.
///
/// The environment is read-only while an expression is emitted; every
/// per-build mutable state lives on [`Lowering`](crate::lower::Lowering),
/// so one environment can serve several builds in sequence without leaking
/// anything between them.
#[derive(Debug, Clone)]
pub struct TypeEnv {
    known_dtypes: BTreeSet<Dtype>,
    symbols: BTreeMap<String, TensorType>,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::with_dtypes(["f32", "f64", "i32", "i64"])
    }
}

impl TypeEnv {
    /// Environment with the default numeric dtype vocabulary
    /// (`f32`, `f64`, `i32`, `i64`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment recognizing exactly the supplied dtype tags. This is the
    /// hook a host binding uses to install its own vocabulary.
    pub fn with_dtypes<I>(dtypes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Dtype>,
    {
        Self {
            known_dtypes: dtypes.into_iter().map(Into::into).collect(),
            symbols: BTreeMap::new(),
        }
    }

    pub fn validate_dtype(&self, dtype: &Dtype) -> TypeResult<()> {
        if self.known_dtypes.contains(dtype) {
            Ok(())
        } else {
            Err(TypeError::UnknownDtype {
                dtype: dtype.clone(),
            })
        }
    }

    pub fn validate_shape(&self, shape: &[usize]) -> TypeResult<()> {
        if shape.iter().any(|dim| *dim == 0) {
            return Err(TypeError::InvalidShape {
                shape: shape.to_vec(),
            });
        }
        Ok(())
    }

    /// Composes the dtype and shape checks, passing the type through on
    /// success.
    pub fn validate_tensor<'t>(&self, tensor: &'t TensorType) -> TypeResult<&'t TensorType> {
        self.validate_dtype(&tensor.dtype)?;
        self.validate_shape(&tensor.shape)?;
        Ok(tensor)
    }

    /// Validates and stores a symbol. Redeclaring a name overwrites the
    /// previous entry (last write wins).
    pub fn declare_symbol(
        &mut self,
        name: impl Into<String>,
        tensor: TensorType,
    ) -> TypeResult<()> {
        self.validate_tensor(&tensor)?;
        self.symbols.insert(name.into(), tensor);
        Ok(())
    }

    pub fn resolve_symbol(&self, name: &str) -> TypeResult<&TensorType> {
        self.symbols
            .get(name)
            .ok_or_else(|| TypeError::UndeclaredSymbol {
                name: name.to_string(),
            })
    }

    /// Aligns two shapes from the trailing dimension: equal dimensions pass
    /// through, a size-1 dimension stretches to its counterpart, and a
    /// missing leading dimension defaults to 1. This is the general rule
    /// used by all elementwise binary operators.
    pub fn broadcast(&self, lhs: &[usize], rhs: &[usize]) -> TypeResult<Vec<usize>> {
        let rank = lhs.len().max(rhs.len());
        let mut dims = vec![0usize; rank];
        for offset in 0..rank {
            let l = if offset < lhs.len() {
                lhs[lhs.len() - 1 - offset]
            } else {
                1
            };
            let r = if offset < rhs.len() {
                rhs[rhs.len() - 1 - offset]
            } else {
                1
            };
            dims[rank - 1 - offset] = if l == r {
                l
            } else if l == 1 {
                r
            } else if r == 1 {
                l
            } else {
                return Err(TypeError::IncompatibleShapes {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                });
            };
        }
        Ok(dims)
    }

    /// Result type of an elementwise binary operator: dtypes must match
    /// exactly and the result shape is the broadcast of both operand
    /// shapes.
    pub fn validate_binop(
        &self,
        op: BinOp,
        lhs: &TensorType,
        rhs: &TensorType,
    ) -> TypeResult<TensorType> {
        self.validate_tensor(lhs)?;
        self.validate_tensor(rhs)?;
        self.ensure_same_dtype(op, lhs, rhs)?;
        let shape = self.broadcast(&lhs.shape, &rhs.shape)?;
        Ok(TensorType::new(lhs.dtype.clone(), shape))
    }

    /// Result type of a batched matrix multiply: both operands need rank 2
    /// or greater, the lhs columns must equal the rhs rows, and the leading
    /// batch dimensions combine by broadcasting.
    pub fn validate_matmul(&self, lhs: &TensorType, rhs: &TensorType) -> TypeResult<TensorType> {
        self.validate_tensor(lhs)?;
        self.validate_tensor(rhs)?;
        self.ensure_same_dtype(BinOp::MatMul, lhs, rhs)?;
        if lhs.rank() < 2 || rhs.rank() < 2 {
            return Err(TypeError::RankError {
                lhs_rank: lhs.rank(),
                rhs_rank: rhs.rank(),
            });
        }
        let inner_lhs = lhs.shape[lhs.rank() - 1];
        let inner_rhs = rhs.shape[rhs.rank() - 2];
        if inner_lhs != inner_rhs {
            return Err(TypeError::DimensionMismatch {
                lhs: inner_lhs,
                rhs: inner_rhs,
            });
        }
        let mut shape =
            self.broadcast(&lhs.shape[..lhs.rank() - 2], &rhs.shape[..rhs.rank() - 2])?;
        shape.push(lhs.shape[lhs.rank() - 2]);
        shape.push(rhs.shape[rhs.rank() - 1]);
        Ok(TensorType::new(lhs.dtype.clone(), shape))
    }

    /// Re-validates every declared symbol; the pre-flight check a build
    /// runs before emitting anything.
    pub fn validate_program(&self) -> TypeResult<()> {
        for tensor in self.symbols.values() {
            self.validate_tensor(tensor)?;
        }
        Ok(())
    }

    fn ensure_same_dtype(&self, op: BinOp, lhs: &TensorType, rhs: &TensorType) -> TypeResult<()> {
        if lhs.dtype != rhs.dtype {
            return Err(TypeError::DtypeMismatch {
                op,
                lhs: lhs.dtype.clone(),
                rhs: rhs.dtype.clone(),
            });
        }
        Ok(())
    }
}
