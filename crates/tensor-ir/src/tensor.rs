//! Tensor value types shared by the type environment and the IR.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Immutable element-type tag (e.g. `f32`).
///
/// The vocabulary is open: which tags are valid is decided by the dtype set
/// supplied at [`TypeEnv`](crate::env::TypeEnv) construction, not by this
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dtype(Arc<str>);

impl Dtype {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::<str>::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Dtype {
    fn from(name: &str) -> Self {
        Dtype::new(name)
    }
}

impl From<String> for Dtype {
    fn from(name: String) -> Self {
        Dtype::new(name)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Dtype {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Dtype {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Dtype::new(name))
    }
}

/// Tensor metadata coupling dtype and shape.
///
/// A plain value type compared structurally; a scalar is the empty shape.
/// The canonical rendering is `tensor<DTYPE[d0, d1, ...]>`, with an empty
/// bracket pair for scalars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorType {
    pub dtype: Dtype,
    pub shape: Vec<usize>,
}

impl TensorType {
    pub fn new(dtype: impl Into<Dtype>, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            dtype: dtype.into(),
            shape: shape.into(),
        }
    }

    /// Rank-0 type with an empty shape.
    pub fn scalar(dtype: impl Into<Dtype>) -> Self {
        Self::new(dtype, Vec::new())
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<{}", self.dtype)?;
        fmt_dims(f, &self.shape)?;
        f.write_str(">")
    }
}

/// Writes `[d0, d1, ...]` (or `[]`), the dimension-list form shared by type
/// renderings and attribute values.
pub(crate) fn fmt_dims(f: &mut fmt::Formatter<'_>, dims: &[usize]) -> fmt::Result {
    f.write_str("[")?;
    for (index, dim) in dims.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{dim}")?;
    }
    f.write_str("]")
}
