//! Flat single-assignment IR: instructions, modules, and the canonical text
//! encoding downstream consumers rely on.
//!
//! Value ids are assigned `0..K-1` strictly in emission order and operands
//! only reference earlier instructions; [`Module::verify`] re-checks those
//! invariants for modules that arrive from outside the builder API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tensor::fmt_dims;

/// Unique identifier for SSA values within one [`Module`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Binary operator tags of the surface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Maximum,
    Minimum,
    MatMul,
}

impl BinOp {
    /// Opcode mnemonic used in the canonical text.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "Add",
            BinOp::Sub => "Sub",
            BinOp::Mul => "Mul",
            BinOp::Div => "Div",
            BinOp::Maximum => "Maximum",
            BinOp::Minimum => "Minimum",
            BinOp::MatMul => "MatMul",
        }
    }

    /// True for the contraction tag; every other tag is elementwise.
    pub fn is_contraction(self) -> bool {
        matches!(self, BinOp::MatMul)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Opcode vocabulary of emitted instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Materialized reference to an externally supplied symbol.
    Input,
    /// Constant tensor described entirely by its attributes.
    ConstTensor,
    /// Binary combination of two earlier values.
    Binary(BinOp),
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Input => "Input",
            Opcode::ConstTensor => "ConstTensor",
            Opcode::Binary(op) => op.mnemonic(),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Attribute payload attached to an instruction.
///
/// The rendering of each variant is deterministic so attribute text never
/// depends on anything but the stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Dims(Vec<usize>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(value) => f.write_str(value),
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Float(value) => write!(f, "{value}"),
            AttrValue::Dims(dims) => fmt_dims(f, dims),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<Vec<usize>> for AttrValue {
    fn from(dims: Vec<usize>) -> Self {
        AttrValue::Dims(dims)
    }
}

/// A single SSA instruction.
///
/// Attributes live in a `BTreeMap` so iteration (and therefore rendering)
/// is always sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: ValueId,
    pub opcode: Opcode,
    pub operands: Vec<ValueId>,
    pub attributes: BTreeMap<String, AttrValue>,
    pub result_type: Option<String>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.id, self.opcode)?;
        if !self.operands.is_empty() {
            f.write_str(" (")?;
            for (index, operand) in self.operands.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{operand}")?;
            }
            f.write_str(")")?;
        }
        if !self.attributes.is_empty() {
            f.write_str(" {")?;
            for (index, (key, value)) in self.attributes.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("}")?;
        }
        if let Some(result_type) = &self.result_type {
            write!(f, " : {result_type}")?;
        }
        Ok(())
    }
}

/// Single-assignment violations surfaced by [`Module::verify`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleVerifyError {
    #[error("instruction #{index} has id %{found}, expected %{expected}")]
    NonMonotonicId {
        index: usize,
        expected: u32,
        found: u32,
    },
    #[error("%{id} references %{operand}, which is not defined earlier")]
    ForwardReference { id: u32, operand: u32 },
    #[error("output %{id} is not defined by any instruction")]
    UnknownOutput { id: u32 },
}

/// Append-only instruction sequence with deterministic value numbering.
///
/// Modules are created fresh per build and are not mutated once the
/// orchestrator finishes; there are no cross-module references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    instructions: Vec<Instruction>,
    outputs: Vec<ValueId>,
    next_value_id: u32,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an `Input` instruction carrying the symbol name as an
    /// attribute, returning its id.
    pub fn declare_input(
        &mut self,
        name: impl Into<String>,
        result_type: impl Into<String>,
    ) -> ValueId {
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), AttrValue::Str(name.into()));
        self.append(
            Opcode::Input,
            Vec::new(),
            attributes,
            Some(result_type.into()),
        )
    }

    /// Appends a generic instruction under a fresh id and returns the id.
    pub fn append(
        &mut self,
        opcode: Opcode,
        operands: Vec<ValueId>,
        attributes: BTreeMap<String, AttrValue>,
        result_type: Option<String>,
    ) -> ValueId {
        let id = self.fresh_value();
        self.instructions.push(Instruction {
            id,
            opcode,
            operands,
            attributes,
            result_type,
        });
        id
    }

    /// Marks `id` as a module output. Repeated marks are kept in order and
    /// duplicates are not collapsed.
    pub fn mark_output(&mut self, id: ValueId) {
        self.outputs.push(id);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Canonical text encoding. Pure: may be called any number of times
    /// without observing or causing mutation.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Re-checks the single-assignment invariants: dense increasing ids,
    /// operands defined strictly earlier, outputs defined at all.
    ///
    /// The builder API upholds these by construction; this is the check for
    /// modules that crossed a serialization boundary.
    pub fn verify(&self) -> Result<(), ModuleVerifyError> {
        for (index, instruction) in self.instructions.iter().enumerate() {
            let expected = index as u32;
            if instruction.id.0 != expected {
                return Err(ModuleVerifyError::NonMonotonicId {
                    index,
                    expected,
                    found: instruction.id.0,
                });
            }
            for operand in &instruction.operands {
                if operand.0 >= instruction.id.0 {
                    return Err(ModuleVerifyError::ForwardReference {
                        id: instruction.id.0,
                        operand: operand.0,
                    });
                }
            }
        }
        for output in &self.outputs {
            if output.0 as usize >= self.instructions.len() {
                return Err(ModuleVerifyError::UnknownOutput { id: output.0 });
            }
        }
        Ok(())
    }

    fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        id
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        for instruction in &self.instructions {
            if wrote {
                f.write_str("\n")?;
            }
            write!(f, "{instruction}")?;
            wrote = true;
        }
        if !self.outputs.is_empty() {
            if wrote {
                f.write_str("\n")?;
            }
            f.write_str("outputs: ")?;
            for (index, id) in self.outputs.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{id}")?;
            }
        }
        Ok(())
    }
}
