//! Lowers a type-checked expression tree into a fresh IR module.

use std::collections::{BTreeMap, HashMap};

use crate::env::{TypeEnv, TypeResult};
use crate::expr::Expr;
use crate::ir::{AttrValue, Module, Opcode, ValueId};
use crate::tensor::TensorType;

/// Per-build emission context.
///
/// Owns the module under construction together with the
/// symbol-materialization memo, so repeated references to one symbol share a
/// single `Input` instruction and no memoized id can outlive the build that
/// created it.
pub struct Lowering<'env> {
    env: &'env TypeEnv,
    module: Module,
    materialized: HashMap<String, ValueId>,
}

impl<'env> Lowering<'env> {
    pub fn new(env: &'env TypeEnv) -> Self {
        Self {
            env,
            module: Module::new(),
            materialized: HashMap::new(),
        }
    }

    /// Recursively emits `expr`, returning the id of the instruction that
    /// holds its value. Children emit left to right before their parent;
    /// recursion depth equals expression-tree depth.
    pub fn emit(&mut self, expr: &Expr) -> TypeResult<ValueId> {
        match expr {
            Expr::Literal {
                value,
                dtype,
                shape,
            } => {
                let result_type = expr.infer_type(self.env)?.to_string();
                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "dtype".to_string(),
                    AttrValue::Str(dtype.as_str().to_string()),
                );
                attributes.insert("shape".to_string(), AttrValue::Dims(shape.clone()));
                attributes.insert("value".to_string(), AttrValue::from(value));
                Ok(self.module.append(
                    Opcode::ConstTensor,
                    Vec::new(),
                    attributes,
                    Some(result_type),
                ))
            }
            Expr::Var { name } => {
                let tensor = self.env.resolve_symbol(name)?.clone();
                Ok(self.materialize_symbol(name, &tensor))
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs_id = self.emit(lhs)?;
                let rhs_id = self.emit(rhs)?;
                let result_type = expr.infer_type(self.env)?.to_string();
                Ok(self.module.append(
                    Opcode::Binary(*op),
                    vec![lhs_id, rhs_id],
                    BTreeMap::new(),
                    Some(result_type),
                ))
            }
        }
    }

    /// Idempotent within one build: the first reference to a symbol appends
    /// its `Input` instruction, later references reuse the recorded id.
    pub fn materialize_symbol(&mut self, name: &str, tensor: &TensorType) -> ValueId {
        if let Some(id) = self.materialized.get(name) {
            return *id;
        }
        let id = self.module.declare_input(name, tensor.to_string());
        self.materialized.insert(name.to_string(), id);
        id
    }

    /// Consumes the context, returning the module built so far.
    pub fn finish(self) -> Module {
        self.module
    }
}

/// Compiles one expression against one environment into a completed module.
///
/// Runs the environment pre-flight, emits the tree into a fresh module and
/// marks the root as the sole output. All-or-nothing: any validation
/// failure surfaces as an error before a module is returned, so callers
/// never observe partially built output.
pub fn lower(env: &TypeEnv, root: &Expr) -> TypeResult<Module> {
    env.validate_program()?;
    let mut lowering = Lowering::new(env);
    let root_id = lowering.emit(root)?;
    let mut module = lowering.finish();
    module.mark_output(root_id);
    Ok(module)
}
