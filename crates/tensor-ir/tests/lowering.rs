use tensor_ir::{lower, Expr, Opcode, TensorType, TypeEnv, TypeError};

fn env_2x2() -> TypeEnv {
    let mut env = TypeEnv::new();
    env.declare_symbol("x", TensorType::new("f32", [2, 2]))
        .expect("declare x");
    env.declare_symbol("y", TensorType::new("f32", [2, 2]))
        .expect("declare y");
    env
}

fn input_count(module: &tensor_ir::Module) -> usize {
    module
        .instructions()
        .iter()
        .filter(|instruction| instruction.opcode == Opcode::Input)
        .count()
}

#[test]
fn add_of_two_inputs_renders_canonical_text() {
    let env = env_2x2();
    let expr = Expr::var("x").add(Expr::var("y"));
    let module = lower(&env, &expr).expect("lowering succeeds");
    let rendered = module.render();

    assert!(
        rendered.contains("%0 = Input {name=x} : tensor<f32[2, 2]>"),
        "missing lhs input:\n{rendered}"
    );
    assert!(
        rendered.contains("%1 = Input {name=y} : tensor<f32[2, 2]>"),
        "missing rhs input:\n{rendered}"
    );
    assert!(
        rendered.contains("%2 = Add (%0, %1) : tensor<f32[2, 2]>"),
        "missing add instruction:\n{rendered}"
    );
    assert!(
        rendered.ends_with("outputs: %2"),
        "missing outputs line:\n{rendered}"
    );
}

#[test]
fn repeated_symbol_references_share_one_input() {
    let mut env = env_2x2();
    env.declare_symbol("bias", TensorType::scalar("f32"))
        .expect("declare bias");

    // x appears twice and bias once; each symbol materializes exactly once.
    let expr = Expr::var("x").add(Expr::var("bias")).add(Expr::var("x"));
    let module = lower(&env, &expr).expect("lowering succeeds");

    assert_eq!(input_count(&module), 2);
    let rendered = module.render();
    assert_eq!(rendered.matches("name=bias").count(), 1);
    assert_eq!(rendered.matches("name=x").count(), 1);
    assert!(
        rendered.contains("%3 = Add (%2, %0) : tensor<f32[2, 2]>"),
        "second reference should reuse %0:\n{rendered}"
    );
}

#[test]
fn scalar_broadcast_keeps_operand_shape() {
    let mut env = env_2x2();
    env.declare_symbol("bias", TensorType::scalar("f32"))
        .expect("declare bias");

    let expr = Expr::var("x").add(Expr::var("bias"));
    let module = lower(&env, &expr).expect("lowering succeeds");
    assert!(
        module.render().contains("%2 = Add (%0, %1) : tensor<f32[2, 2]>"),
        "scalar operand should broadcast to the tensor shape"
    );
}

#[test]
fn ids_are_dense_and_operands_reference_earlier_instructions() {
    let mut env = env_2x2();
    env.declare_symbol("z", TensorType::new("f32", [2, 2]))
        .expect("declare z");

    let expr = Expr::var("x")
        .mul(Expr::var("y"))
        .add(Expr::var("z").sub(Expr::var("x")));
    let module = lower(&env, &expr).expect("lowering succeeds");

    for (index, instruction) in module.instructions().iter().enumerate() {
        assert_eq!(instruction.id.0 as usize, index);
        for operand in &instruction.operands {
            assert!(
                operand.0 < instruction.id.0,
                "operand {} of {} is not defined earlier",
                operand,
                instruction.id
            );
        }
    }
    module.verify().expect("lowered modules are well-formed");
}

#[test]
fn literal_emits_const_tensor_with_sorted_attributes() {
    let env = env_2x2();
    let expr = Expr::scalar(1.5, "f32").add(Expr::var("x"));
    let module = lower(&env, &expr).expect("lowering succeeds");
    let rendered = module.render();

    assert!(
        rendered.contains("%0 = ConstTensor {dtype=f32, shape=[], value=1.5} : tensor<f32[]>"),
        "missing literal instruction:\n{rendered}"
    );
}

#[test]
fn matmul_infers_row_by_column_result() {
    let mut env = TypeEnv::new();
    env.declare_symbol("a", TensorType::new("f32", [2, 3]))
        .expect("declare a");
    env.declare_symbol("b", TensorType::new("f32", [3, 4]))
        .expect("declare b");

    let module = lower(&env, &Expr::var("a").matmul(Expr::var("b"))).expect("lowering succeeds");
    let rendered = module.render();
    assert!(
        rendered.contains("%2 = MatMul (%0, %1) : tensor<f32[2, 4]>"),
        "missing matmul instruction:\n{rendered}"
    );
}

#[test]
fn matmul_dimension_mismatch_yields_no_module() {
    let mut env = TypeEnv::new();
    env.declare_symbol("a", TensorType::new("f32", [2, 3]))
        .expect("declare a");
    env.declare_symbol("b", TensorType::new("f32", [2, 4]))
        .expect("declare b");

    let err = lower(&env, &Expr::var("a").matmul(Expr::var("b")))
        .expect_err("inner dimensions disagree");
    assert_eq!(err, TypeError::DimensionMismatch { lhs: 3, rhs: 2 });
}

#[test]
fn undeclared_symbol_aborts_the_build() {
    let env = env_2x2();
    let err = lower(&env, &Expr::var("x").add(Expr::var("missing")))
        .expect_err("rhs symbol is not declared");
    assert_eq!(
        err,
        TypeError::UndeclaredSymbol {
            name: "missing".to_string(),
        }
    );
}

#[test]
fn reusing_one_environment_across_builds_starts_numbering_fresh() {
    let env = env_2x2();
    let first = lower(&env, &Expr::var("x").add(Expr::var("y"))).expect("first build");
    let second = lower(&env, &Expr::var("y").add(Expr::var("x"))).expect("second build");

    // The materialization memo is scoped to the build, so the second module
    // numbers its own inputs from zero in its own reference order.
    assert!(second.render().contains("%0 = Input {name=y}"));
    assert!(second.render().contains("%1 = Input {name=x}"));
    assert_eq!(first.instructions().len(), 3);
    assert_eq!(second.instructions().len(), 3);
}
