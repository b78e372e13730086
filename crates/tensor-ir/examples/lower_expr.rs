use anyhow::Result;
use tensor_ir::{lower, Expr, TensorType, TypeEnv};

fn main() -> Result<()> {
    let mut env = TypeEnv::new();
    env.declare_symbol("x", TensorType::new("f32", [4, 8]))?;
    env.declare_symbol("w", TensorType::new("f32", [8, 2]))?;
    env.declare_symbol("bias", TensorType::scalar("f32"))?;

    let expr = Expr::var("x").matmul(Expr::var("w")).add(Expr::var("bias"));
    let module = lower(&env, &expr)?;
    println!("{module}");
    Ok(())
}
