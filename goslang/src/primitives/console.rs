use crate::{RuntimeError, primitives::BuiltinContext};

fn format_arguments(ctx: &mut BuiltinContext) -> Result<String, RuntimeError> {
    let arguments = ctx.arguments()?;
    let values = arguments
        .into_iter()
        .map(|argument| ctx.heap().decode(argument).map(|value| value.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values.join(" "))
}

pub fn println(ctx: &mut BuiltinContext) -> Result<(), RuntimeError> {
    let line = format_arguments(ctx)?;
    if let Err(err) = ctx.vm.console().write_line(&line) {
        log::warn!("println failed: {err}");
    }
    Ok(())
}

pub fn panic(ctx: &mut BuiltinContext) -> Result<(), RuntimeError> {
    ctx.expect_arity(1)?;
    let message = format_arguments(ctx)?;
    Err(RuntimeError::Panic(message))
}
