use crate::{Native, PrimitiveType, RuntimeError, primitives::BuiltinContext};

/// Whether `value` can be converted to `target` without loss.
pub fn representable(value: Native, target: PrimitiveType) -> bool {
    match (target, value) {
        (PrimitiveType::Bool, Native::Bool(_)) => true,
        (PrimitiveType::Bool, _) => false,
        (PrimitiveType::Float64, value) => matches!(value, Native::Int(_) | Native::Float(_)),
        (_, Native::Int(n)) => target
            .int_range()
            .is_some_and(|(lo, hi)| (lo..=hi).contains(&n)),
        (_, Native::Float(f)) => {
            f.is_finite()
                && f.fract() == 0.0
                && target
                    .int_range()
                    .is_some_and(|(lo, hi)| f >= lo as f64 && f <= hi as f64)
        }
        _ => false,
    }
}

pub fn convert(ctx: &mut BuiltinContext, target: PrimitiveType) -> Result<(), RuntimeError> {
    ctx.expect_arity(1)?;
    let arguments = ctx.arguments()?;
    let heap = ctx.heap();
    let value = heap.decode(arguments[0])?;
    if !representable(value, target) {
        return Err(RuntimeError::NotRepresentable {
            value: value.to_string(),
            target,
        });
    }
    let result = heap.encode(ctx.vm.specials(), value, target)?;
    ctx.state.push(result);
    Ok(())
}
