use crate::{Native, RuntimeError, primitives::BuiltinContext};

type Pick = fn(candidate: f64, best: f64) -> bool;

/// Shared body of `min` and `max`. The result takes the type of the last
/// argument.
fn extremum(ctx: &mut BuiltinContext, pick: Pick) -> Result<(), RuntimeError> {
    if ctx.arity == 0 {
        return Err(RuntimeError::Arity {
            name: ctx.name,
            expected: 1,
            got: 0,
        });
    }
    let arguments = ctx.arguments()?;
    let heap = ctx.heap();

    let mut best: Option<(Native, f64)> = None;
    let mut result_ty = None;
    for argument in arguments {
        let tag = heap.type_tag(argument)?;
        let ty = heap
            .primitive_type(argument)?
            .filter(|ty| ty.is_numeric())
            .ok_or(RuntimeError::OperatorType {
                op: ctx.name,
                operand: tag.name(),
            })?;
        let value = heap.decode(argument)?;
        let key = value.as_f64();
        best = match best {
            Some((_, current)) if !pick(key, current) => best,
            _ => Some((value, key)),
        };
        result_ty = Some(ty);
    }

    if let (Some((value, _)), Some(ty)) = (best, result_ty) {
        let result = heap.encode(ctx.vm.specials(), value, ty)?;
        ctx.state.push(result);
    }
    Ok(())
}

pub fn min(ctx: &mut BuiltinContext) -> Result<(), RuntimeError> {
    extremum(ctx, |candidate, best| candidate < best)
}

pub fn max(ctx: &mut BuiltinContext) -> Result<(), RuntimeError> {
    extremum(ctx, |candidate, best| candidate > best)
}
