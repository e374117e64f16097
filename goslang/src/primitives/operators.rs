use std::cmp::Ordering;

use crate::{BinaryOperator, Native, PrimitiveType, RuntimeError, UnaryOperator};

impl UnaryOperator {
    pub fn accepts(self, ty: PrimitiveType) -> bool {
        match self {
            UnaryOperator::Plus | UnaryOperator::Minus => ty.is_numeric(),
            UnaryOperator::Not => ty == PrimitiveType::Bool,
            UnaryOperator::Complement => ty.is_integer(),
        }
    }
}

impl BinaryOperator {
    /// Whether the operator is defined on a left operand of type `ty`.
    pub fn accepts(self, ty: PrimitiveType) -> bool {
        match self {
            op if op.is_logical() => ty == PrimitiveType::Bool,
            op if op.is_comparison() => true,
            BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div => {
                ty.is_numeric()
            }
            _ => ty.is_integer(),
        }
    }
}

fn type_error(symbol: &'static str, ty: PrimitiveType) -> RuntimeError {
    RuntimeError::OperatorType {
        op: symbol,
        operand: ty.name(),
    }
}

pub fn apply_unary(
    op: UnaryOperator,
    ty: PrimitiveType,
    value: Native,
) -> Result<Native, RuntimeError> {
    if !op.accepts(ty) {
        return Err(type_error(op.symbol(), ty));
    }
    let result = match (op, ty) {
        (UnaryOperator::Plus, _) => value,
        (UnaryOperator::Minus, PrimitiveType::Float64) => Native::Float(-value.as_f64()),
        (UnaryOperator::Minus, _) => Native::Int(ty.wrap(value.as_i64().wrapping_neg())),
        (UnaryOperator::Not, _) => Native::Bool(!value.as_bool()),
        (UnaryOperator::Complement, _) => Native::Int(ty.wrap(!value.as_i64())),
    };
    Ok(result)
}

fn compare(ty: PrimitiveType, left: Native, right: Native) -> Option<Ordering> {
    match ty {
        PrimitiveType::Float64 => left.as_f64().partial_cmp(&right.as_f64()),
        PrimitiveType::Bool => Some(left.as_bool().cmp(&right.as_bool())),
        _ => Some(left.as_i64().cmp(&right.as_i64())),
    }
}

fn shift(
    op: BinaryOperator,
    ty: PrimitiveType,
    value: i64,
    count: i64,
) -> Result<i64, RuntimeError> {
    if count < 0 {
        return Err(RuntimeError::NegativeShift(count));
    }
    let shifted = match op {
        BinaryOperator::Shl if count >= 64 => 0,
        BinaryOperator::Shl => value << count,
        _ if count >= 64 => {
            if value < 0 {
                -1
            } else {
                0
            }
        }
        _ => value >> count,
    };
    Ok(ty.wrap(shifted))
}

fn integer(
    op: BinaryOperator,
    ty: PrimitiveType,
    a: i64,
    b: i64,
) -> Result<i64, RuntimeError> {
    let result = match op {
        BinaryOperator::Add => a.wrapping_add(b),
        BinaryOperator::Sub => a.wrapping_sub(b),
        BinaryOperator::Mul => a.wrapping_mul(b),
        // a zero divisor yields zero
        BinaryOperator::Div if b == 0 => 0,
        BinaryOperator::Div => a.wrapping_div(b),
        BinaryOperator::Rem if b == 0 => 0,
        BinaryOperator::Rem => a.wrapping_rem(b),
        BinaryOperator::BitOr => a | b,
        BinaryOperator::BitXor => a ^ b,
        BinaryOperator::BitAnd => a & b,
        BinaryOperator::AndNot => a & !b,
        BinaryOperator::Shl | BinaryOperator::Shr => return shift(op, ty, a, b),
        _ => return Err(type_error(op.symbol(), ty)),
    };
    Ok(ty.wrap(result))
}

fn float(op: BinaryOperator, a: f64, b: f64) -> Result<f64, RuntimeError> {
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div => a / b,
        _ => return Err(type_error(op.symbol(), PrimitiveType::Float64)),
    };
    Ok(result)
}

/// Applies `op` to two scalars. `ty` is the type of the left operand; the
/// right operand is read in the left operand's domain. Returns the result
/// and the type it is encoded with.
pub fn apply_binary(
    op: BinaryOperator,
    ty: PrimitiveType,
    left: Native,
    right: Native,
) -> Result<(Native, PrimitiveType), RuntimeError> {
    if !op.accepts(ty) {
        return Err(type_error(op.symbol(), ty));
    }
    if op.is_comparison() {
        let ordering = compare(ty, left, right);
        let result = match op {
            BinaryOperator::Eq => ordering == Some(Ordering::Equal),
            BinaryOperator::Ne => ordering != Some(Ordering::Equal),
            BinaryOperator::Lt => ordering == Some(Ordering::Less),
            BinaryOperator::Gt => ordering == Some(Ordering::Greater),
            BinaryOperator::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        };
        return Ok((Native::Bool(result), PrimitiveType::Bool));
    }
    let result = match ty {
        PrimitiveType::Bool => {
            let (a, b) = (left.as_bool(), right.as_bool());
            Native::Bool(match op {
                BinaryOperator::And => a && b,
                _ => a || b,
            })
        }
        PrimitiveType::Float64 => Native::Float(float(op, left.as_f64(), right.as_f64())?),
        _ => Native::Int(integer(op, ty, left.as_i64(), right.as_i64())?),
    };
    Ok((result, ty))
}
