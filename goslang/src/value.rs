use std::fmt;

use crate::{Address, HeapError, HeapProxy, PrimitiveType, SpecialObjects, TypeTag};

/// Host-side view of a heap value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Native {
    Bool(bool),
    Int(i64),
    Float(f64),
    Nil,
    Unassigned,
    Function,
    Builtin,
    /// frames, environments and markers
    Internal(TypeTag),
}

impl Native {
    /// Numeric coercions read a value in another scalar domain. Non-scalars
    /// read as zero.
    pub fn as_bool(self) -> bool {
        match self {
            Native::Bool(b) => b,
            Native::Int(n) => n != 0,
            Native::Float(f) => f != 0.0,
            _ => false,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Native::Int(n) => n,
            Native::Float(f) => f as i64,
            Native::Bool(b) => i64::from(b),
            _ => 0,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Native::Int(n) => n as f64,
            Native::Float(f) => f,
            Native::Bool(b) => f64::from(u8::from(b)),
            _ => 0.0,
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Native::Bool(_) | Native::Int(_) | Native::Float(_))
    }
}

/// Fixed notation for magnitudes in `[1e-6, 1e21)`, exponent notation with
/// an explicit sign outside of it.
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_infinite() {
        return f.write_str(if x.is_sign_positive() { "+Inf" } else { "-Inf" });
    }
    let magnitude = x.abs();
    if magnitude == 0.0 || (1e-6..1e21).contains(&magnitude) {
        return write!(f, "{x}");
    }
    let text = format!("{x:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            write!(f, "{mantissa}e+{exponent}")
        }
        _ => f.write_str(&text),
    }
}

impl fmt::Display for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Native::Bool(b) => write!(f, "{b}"),
            Native::Int(n) => write!(f, "{n}"),
            Native::Float(x) => write_float(f, *x),
            Native::Nil => f.write_str("nil"),
            Native::Unassigned => f.write_str("<unassigned>"),
            Native::Function => f.write_str("<function>"),
            Native::Builtin => f.write_str("<builtin>"),
            Native::Internal(tag) => write!(f, "<{tag:?}>"),
        }
    }
}

impl HeapProxy {
    /// Allocates an integer of type `ty`, truncating `value` to its width.
    pub fn alloc_int(&self, ty: PrimitiveType, value: i64) -> Result<Address, HeapError> {
        debug_assert!(ty.is_integer());
        let address = self.alloc(ty.tag(), 1)?;
        let wrapped = ty.wrap(value);
        match ty.width() {
            1 => self.set_byte_at(address, 2, wrapped as u8)?,
            2 => self.set_u16_at(address, 2, wrapped as u16)?,
            _ => self.set_u32_at(address, 2, wrapped as u32)?,
        }
        Ok(address)
    }

    pub fn alloc_float(&self, value: f64) -> Result<Address, HeapError> {
        let address = self.alloc(TypeTag::Float64, 2)?;
        self.set_word(address.offset(1), value.to_bits())?;
        Ok(address)
    }

    /// The scalar type of the object at `address`, if it is a scalar.
    pub fn primitive_type(&self, address: Address) -> Result<Option<PrimitiveType>, HeapError> {
        Ok(PrimitiveType::from_tag(self.type_tag(address)?))
    }

    pub fn decode(&self, address: Address) -> Result<Native, HeapError> {
        let tag = self.type_tag(address)?;
        let native = match tag {
            TypeTag::Bool => Native::Bool(self.byte_at(address, 2)? != 0),
            TypeTag::Int8 => Native::Int(self.byte_at(address, 2)? as i8 as i64),
            TypeTag::Int16 => Native::Int(self.u16_at(address, 2)? as i16 as i64),
            TypeTag::Int32 => Native::Int(self.u32_at(address, 2)? as i32 as i64),
            TypeTag::Uint8 => Native::Int(self.byte_at(address, 2)? as i64),
            TypeTag::Uint16 => Native::Int(self.u16_at(address, 2)? as i64),
            TypeTag::Uint32 => Native::Int(self.u32_at(address, 2)? as i64),
            TypeTag::Float64 => Native::Float(f64::from_bits(self.word(address.offset(1))?)),
            TypeTag::Nil => Native::Nil,
            TypeTag::Unassigned => Native::Unassigned,
            TypeTag::Function => Native::Function,
            TypeTag::Builtin => Native::Builtin,
            TypeTag::BlockMarker
            | TypeTag::CallMarker
            | TypeTag::Frame
            | TypeTag::Environment => Native::Internal(tag),
        };
        Ok(native)
    }

    /// Materializes `value` as a fresh object of type `ty`. Numbers are
    /// coerced to the target type; booleans are the shared singletons and
    /// non-scalar values encode as nil.
    pub fn encode(
        &self,
        specials: &SpecialObjects,
        value: Native,
        ty: PrimitiveType,
    ) -> Result<Address, HeapError> {
        if !value.is_scalar() {
            return Ok(specials.nil);
        }
        match ty {
            PrimitiveType::Bool => Ok(specials.boolean(value.as_bool())),
            PrimitiveType::Float64 => self.alloc_float(value.as_f64()),
            _ => self.alloc_int(ty, value.as_i64()),
        }
    }
}
