use crate::{Address, ExecutionState, HeapProxy, PrimitiveType, RuntimeError, VMProxy};

mod console;
mod conversion;
mod numeric;
mod operators;

pub use operators::{apply_binary, apply_unary};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BuiltinKind {
    Println,
    Panic,
    Min,
    Max,
    Convert(PrimitiveType),
}

#[derive(Debug, Copy, Clone)]
pub struct Builtin<'a> {
    pub name: &'a str,
    pub kind: BuiltinKind,
}

impl<'a> Builtin<'a> {
    pub const fn new(name: &'a str, kind: BuiltinKind) -> Self {
        Self { name, kind }
    }
}

/// Builtins by id. The id is the index into this table and the slot in the
/// predeclared frame.
pub const BUILTINS: &[Builtin<'static>] = &[
    Builtin::new("println", BuiltinKind::Println),
    Builtin::new("panic", BuiltinKind::Panic),
    Builtin::new("min", BuiltinKind::Min),
    Builtin::new("max", BuiltinKind::Max),
    Builtin::new("int", BuiltinKind::Convert(PrimitiveType::Int32)),
    Builtin::new("int8", BuiltinKind::Convert(PrimitiveType::Int8)),
    Builtin::new("int16", BuiltinKind::Convert(PrimitiveType::Int16)),
    Builtin::new("int32", BuiltinKind::Convert(PrimitiveType::Int32)),
    Builtin::new("float", BuiltinKind::Convert(PrimitiveType::Float64)),
    Builtin::new("float64", BuiltinKind::Convert(PrimitiveType::Float64)),
    Builtin::new("uint8", BuiltinKind::Convert(PrimitiveType::Uint8)),
    Builtin::new("uint16", BuiltinKind::Convert(PrimitiveType::Uint16)),
    Builtin::new("uint32", BuiltinKind::Convert(PrimitiveType::Uint32)),
    Builtin::new("bool", BuiltinKind::Convert(PrimitiveType::Bool)),
    Builtin::new("rune", BuiltinKind::Convert(PrimitiveType::Int32)),
    Builtin::new("byte", BuiltinKind::Convert(PrimitiveType::Uint8)),
];

/// Predeclared constants, placed after the builtins.
pub const CONSTANT_NAMES: [&str; 3] = ["true", "false", "nil"];

/// Slot names of the predeclared frame, in order.
pub fn predeclared_names() -> impl Iterator<Item = &'static str> {
    BUILTINS
        .iter()
        .map(|builtin| builtin.name)
        .chain(CONSTANT_NAMES)
}

pub fn get_builtin(id: u16) -> Option<Builtin<'static>> {
    BUILTINS.get(usize::from(id)).copied()
}

pub struct BuiltinContext<'ex> {
    pub state: &'ex mut ExecutionState,
    pub vm: &'ex VMProxy,
    pub name: &'static str,
    /// number of arguments above the builtin on the operand stack
    pub arity: usize,
}

impl BuiltinContext<'_> {
    pub fn heap(&self) -> &HeapProxy {
        &self.vm.heap
    }

    /// Pops the arguments and the builtin below them. Arguments come back
    /// first to last.
    pub fn arguments(&mut self) -> Result<Vec<Address>, RuntimeError> {
        let arguments = self.state.pop_slice(self.arity)?;
        self.state.pop()?;
        Ok(arguments)
    }

    pub fn expect_arity(&self, expected: usize) -> Result<(), RuntimeError> {
        if self.arity != expected {
            return Err(RuntimeError::Arity {
                name: self.name,
                expected,
                got: self.arity,
            });
        }
        Ok(())
    }
}

/// Runs builtin `id` against the operand stack.
pub fn invoke(
    state: &mut ExecutionState,
    vm: &VMProxy,
    id: u16,
    arity: usize,
) -> Result<(), RuntimeError> {
    let builtin = get_builtin(id).ok_or(RuntimeError::NotCallable("builtin"))?;
    let mut ctx = BuiltinContext {
        state,
        vm,
        name: builtin.name,
        arity,
    };
    match builtin.kind {
        BuiltinKind::Println => console::println(&mut ctx),
        BuiltinKind::Panic => console::panic(&mut ctx),
        BuiltinKind::Min => numeric::min(&mut ctx),
        BuiltinKind::Max => numeric::max(&mut ctx),
        BuiltinKind::Convert(target) => conversion::convert(&mut ctx, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TYPE_NAMES;

    #[test]
    fn conversions_follow_type_name_order() {
        let conversions: Vec<_> = BUILTINS
            .iter()
            .filter_map(|b| match b.kind {
                BuiltinKind::Convert(ty) => Some((b.name, ty)),
                _ => None,
            })
            .collect();
        assert_eq!(conversions, TYPE_NAMES.to_vec());
        assert_eq!(BUILTINS[4].name, "int");
    }

    #[test]
    fn predeclared_frame_layout() {
        let names: Vec<_> = predeclared_names().collect();
        assert_eq!(names.len(), BUILTINS.len() + 3);
        assert_eq!(&names[..4], &["println", "panic", "min", "max"]);
        assert_eq!(&names[names.len() - 3..], &["true", "false", "nil"]);
    }
}
