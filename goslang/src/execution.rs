use thiserror::Error;

use crate::{HeapError, LexicalAddress, PrimitiveType};

/// Fatal errors of one execution unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("operator {op} is not defined on {operand}")]
    OperatorType { op: &'static str, operand: &'static str },
    #[error("{value} is not representable as {target}")]
    NotRepresentable { value: String, target: PrimitiveType },
    #[error("use of unassigned name at {0}")]
    UnassignedAccess(LexicalAddress),
    #[error("builtins cannot be started as goroutines")]
    BuiltinInGoroutine,
    #[error("panic: {0}")]
    Panic(String),
    #[error("cannot call a value of kind {0}")]
    NotCallable(&'static str),
    #[error("condition must be a bool, found {0}")]
    ConditionNotBool(&'static str),
    #[error("negative shift count {0}")]
    NegativeShift(i64),
    #[error("{name} expects {expected} arguments, got {got}")]
    Arity {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("control stack underflow")]
    ControlStackUnderflow,
    #[error("program counter {0} is outside the program")]
    InvalidProgramCounter(usize),
    #[error("failed to start goroutine thread: {0}")]
    SpawnFailed(String),
    #[error(transparent)]
    Heap(#[from] HeapError),
}
