use std::io;

use thiserror::Error;

use crate::{AstError, CompileError, HeapError, RuntimeError};

/// Everything that can stop a program from loading or running.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid syntax tree: {0}")]
    Ast(#[from] AstError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<HeapError> for Error {
    fn from(error: HeapError) -> Self {
        Self::Runtime(RuntimeError::Heap(error))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Malformed,
    UnresolvedIdentifier,
    NamedReturns,
    MissingMain,
    MalformedMain,
    UnknownOperator,
    ProgramTooLarge,
    ArityTooLarge,
    ExpectedCall,
    OperatorType,
    NotRepresentable,
    UnassignedAccess,
    BuiltinInGoroutine,
    Panic,
    NotCallable,
    ConditionNotBool,
    NegativeShift,
    Arity,
    StackUnderflow,
    ControlStackUnderflow,
    InvalidProgramCounter,
    SpawnFailed,
    Heap,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Ast(AstError::Parse(_) | AstError::Json(_)) => ErrorKind::Parse,
            Error::Ast(AstError::Malformed(_)) => ErrorKind::Malformed,
            Error::Compile(error) => match error {
                CompileError::UnresolvedIdentifier(_) => ErrorKind::UnresolvedIdentifier,
                CompileError::NamedReturns => ErrorKind::NamedReturns,
                CompileError::MissingMain => ErrorKind::MissingMain,
                CompileError::MalformedMain => ErrorKind::MalformedMain,
                CompileError::UnknownOperator(_) => ErrorKind::UnknownOperator,
                CompileError::ProgramTooLarge(_) => ErrorKind::ProgramTooLarge,
                CompileError::ArityTooLarge(_) => ErrorKind::ArityTooLarge,
                CompileError::ExpectedCall => ErrorKind::ExpectedCall,
            },
            Error::Runtime(error) => match error {
                RuntimeError::OperatorType { .. } => ErrorKind::OperatorType,
                RuntimeError::NotRepresentable { .. } => ErrorKind::NotRepresentable,
                RuntimeError::UnassignedAccess(_) => ErrorKind::UnassignedAccess,
                RuntimeError::BuiltinInGoroutine => ErrorKind::BuiltinInGoroutine,
                RuntimeError::Panic(_) => ErrorKind::Panic,
                RuntimeError::NotCallable(_) => ErrorKind::NotCallable,
                RuntimeError::ConditionNotBool(_) => ErrorKind::ConditionNotBool,
                RuntimeError::NegativeShift(_) => ErrorKind::NegativeShift,
                RuntimeError::Arity { .. } => ErrorKind::Arity,
                RuntimeError::StackUnderflow => ErrorKind::StackUnderflow,
                RuntimeError::ControlStackUnderflow => ErrorKind::ControlStackUnderflow,
                RuntimeError::InvalidProgramCounter(_) => ErrorKind::InvalidProgramCounter,
                RuntimeError::SpawnFailed(_) => ErrorKind::SpawnFailed,
                RuntimeError::Heap(_) => ErrorKind::Heap,
            },
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
