pub mod ast;
mod bytecode;
mod compiler;
mod console;
mod error;
mod execution;
mod heap;
mod interpreter;
mod object;
pub mod primitives;
mod stack;
mod system;
mod tagged;
mod threads;
mod value;
mod vm;

use std::sync::Arc;

pub use ast::{AstError, Node};
pub use bytecode::*;
pub use compiler::{CompileEnv, CompileError, Compiler, compile};
pub use console::Console;
pub use error::{Error, ErrorKind};
pub use execution::RuntimeError;
pub use heap::*;
pub use interpreter::Interpreter;
pub use object::*;
pub use stack::*;
pub use system::{OS_PAGE_SIZE, map_memory, page_align, unmap_memory};
pub use tagged::*;
pub use threads::*;
pub use value::*;
pub use vm::*;

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// statistics of the main execution unit
    pub stats: ExecutionStats,
    pub failures: Vec<GoroutineFailure>,
}

/// Parses a JSON syntax tree and compiles it.
pub fn compile_json(text: &str) -> Result<Program, Error> {
    let root = Node::parse(text)?;
    Ok(compile(&root)?)
}

/// Runs `program` to completion, then waits for every goroutine it started.
/// A failing main instance returns immediately.
pub fn run_program(
    program: Program,
    info: VMCreateInfo,
    console: Arc<Console>,
) -> Result<RunReport, Error> {
    let vm = VM::new(info, program, console)?;
    let stats = vm.run()?;
    vm.wait_idle();
    Ok(RunReport {
        stats,
        failures: vm.failures(),
    })
}

pub fn run_json(text: &str, console: Arc<Console>) -> Result<RunReport, Error> {
    run_program(compile_json(text)?, VMCreateInfo::default(), console)
}
