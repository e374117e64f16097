use crate::{
    Address, ExecutionState, ExecutionStats, Instruction, Native, PrimitiveType, RuntimeError,
    TypeTag, VMProxy,
    primitives::{self, apply_binary, apply_unary},
};

/// One execution unit: a private register set running against the shared
/// VM.
pub struct Interpreter {
    pub vm: VMProxy,
    pub state: ExecutionState,
}

enum Flow {
    Continue,
    Halt,
}

fn scalar_type(
    vm: &VMProxy,
    operand: Address,
    symbol: &'static str,
) -> Result<PrimitiveType, RuntimeError> {
    let tag = vm.heap.type_tag(operand)?;
    PrimitiveType::from_tag(tag).ok_or(RuntimeError::OperatorType {
        op: symbol,
        operand: tag.name(),
    })
}

/// Pops `arity` arguments into a fresh frame and the callee below them.
/// Returns the callee's environment extended by that frame, and its entry.
fn bind_arguments(
    vm: &VMProxy,
    state: &mut ExecutionState,
    callee: Address,
    arity: usize,
) -> Result<(Address, usize), RuntimeError> {
    let heap = &vm.heap;
    let expected = usize::from(heap.function_arity_in(callee)?);
    if expected != arity {
        return Err(RuntimeError::Arity {
            name: "function",
            expected,
            got: arity,
        });
    }
    let frame = heap.alloc_frame(arity, vm.specials().unassigned)?;
    for slot in (0..arity).rev() {
        let argument = state.pop()?;
        heap.set_child(frame, slot, argument)?;
    }
    state.pop()?;
    let env = heap.env_extend(heap.function_env(callee)?, frame)?;
    Ok((env, heap.function_pc(callee)?))
}

/// Unwinds the control stack to the innermost call marker and returns
/// through it.
fn reset(vm: &VMProxy, state: &mut ExecutionState) -> Result<(), RuntimeError> {
    loop {
        let marker = state.pop_return()?;
        state.env = vm.heap.marker_env(marker)?;
        if vm.heap.is(marker, TypeTag::CallMarker)? {
            state.pc = vm.heap.call_marker_pc(marker)?;
            return Ok(());
        }
    }
}

/// Drops the block markers of the current activation, leaving its call
/// marker on top.
fn drop_block_markers(vm: &VMProxy, state: &mut ExecutionState) -> Result<(), RuntimeError> {
    while let Some(top) = state.peek_return() {
        if !vm.heap.is(top, TypeTag::BlockMarker)? {
            break;
        }
        state.pop_return()?;
    }
    Ok(())
}

fn call(vm: &VMProxy, state: &mut ExecutionState, arity: usize) -> Result<(), RuntimeError> {
    let callee = state.stack_get_nth(arity)?;
    match vm.heap.type_tag(callee)? {
        TypeTag::Builtin => {
            primitives::invoke(state, vm, vm.heap.builtin_id(callee)?, arity)?;
            state.pc += 1;
        }
        TypeTag::Function => {
            let (env, entry) = bind_arguments(vm, state, callee, arity)?;
            let marker = vm.heap.alloc_call_marker(state.env, state.pc + 1)?;
            state.push_return(marker);
            state.env = env;
            state.pc = entry;
        }
        other => return Err(RuntimeError::NotCallable(other.name())),
    }
    Ok(())
}

fn tail_call(vm: &VMProxy, state: &mut ExecutionState, arity: usize) -> Result<(), RuntimeError> {
    let callee = state.stack_get_nth(arity)?;
    match vm.heap.type_tag(callee)? {
        TypeTag::Builtin => {
            primitives::invoke(state, vm, vm.heap.builtin_id(callee)?, arity)?;
            reset(vm, state)?;
        }
        TypeTag::Function => {
            let (env, entry) = bind_arguments(vm, state, callee, arity)?;
            drop_block_markers(vm, state)?;
            state.env = env;
            state.pc = entry;
        }
        other => return Err(RuntimeError::NotCallable(other.name())),
    }
    Ok(())
}

fn go_call(vm: &VMProxy, state: &mut ExecutionState, arity: usize) -> Result<(), RuntimeError> {
    let callee = state.stack_get_nth(arity)?;
    match vm.heap.type_tag(callee)? {
        TypeTag::Builtin => return Err(RuntimeError::BuiltinInGoroutine),
        TypeTag::Function => {
            let (env, entry) = bind_arguments(vm, state, callee, arity)?;
            let exit = vm.heap.alloc_call_marker(state.env, vm.program().exit_pc())?;
            vm.spawn_goroutine(env, entry, exit)?;
            state.pc += 1;
        }
        other => return Err(RuntimeError::NotCallable(other.name())),
    }
    Ok(())
}

impl Interpreter {
    pub fn new(vm: VMProxy, state: ExecutionState) -> Self {
        Self { vm, state }
    }

    /// Runs until `Done`.
    pub fn run(&mut self) -> Result<ExecutionStats, RuntimeError> {
        loop {
            let pc = self.state.pc;
            let instruction = *self
                .vm
                .program()
                .get(pc)
                .ok_or(RuntimeError::InvalidProgramCounter(pc))?;
            log::trace!("{pc:>5}  {instruction}");
            self.state.stats.instructions += 1;
            if let Flow::Halt = self.step(instruction)? {
                return Ok(self.state.stats);
            }
        }
    }

    fn step(&mut self, instruction: Instruction) -> Result<Flow, RuntimeError> {
        let vm = &self.vm;
        let state = &mut self.state;
        let heap = &vm.heap;
        match instruction {
            Instruction::LoadConstant { value, ty } => {
                let constant = heap.encode(vm.specials(), value, ty)?;
                state.push(constant);
                state.pc += 1;
            }
            Instruction::LoadNil => {
                state.push(vm.specials().nil);
                state.pc += 1;
            }
            Instruction::Load { address } => {
                let value = heap.env_get(state.env, address)?;
                if heap.is(value, TypeTag::Unassigned)? {
                    return Err(RuntimeError::UnassignedAccess(address));
                }
                state.push(value);
                state.pc += 1;
            }
            Instruction::Assign { address } => {
                let value = state.pop()?;
                heap.env_set(state.env, address, value)?;
                state.pc += 1;
            }
            Instruction::UnaryOp { op } => {
                let operand = state.pop()?;
                let ty = scalar_type(vm, operand, op.symbol())?;
                let result = apply_unary(op, ty, heap.decode(operand)?)?;
                state.push(heap.encode(vm.specials(), result, ty)?);
                state.pc += 1;
            }
            Instruction::BinaryOp { op } => {
                let right = state.pop()?;
                let left = state.pop()?;
                let ty = scalar_type(vm, left, op.symbol())?;
                scalar_type(vm, right, op.symbol())?;
                let (result, result_ty) =
                    apply_binary(op, ty, heap.decode(left)?, heap.decode(right)?)?;
                state.push(heap.encode(vm.specials(), result, result_ty)?);
                state.pc += 1;
            }
            Instruction::JumpIfFalse { target } => {
                let condition = state.pop()?;
                match heap.decode(condition)? {
                    Native::Bool(true) => state.pc += 1,
                    Native::Bool(false) => state.pc = target,
                    _ => {
                        return Err(RuntimeError::ConditionNotBool(
                            heap.type_tag(condition)?.name(),
                        ));
                    }
                }
            }
            Instruction::Goto { target } => state.pc = target,
            Instruction::EnterScope { slots } => {
                let marker = heap.alloc_block_marker(state.env)?;
                state.push_return(marker);
                let frame = heap.alloc_frame(slots, vm.specials().unassigned)?;
                state.env = heap.env_extend(state.env, frame)?;
                state.pc += 1;
            }
            Instruction::ExitScope => {
                let marker = state.pop_return()?;
                state.env = heap.marker_env(marker)?;
                state.pc += 1;
            }
            Instruction::MakeClosure {
                arity_in,
                arity_out,
                entry,
            } => {
                let function = heap.alloc_function(arity_in, arity_out, entry, state.env)?;
                state.push(function);
                state.pc += 1;
            }
            Instruction::Call { arity } => call(vm, state, arity)?,
            Instruction::TailCall { arity } => tail_call(vm, state, arity)?,
            Instruction::GoCall { arity } => go_call(vm, state, arity)?,
            Instruction::Reset => reset(vm, state)?,
            Instruction::Done => return Ok(Flow::Halt),
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        BinaryOperator, Console, HeapCreateInfo, LexicalAddress, Program, VM, VMCreateInfo,
    };

    fn vm(code: Vec<Instruction>) -> VM {
        let info = VMCreateInfo {
            heap: HeapCreateInfo { words: 1 << 14 },
            ..Default::default()
        };
        VM::new(info, Program::new(code), Arc::new(Console::capture())).unwrap()
    }

    fn int(n: i64) -> Instruction {
        Instruction::LoadConstant {
            value: Native::Int(n),
            ty: PrimitiveType::Int32,
        }
    }

    fn top(interpreter: &Interpreter) -> Native {
        let address = interpreter.state.stack_get_nth(0).unwrap();
        interpreter.vm.heap.decode(address).unwrap()
    }

    #[test]
    fn evaluates_binary_operators() {
        let vm = vm(vec![
            int(1),
            int(2),
            Instruction::BinaryOp {
                op: BinaryOperator::Add,
            },
            Instruction::Done,
        ]);
        let mut interpreter = vm.main_interpreter();
        let stats = interpreter.run().unwrap();
        assert_eq!(top(&interpreter), Native::Int(3));
        assert_eq!(stats.instructions, 4);
        assert_eq!(stats.peak_depth, 2);
    }

    #[test]
    fn calls_and_returns_through_call_markers() {
        let vm = vm(vec![
            Instruction::MakeClosure {
                arity_in: 1,
                arity_out: 1,
                entry: 2,
            },
            Instruction::Goto { target: 4 },
            Instruction::Load {
                address: LexicalAddress::new(1, 0),
            },
            Instruction::Reset,
            int(41),
            Instruction::Call { arity: 1 },
            Instruction::Done,
        ]);
        let mut interpreter = vm.main_interpreter();
        let stats = interpreter.run().unwrap();
        assert_eq!(top(&interpreter), Native::Int(41));
        assert_eq!(interpreter.state.depth(), 1);
        assert!(interpreter.state.return_stack().is_empty());
        assert_eq!(stats.peak_return_depth, 1);
    }

    #[test]
    fn builtins_consume_their_arguments() {
        let vm = vm(vec![
            Instruction::Load {
                address: LexicalAddress::new(0, 0),
            },
            int(7),
            int(8),
            Instruction::Call { arity: 2 },
            Instruction::Done,
        ]);
        let mut interpreter = vm.main_interpreter();
        interpreter.run().unwrap();
        assert_eq!(interpreter.state.depth(), 0);
        assert_eq!(vm.console().lines(), vec!["7 8"]);
    }

    #[test]
    fn wrong_argument_count_is_an_arity_error() {
        let vm = vm(vec![
            Instruction::MakeClosure {
                arity_in: 2,
                arity_out: 0,
                entry: 2,
            },
            Instruction::Goto { target: 4 },
            Instruction::LoadNil,
            Instruction::Reset,
            int(1),
            Instruction::Call { arity: 1 },
            Instruction::Done,
        ]);
        assert_eq!(
            vm.main_interpreter().run(),
            Err(RuntimeError::Arity {
                name: "function",
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn runtime_errors() {
        let cases = [
            (
                vec![
                    Instruction::EnterScope { slots: 1 },
                    Instruction::Load {
                        address: LexicalAddress::new(1, 0),
                    },
                    Instruction::Done,
                ],
                RuntimeError::UnassignedAccess(LexicalAddress::new(1, 0)),
            ),
            (
                vec![int(1), Instruction::JumpIfFalse { target: 3 }, Instruction::Done],
                RuntimeError::ConditionNotBool("int32"),
            ),
            (
                vec![int(1), Instruction::Call { arity: 0 }, Instruction::Done],
                RuntimeError::NotCallable("int32"),
            ),
            (
                vec![
                    Instruction::Load {
                        address: LexicalAddress::new(0, 0),
                    },
                    int(1),
                    Instruction::GoCall { arity: 1 },
                    Instruction::Done,
                ],
                RuntimeError::BuiltinInGoroutine,
            ),
            (
                vec![
                    Instruction::LoadNil,
                    int(1),
                    Instruction::BinaryOp {
                        op: BinaryOperator::Add,
                    },
                    Instruction::Done,
                ],
                RuntimeError::OperatorType {
                    op: "+",
                    operand: "nil",
                },
            ),
            (vec![Instruction::Reset], RuntimeError::ControlStackUnderflow),
            (
                vec![Instruction::ExitScope],
                RuntimeError::ControlStackUnderflow,
            ),
            (
                vec![Instruction::BinaryOp {
                    op: BinaryOperator::Add,
                }],
                RuntimeError::StackUnderflow,
            ),
            (
                vec![Instruction::Goto { target: 5 }],
                RuntimeError::InvalidProgramCounter(5),
            ),
        ];
        for (code, expected) in cases {
            let vm = vm(code);
            assert_eq!(vm.main_interpreter().run(), Err(expected));
        }
    }

    #[test]
    fn every_load_constant_allocates() {
        let vm = vm(vec![int(5), int(5), Instruction::Done]);
        let mut interpreter = vm.main_interpreter();
        interpreter.run().unwrap();
        let stack = interpreter.state.stack();
        assert_ne!(stack[0], stack[1]);
    }
}
