use std::sync::Arc;

use crate::{
    Address, Console, Dispatcher, ExecutionState, ExecutionStateInfo, ExecutionStats,
    GoroutineFailure, Heap, HeapCreateInfo, HeapError, HeapProxy, Interpreter, Program,
    RuntimeError, SpecialObjects,
    primitives::{BUILTINS, CONSTANT_NAMES},
};

#[derive(Debug, Clone, Default)]
pub struct VMCreateInfo {
    pub heap: HeapCreateInfo,
    pub state: ExecutionStateInfo,
}

/// State every execution unit shares.
#[derive(Debug)]
pub struct VMShared {
    pub heap: Heap,
    pub specials: SpecialObjects,
    /// environment made of the predeclared frame
    pub globals: Address,
    pub program: Program,
    pub console: Arc<Console>,
    pub dispatcher: Dispatcher,
    pub state_info: ExecutionStateInfo,
}

pub struct VM {
    inner: Arc<VMShared>,
}

/// Handle of one execution unit on the shared VM.
#[derive(Debug)]
pub struct VMProxy {
    pub shared: Arc<VMShared>,
    pub heap: HeapProxy,
}

/// Builds the runtime twin of the predeclared compile frame: one builtin
/// object per id, then `true`, `false` and `nil`.
fn predeclared_environment(
    heap: &HeapProxy,
    specials: &SpecialObjects,
) -> Result<Address, HeapError> {
    let frame = heap.alloc_frame(BUILTINS.len() + CONSTANT_NAMES.len(), specials.unassigned)?;
    for id in 0..BUILTINS.len() {
        let builtin = heap.alloc_builtin(id as u16)?;
        heap.set_child(frame, id, builtin)?;
    }
    let base = BUILTINS.len();
    heap.set_child(frame, base, specials.true_obj)?;
    heap.set_child(frame, base + 1, specials.false_obj)?;
    heap.set_child(frame, base + 2, specials.nil)?;
    heap.env_extend(specials.empty_env, frame)
}

impl VM {
    pub fn new(
        info: VMCreateInfo,
        program: Program,
        console: Arc<Console>,
    ) -> Result<Self, HeapError> {
        let heap = Heap::new(info.heap)?;
        let proxy = heap.create_proxy();
        let specials = SpecialObjects::allocate(&proxy)?;
        let globals = predeclared_environment(&proxy, &specials)?;
        log::debug!(
            "vm ready: {} of {} heap words used, {} instructions",
            heap.allocated(),
            heap.capacity(),
            program.len()
        );

        let inner = VMShared {
            heap,
            specials,
            globals,
            program,
            console,
            dispatcher: Dispatcher::new(),
            state_info: info.state,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn new_proxy(&self) -> VMProxy {
        VMProxy {
            shared: self.inner.clone(),
            heap: self.inner.heap.create_proxy(),
        }
    }

    /// The main execution unit: program start in the predeclared
    /// environment.
    pub fn main_interpreter(&self) -> Interpreter {
        let state = ExecutionState::new(&self.inner.state_info, self.inner.globals, 0);
        Interpreter::new(self.new_proxy(), state)
    }

    /// Runs the main execution unit on the calling thread. Goroutines it
    /// starts may still be running when this returns.
    pub fn run(&self) -> Result<ExecutionStats, RuntimeError> {
        self.main_interpreter().run()
    }

    pub fn wait_idle(&self) {
        self.inner.dispatcher.wait_idle();
    }

    pub fn failures(&self) -> Vec<GoroutineFailure> {
        self.inner.dispatcher.failures()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn program(&self) -> &Program {
        &self.inner.program
    }

    pub fn heap(&self) -> &Heap {
        &self.inner.heap
    }

    pub fn console(&self) -> &Console {
        &self.inner.console
    }
}

impl VMProxy {
    pub fn create_proxy(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            heap: self.heap.create_proxy(),
        }
    }

    pub fn specials(&self) -> &SpecialObjects {
        &self.shared.specials
    }

    pub fn program(&self) -> &Program {
        &self.shared.program
    }

    pub fn console(&self) -> &Console {
        &self.shared.console
    }

    pub fn spawn_goroutine(
        &self,
        env: Address,
        entry: usize,
        exit_marker: Address,
    ) -> Result<usize, RuntimeError> {
        self.shared
            .dispatcher
            .spawn(self.create_proxy(), env, entry, exit_marker)
    }
}
