use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex};

use crate::{Address, ExecutionState, Interpreter, RuntimeError, VMProxy};

/// An OS thread whose completion can be awaited from any thread.
#[derive(Debug)]
pub struct NativeThread {
    handle: Mutex<Option<JoinHandle<()>>>,
    done: (Mutex<bool>, Condvar),
}

impl NativeThread {
    pub fn spawn<F>(name: String, f: F) -> io::Result<Arc<Self>>
    where
        F: FnOnce(),
        F: Send + 'static,
    {
        let jt = Arc::new(Self {
            handle: Mutex::new(None),
            done: (Mutex::new(false), Condvar::new()),
        });

        let jt2 = Arc::clone(&jt);
        let h = thread::Builder::new().name(name).spawn(move || {
            f();
            let (ref mx, ref cv) = jt2.done;
            *mx.lock() = true;
            cv.notify_all();
        })?;
        *jt.handle.lock() = Some(h);
        Ok(jt)
    }

    pub fn is_finished(&self) -> bool {
        *self.done.0.lock()
    }

    pub fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(h) = handle {
            if h.join().is_err() {
                log::error!("native thread panicked");
            }
            let (ref mx, ref cv) = self.done;
            *mx.lock() = true;
            cv.notify_all();
            return;
        }

        let (ref mx, ref cv) = self.done;
        let mut done = mx.lock();
        while !*done {
            cv.wait(&mut done);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoroutineFailure {
    pub id: usize,
    pub error: RuntimeError,
}

/// Starts one execution unit per `go` statement and keeps track of them
/// for the host.
#[derive(Debug, Default)]
pub struct Dispatcher {
    next_id: AtomicUsize,
    threads: Mutex<Vec<Arc<NativeThread>>>,
    failures: Mutex<Vec<GoroutineFailure>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a new execution unit from `entry` in `env`. `exit_marker` is the
    /// call marker its final return lands on. Does not wait for it.
    pub fn spawn(
        &self,
        vm: VMProxy,
        env: Address,
        entry: usize,
        exit_marker: Address,
    ) -> Result<usize, RuntimeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let thread = NativeThread::spawn(format!("goroutine-{id}"), move || {
            let shared = Arc::clone(&vm.shared);
            let mut state = ExecutionState::new(&shared.state_info, env, entry);
            state.push_return(exit_marker);
            match Interpreter::new(vm, state).run() {
                Ok(stats) => log::info!(
                    "goroutine {id} finished after {} instructions",
                    stats.instructions
                ),
                Err(error) => {
                    log::error!("goroutine {id} failed: {error}");
                    shared.dispatcher.record_failure(id, error);
                }
            }
        })
        .map_err(|err| RuntimeError::SpawnFailed(err.to_string()))?;
        self.track(thread);
        log::info!("spawned goroutine {id} at pc {entry}");
        Ok(id)
    }

    /// Joins and drops finished threads, then keeps `thread`.
    fn track(&self, thread: Arc<NativeThread>) {
        let mut threads = self.threads.lock();
        threads.retain(|tracked| {
            if tracked.is_finished() {
                tracked.join();
                return false;
            }
            true
        });
        threads.push(thread);
    }

    fn record_failure(&self, id: usize, error: RuntimeError) {
        self.failures.lock().push(GoroutineFailure { id, error });
    }

    /// Blocks until every goroutine, including ones started while waiting,
    /// has finished.
    pub fn wait_idle(&self) {
        loop {
            let batch = std::mem::take(&mut *self.threads.lock());
            if batch.is_empty() {
                break;
            }
            for thread in batch {
                thread.join();
            }
        }
    }

    pub fn spawned(&self) -> usize {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Goroutines started and not yet finished.
    pub fn running(&self) -> usize {
        self.threads
            .lock()
            .iter()
            .filter(|thread| !thread.is_finished())
            .count()
    }

    pub fn failures(&self) -> Vec<GoroutineFailure> {
        self.failures.lock().clone()
    }
}
