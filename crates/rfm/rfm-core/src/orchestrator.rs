//! RT/async orchestrator (component F): chooses between in-line real-time-
//! thread execution and an independent worker thread, and mediates the
//! cycle-trigger semaphore, per §4.6.

use crate::semaphore::CycleSemaphore;
use rfm_config::ExecMode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info;

/// What one `Execute` pass reported back to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// A downsampled cycle was caught (the original's `NoError`).
    Caught,
    /// Nothing new this pass (sync missed, or not yet due under the
    /// downsample ratio).
    Skipped,
}

/// Worker-thread timeout while `ok_to_run` is false (fail-fast shutdown),
/// per §4.6.
const SHUTDOWN_WAIT: Duration = Duration::from_millis(1000);

pub struct RtOrchestrator {
    exec_mode: ExecMode,
    cycle_budget: Option<i32>,
    semaphore: Arc<CycleSemaphore>,
    ok_to_run: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RtOrchestrator {
    pub fn new(exec_mode: ExecMode, cycle_budget: Option<i32>) -> Self {
        Self {
            exec_mode,
            cycle_budget,
            semaphore: Arc::new(CycleSemaphore::new()),
            ok_to_run: Arc::new(AtomicBool::new(true)),
            exhausted: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn exec_mode(&self) -> ExecMode {
        self.exec_mode
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    /// Checks `own_cycle_counter + 1` against `cycle_budget` and latches
    /// `exhausted` the first time it is surpassed, per §4.6's "slave cycle
    /// budget" — a process-local stand-in for the original's host-framework
    /// termination message, which is out of scope here.
    pub fn check_cycle_budget(&self, own_cycle_counter: i32) {
        let Some(budget) = self.cycle_budget else {
            return;
        };
        if own_cycle_counter + 1 > budget && !self.exhausted.swap(true, Ordering::AcqRel) {
            info!(own_cycle_counter, budget, "cycle budget exhausted, run marked exhausted");
        }
    }

    /// Spawns the worker thread for Spawned mode. `execute` is called in a
    /// loop until [`Self::stop`]; each [`ExecOutcome::Caught`] signals the
    /// cycle semaphore for the caller's `synchronise_spawned`.
    pub fn start_spawned(&mut self, mut execute: impl FnMut() -> ExecOutcome + Send + 'static) {
        assert_eq!(self.exec_mode, ExecMode::Spawned, "start_spawned requires Spawned exec mode");
        let semaphore = self.semaphore.clone();
        let ok_to_run = self.ok_to_run.clone();
        self.worker = Some(std::thread::spawn(move || {
            while ok_to_run.load(Ordering::Acquire) {
                if execute() == ExecOutcome::Caught {
                    semaphore.signal();
                }
            }
        }));
    }

    /// Spawned-mode cycle entry: waits on the cycle semaphore. Infinite
    /// timeout while running; `SHUTDOWN_WAIT` once `stop` has been called,
    /// per §4.6.
    ///
    /// Only safe to call while holding no lock the worker thread also needs
    /// — see [`Self::cycle_waiter`] for the handle callers sharing the
    /// orchestrator behind a `Mutex` must use instead.
    pub fn synchronise_spawned(&self) -> bool {
        assert_eq!(self.exec_mode, ExecMode::Spawned, "synchronise_spawned requires Spawned exec mode");
        self.cycle_waiter().wait()
    }

    /// A handle that waits on the cycle semaphore without borrowing the
    /// orchestrator. Spawned mode's worker thread signals this same
    /// semaphore from inside a call that needs the data-source lock the
    /// orchestrator usually lives behind; a caller blocked in
    /// `synchronise_spawned` while still holding that lock would deadlock
    /// the worker out of ever running. Clone this handle, drop the lock,
    /// then wait on it.
    pub fn cycle_waiter(&self) -> CycleWaiter {
        CycleWaiter {
            semaphore: self.semaphore.clone(),
            ok_to_run: self.ok_to_run.clone(),
        }
    }

    /// Unblocks any waiter and joins the worker thread, if one was started.
    pub fn stop(&mut self) {
        self.ok_to_run.store(false, Ordering::Release);
        self.semaphore.signal();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RtOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A cloned, lock-free view of the cycle semaphore and shutdown flag, for
/// waiting on a cycle without holding whatever lock protects the
/// orchestrator itself. See [`RtOrchestrator::cycle_waiter`].
pub struct CycleWaiter {
    semaphore: Arc<CycleSemaphore>,
    ok_to_run: Arc<AtomicBool>,
}

impl CycleWaiter {
    pub fn wait(&self) -> bool {
        let timeout = if self.ok_to_run.load(Ordering::Acquire) { None } else { Some(SHUTDOWN_WAIT) };
        self.semaphore.wait(timeout)
    }
}
