//! Background task runner for incidental host jobs.
//!
//! ## Execution model
//!
//! ```text
//! submit(name, unit) ─► registry ◄── worker: every tick
//!                                       ├─ take every Pending unit
//!                                       ├─ run it synchronously (panics caught)
//!                                       └─ record Completed(result) | Failed(error)
//! ```
//!
//! Units never retry. A failed unit is isolated: the worker keeps ticking and
//! other units still run. Not used on the dispatch hot path.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::session::SessionState;

/// A deferred computation. `Ok` carries a human-readable result.
pub type UnitOfWork = Box<dyn FnOnce() -> anyhow::Result<String> + Send + 'static>;

/// Default worker wake interval.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Observable state of one registered unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Completed(String),
    Failed(String),
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

struct TaskEntry {
    /// Bumped on every submit so a result for a replaced unit is discarded.
    generation: u64,
    work: Option<UnitOfWork>,
    state: TaskState,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, TaskEntry>,
    next_generation: u64,
}

/// Handle to the worker thread and its task registry.
pub struct TaskRunner {
    registry: Arc<Mutex<Registry>>,
    /// Dropping the sender wakes the worker immediately.
    shutdown_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl TaskRunner {
    /// Spawn the worker. It exits on `stop()` or when `session` ends.
    pub fn spawn(tick: Duration, session: SessionState) -> Result<Self> {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let worker_registry = Arc::clone(&registry);
        let worker = std::thread::Builder::new()
            .name("nik-tasks".into())
            .spawn(move || run(worker_registry, shutdown_rx, session, tick))?;

        Ok(Self {
            registry,
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Register `unit` under `name`. Re-submitting an existing name replaces
    /// the previous entry, finished or not.
    pub fn submit<F>(&self, name: impl Into<String>, unit: F)
    where
        F: FnOnce() -> anyhow::Result<String> + Send + 'static,
    {
        let name = name.into();
        let mut registry = self.registry.lock();
        registry.next_generation += 1;
        let generation = registry.next_generation;
        let replaced = registry
            .entries
            .insert(
                name.clone(),
                TaskEntry {
                    generation,
                    work: Some(Box::new(unit)),
                    state: TaskState::Pending,
                },
            )
            .is_some();
        debug!(task = %name, replaced, "task submitted");
    }

    /// Current state of `name`, if registered.
    pub fn status(&self, name: &str) -> Option<TaskState> {
        self.registry
            .lock()
            .entries
            .get(name)
            .map(|entry| entry.state.clone())
    }

    /// Number of units that have not run yet.
    pub fn pending_count(&self) -> usize {
        self.registry
            .lock()
            .entries
            .values()
            .filter(|entry| !entry.state.is_finished())
            .count()
    }

    /// `true` while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }

    /// Signal the worker, block until it has exited, then discard every unit.
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("task worker panicked");
            }
            info!("task runner stopped");
        }
        self.registry.lock().entries.clear();
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    registry: Arc<Mutex<Registry>>,
    shutdown_rx: Receiver<()>,
    session: SessionState,
    tick: Duration,
) {
    debug!(?tick, "task worker started");
    loop {
        select! {
            recv(shutdown_rx) -> _ => break,
            default(tick) => {}
        }
        if !session.is_running() {
            debug!("session ended, task worker exiting");
            break;
        }
        run_pending(&registry);
    }
}

/// Run every pending unit once. The registry lock is not held while a unit
/// executes, so `submit`/`status` never wait on user code.
fn run_pending(registry: &Mutex<Registry>) {
    let due: Vec<(String, u64, UnitOfWork)> = {
        let mut guard = registry.lock();
        guard
            .entries
            .iter_mut()
            .filter_map(|(name, entry)| {
                entry
                    .work
                    .take()
                    .map(|work| (name.clone(), entry.generation, work))
            })
            .collect()
    };

    for (name, generation, work) in due {
        let outcome = match catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(result)) => TaskState::Completed(result),
            Ok(Err(e)) => TaskState::Failed(format!("{e:#}")),
            Err(panic) => TaskState::Failed(panic_message(panic.as_ref())),
        };

        match &outcome {
            TaskState::Failed(error) => warn!(task = %name, %error, "task failed"),
            _ => debug!(task = %name, "task completed"),
        }

        let mut guard = registry.lock();
        if let Some(entry) = guard.entries.get_mut(&name) {
            if entry.generation == generation {
                entry.state = outcome;
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".into()
    }
}
