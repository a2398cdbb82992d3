//! Single-slot background execution.
//!
//! The engine runs at most one scenario at a time on a dedicated worker
//! thread. `execute` claims the slot with a compare-and-set; the worker
//! releases it on every exit path, including panics, via an RAII guard.
//! A scenario failure becomes a `CONNECTION_IDLE` failure event rather
//! than tearing anything down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::core::event::{Event, EventType};
use crate::core::orchestrator::Orchestrator;
use crate::core::scenario::Scenario;
use crate::error::Error;

pub struct Engine {
    orch: Arc<Orchestrator>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the running flag when the worker exits, however it exits.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Engine {
    pub fn new(orch: Arc<Orchestrator>) -> Engine {
        Engine {
            orch,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Starts `scenario` on the worker if the slot is free. Returns `false`
    /// without side effects when a scenario is already running.
    pub fn execute(&self, mut scenario: Box<dyn Scenario>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("engine busy, scenario rejected");
            return false;
        }

        let orch = self.orch.clone();
        let guard = SlotGuard(self.running.clone());

        let handle = std::thread::spawn(move || {
            let _guard = guard;

            if let Err(err) = scenario.run(&orch) {
                warn!(error = %err, "scenario failed");
                let _ = orch.emit(Event::failure(
                    EventType::ConnectionIdle,
                    Error::internal()
                        .message("scenario failed")
                        .wrap(err)
                        .build(),
                ));
            }
        });

        // The previous worker, if any, already released the slot; reap it
        // before parking the new handle.
        let mut worker = self.worker.lock().unwrap();
        if let Some(old) = worker.take() {
            let _ = old.join();
        }
        *worker = Some(handle);

        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Blocks until the current scenario, if any, has finished.
    pub fn join(&self) {
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.join();
    }
}
