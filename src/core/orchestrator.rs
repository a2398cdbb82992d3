//! The event fan-out hub.
//!
//! `emit` serialises the whole pipeline under one mutex: append to the
//! timeline, advance the session's state machine, re-read the stored
//! event, compose an immutable snapshot, deliver it to every registered
//! sink. Sinks therefore observe every event exactly once per attachment,
//! in strict emit order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::core::event::{Event, SessionId};
use crate::core::fsm::{FsmManager, LifeState, LifecycleFsm};
use crate::core::sink::EventSink;
use crate::core::snapshot::EventSnapshot;
use crate::core::timeline::Timeline;
use crate::error::{Error, Result};

pub struct Orchestrator {
    timeline: Timeline,
    fsms: FsmManager,
    /// Sink list, doubling as the pipeline mutex: holding it serialises
    /// emits and guards attach/detach.
    sinks: Mutex<Vec<Arc<dyn EventSink>>>,
    next_session_id: AtomicU64,
}

impl Default for Orchestrator {
    fn default() -> Orchestrator {
        Orchestrator::new()
    }
}

impl Orchestrator {
    pub fn new() -> Orchestrator {
        Orchestrator {
            timeline: Timeline::new(),
            fsms: FsmManager::new(),
            sinks: Mutex::new(Vec::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh session id. Ids start at 1 and are never recycled.
    pub fn new_session(&self) -> SessionId {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs the full pipeline for one event. Sink failures are the sinks'
    /// own problem and never propagate; a timeline failure aborts the emit
    /// before any sink is called.
    pub fn emit(&self, e: Event) -> Result<()> {
        let sinks = self.sinks.lock().unwrap();

        self.timeline.push(e).map_err(|err| {
            Error::internal()
                .resource_exhausted()
                .message("failed to append event to timeline")
                .context("Orchestrator::emit")
                .wrap(err)
                .build()
        })?;

        // Re-read the stored copy so the snapshot reflects exactly what the
        // log holds.
        let stored = self.timeline.latest_event().map_err(|err| {
            Error::internal()
                .message("failed to fetch latest event after push")
                .context("Orchestrator::emit")
                .wrap(err)
                .build()
        })?;

        self.fsms.on_event(&stored);
        let fsm = self.fsms.get(stored.session_id);

        let snapshot = EventSnapshot {
            fd: stored.fd,
            state: fsm.as_ref().map_or(LifeState::Init, LifecycleFsm::state),
            ts: stored.ts,
            error: fsm.as_ref().and_then(|f| f.last_error().cloned()),
            payload: stored.payload.clone(),
            event: stored,
        };

        debug!(
            kind = snapshot.event.kind.as_ref(),
            session = snapshot.event.session_id,
            sinks = sinks.len(),
            "emit"
        );

        for sink in sinks.iter() {
            sink.on_event(&snapshot);
        }

        Ok(())
    }

    /// Registers a sink. Attaching the same sink twice is allowed; it will
    /// then see every event once per attachment.
    pub fn attach(&self, sink: Arc<dyn EventSink>) {
        self.sinks.lock().unwrap().push(sink);
    }

    /// Removes every attachment of `sink`, compared by identity.
    pub fn detach(&self, sink: &Arc<dyn EventSink>) {
        self.sinks
            .lock()
            .unwrap()
            .retain(|s| !Arc::ptr_eq(s, sink));
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn fsm(&self, session_id: SessionId) -> Option<LifecycleFsm> {
        self.fsms.get(session_id)
    }

    /// Clears the timeline and the state machines. Sinks stay attached.
    pub fn reset(&self) {
        let _sinks = self.sinks.lock().unwrap();
        self.timeline.clear();
        self.fsms.clear();
    }
}
