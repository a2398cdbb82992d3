//! Session lifecycle state machine.
//!
//! Each session walks `Init → Resolving → Connecting → (Handshaking) →
//! Established → Sending → Receiving → Finished`, driven purely by the
//! event stream. Any event carrying an error forces `Error`. `Finished`
//! and `Error` are absorbing: later events refresh the timestamp but never
//! the state.

use std::os::unix::io::RawFd;
use std::sync::Mutex;
use std::time::SystemTime;

use indexmap::IndexMap;
use strum::AsRefStr;
use tracing::trace;

use crate::core::event::{Event, EventType, SessionId};
use crate::error::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr)]
pub enum LifeState {
    Init,
    Resolving,
    Connecting,
    Handshaking,
    Established,
    Sending,
    Receiving,
    Finished,
    Error,
}

impl LifeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifeState::Finished | LifeState::Error)
    }
}

#[derive(Clone, Debug)]
pub struct LifecycleFsm {
    fd: RawFd,
    state: LifeState,
    start_ts: Option<SystemTime>,
    last_ts: Option<SystemTime>,
    last_error: Option<Error>,
}

impl LifecycleFsm {
    pub fn new(fd: RawFd) -> LifecycleFsm {
        LifecycleFsm {
            fd,
            state: LifeState::Init,
            start_ts: None,
            last_ts: None,
            last_error: None,
        }
    }

    /// The fd is auxiliary metadata; sessions are identified by id and may
    /// share an fd.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn start_timestamp(&self) -> Option<SystemTime> {
        self.start_ts
    }

    pub fn last_timestamp(&self) -> Option<SystemTime> {
        self.last_ts
    }

    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn on_event(&mut self, e: &Event) {
        if self.fd < 0 && e.has_fd() {
            self.fd = e.fd;
        }

        if self.start_ts.is_none() {
            self.start_ts = Some(e.ts);
        }
        self.last_ts = Some(e.ts);

        if self.state.is_terminal() {
            return;
        }

        // Errors override any transition and latch.
        if let Some(err) = &e.error {
            self.last_error = Some(err.clone());
            self.transit(LifeState::Error);
            return;
        }

        let next = match (self.state, e.kind) {
            (LifeState::Init, EventType::DnsResolveStart) => Some(LifeState::Resolving),
            (LifeState::Init, EventType::TcpConnectStart) => Some(LifeState::Connecting),

            (LifeState::Resolving, EventType::DnsResolveDone) => Some(LifeState::Connecting),

            (LifeState::Connecting, EventType::TcpConnectSuccess) => Some(LifeState::Established),

            (LifeState::Handshaking, EventType::TlsHandshakeDone) => Some(LifeState::Established),

            (LifeState::Established, EventType::HttpRequestBuild)
            | (LifeState::Established, EventType::HttpSent) => Some(LifeState::Sending),

            (LifeState::Sending, EventType::HttpSent) => Some(LifeState::Receiving),

            (LifeState::Receiving, EventType::HttpHeadersReceived) => Some(LifeState::Receiving),
            (LifeState::Receiving, EventType::HttpBodyDone)
            | (LifeState::Receiving, EventType::ConnectionClosed) => Some(LifeState::Finished),

            _ => None,
        };

        if let Some(next) = next {
            self.transit(next);
        }
    }

    fn transit(&mut self, next: LifeState) {
        trace!(
            fd = self.fd,
            from = self.state.as_ref(),
            to = next.as_ref(),
            "fsm transition"
        );
        self.state = next;
    }
}

/// Session-keyed container of state machines. Instances are created lazily
/// on the first event for a session and live until [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct FsmManager {
    fsms: Mutex<IndexMap<SessionId, LifecycleFsm>>,
}

impl FsmManager {
    pub fn new() -> FsmManager {
        FsmManager::default()
    }

    pub fn on_event(&self, e: &Event) {
        let mut fsms = self.fsms.lock().unwrap();

        fsms.entry(e.session_id)
            .or_insert_with(|| LifecycleFsm::new(e.fd))
            .on_event(e);
    }

    /// Read-only view of a session's machine.
    pub fn get(&self, session_id: SessionId) -> Option<LifecycleFsm> {
        self.fsms.lock().unwrap().get(&session_id).cloned()
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.fsms.lock().unwrap().contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.fsms.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.fsms.lock().unwrap().clear();
    }
}
