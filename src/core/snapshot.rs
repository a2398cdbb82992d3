use std::os::unix::io::RawFd;
use std::time::SystemTime;

use crate::core::event::Event;
use crate::core::fsm::LifeState;
use crate::error::Error;

/// Value-typed aggregation of an event and the post-event session state,
/// delivered to sinks. Safe to move across threads; never references
/// orchestrator internals.
#[derive(Clone, Debug)]
pub struct EventSnapshot {
    pub event: Event,
    pub fd: RawFd,
    pub state: LifeState,
    pub ts: SystemTime,
    /// The session's latched error, if it has entered the error state.
    pub error: Option<Error>,
    pub payload: Option<Vec<u8>>,
}
