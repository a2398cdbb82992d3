//! An observable network probe.
//!
//! `netprobe` executes a network scenario (an HTTP GET over TCP, out of
//! the box) while emitting a time-ordered stream of semantically rich
//! events. The crate is built from two halves:
//!
//! * a non-blocking I/O engine — [`ByteBuffer`], [`Poller`] and
//!   [`TcpSocket`] give deadline-bounded connect/read/write driven by
//!   epoll readiness;
//! * an observability substrate — every step becomes an [`Event`] that the
//!   [`Orchestrator`] appends to a queryable [`Timeline`], folds into a
//!   per-session lifecycle state machine, and fans out to attached sinks
//!   as immutable snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use netprobe::{Engine, MetricsSink, Orchestrator};
//! use netprobe::http::HttpGetScenario;
//!
//! let orch = Arc::new(Orchestrator::new());
//! let metrics = Arc::new(MetricsSink::new());
//! orch.attach(metrics.clone());
//!
//! let engine = Engine::new(orch.clone());
//! let scenario = HttpGetScenario::new("http://example.com/").unwrap();
//! engine.execute(Box::new(scenario));
//! engine.join();
//!
//! println!("observed {} events", metrics.metrics().total_events);
//! ```

#[macro_use]
mod sys;

mod buffer;
mod error;
mod poller;
mod ready;

pub mod core;
pub mod http;
pub mod net;

pub use buffer::ByteBuffer;
pub use error::{
    category_from_errno, category_from_gai, Error, ErrorBuilder, ErrorCategory, ErrorDomain, Result,
};
pub use poller::{PollEvent, Poller, MAX_EVENTS};
pub use ready::Ready;

pub use crate::core::{
    ConsoleSink, Engine, Event, EventSink, EventSnapshot, EventType, FsmManager, LifeState,
    LifecycleFsm, Metrics, MetricsSink, Orchestrator, QueueSink, Scenario, SessionId, Timeline,
};
pub use net::{AddressFamily, Endpoint, Resolver, SystemResolver, TcpSocket};
