//! Snapshot observers.
//!
//! Sinks run synchronously on the emitting thread, so they must be fast
//! and non-blocking: enqueue and return. They must not call back into the
//! orchestrator from `on_event`.

use std::sync::atomic::{AtomicUsize, Ordering};

use concurrent_queue::ConcurrentQueue;

use crate::core::snapshot::EventSnapshot;

pub trait EventSink: Send + Sync {
    fn on_event(&self, snapshot: &EventSnapshot);
}

/// Prints one line per snapshot to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn on_event(&self, snapshot: &EventSnapshot) {
        println!(
            "[fd={}] {:<12} {}",
            snapshot.fd,
            format!("{:?}", snapshot.state),
            snapshot.event
        );
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub total_events: usize,
    pub errors: usize,
}

/// Counts snapshots and failures.
#[derive(Debug, Default)]
pub struct MetricsSink {
    total_events: AtomicUsize,
    errors: AtomicUsize,
}

impl MetricsSink {
    pub fn new() -> MetricsSink {
        MetricsSink::default()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            total_events: self.total_events.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl EventSink for MetricsSink {
    fn on_event(&self, snapshot: &EventSnapshot) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if snapshot.event.is_error() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Buffers snapshots for an observer thread: the emit path enqueues, the
/// observer drains at its own pace. This is the intended shape for UI
/// sinks, which must never do work on the emitting thread.
pub struct QueueSink {
    queue: ConcurrentQueue<EventSnapshot>,
}

impl QueueSink {
    pub fn new() -> QueueSink {
        QueueSink {
            queue: ConcurrentQueue::unbounded(),
        }
    }

    /// Removes and returns everything buffered so far.
    pub fn drain(&self) -> Vec<EventSnapshot> {
        let mut out = Vec::new();
        while let Ok(snapshot) = self.queue.pop() {
            out.push(snapshot);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for QueueSink {
    fn default() -> QueueSink {
        QueueSink::new()
    }
}

impl EventSink for QueueSink {
    fn on_event(&self, snapshot: &EventSnapshot) {
        // Push only fails on a closed or full queue; this one is unbounded
        // and lives as long as the sink.
        let _ = self.queue.push(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{Event, EventType};
    use crate::core::fsm::LifeState;
    use crate::error::Error;

    fn snapshot(event: Event) -> EventSnapshot {
        EventSnapshot {
            fd: event.fd,
            state: LifeState::Init,
            ts: event.ts,
            error: None,
            payload: event.payload.clone(),
            event,
        }
    }

    #[test]
    fn metrics_sink_counts_errors() {
        let sink = MetricsSink::new();

        sink.on_event(&snapshot(Event::info(EventType::HttpSent, "ok")));
        sink.on_event(&snapshot(Event::failure(
            EventType::ConnectionIdle,
            Error::internal().message("boom").build(),
        )));

        let metrics = sink.metrics();
        assert_eq!(metrics.total_events, 2);
        assert_eq!(metrics.errors, 1);
    }

    #[test]
    fn queue_sink_buffers_in_order() {
        let sink = QueueSink::new();

        sink.on_event(&snapshot(Event::info(EventType::DnsResolveStart, "a")));
        sink.on_event(&snapshot(Event::info(EventType::DnsResolveDone, "b")));
        assert_eq!(sink.len(), 2);

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].event.kind, EventType::DnsResolveStart);
        assert_eq!(drained[1].event.kind, EventType::DnsResolveDone);
        assert!(sink.is_empty());
    }
}
