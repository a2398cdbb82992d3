//! Append-only event log with secondary indices.
//!
//! The log owns the event vector plus two inverted indices, fd → positions
//! and type → positions. After every mutation the indices exactly cover
//! the vector: destructive filters rebuild them wholesale rather than
//! patching them in place, which keeps the invariants checkable. Time
//! queries assume monotonic insertion order; call
//! [`sort_by_time`](Timeline::sort_by_time) first if that may not hold.

use std::os::unix::io::RawFd;
use std::sync::Mutex;
use std::time::SystemTime;

use indexmap::IndexMap;

use crate::core::event::{Event, EventType};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    by_fd: IndexMap<RawFd, Vec<usize>>,
    by_type: IndexMap<EventType, Vec<usize>>,
}

impl Inner {
    fn index_event(by_fd: &mut IndexMap<RawFd, Vec<usize>>, by_type: &mut IndexMap<EventType, Vec<usize>>, e: &Event, pos: usize) {
        if e.has_fd() {
            by_fd.entry(e.fd).or_default().push(pos);
        }
        by_type.entry(e.kind).or_default().push(pos);
    }

    fn push(&mut self, e: Event) -> usize {
        let pos = self.events.len();
        Self::index_event(&mut self.by_fd, &mut self.by_type, &e, pos);
        self.events.push(e);
        pos
    }

    fn rebuild_indices(&mut self) {
        self.by_fd.clear();
        self.by_type.clear();

        for (pos, e) in self.events.iter().enumerate() {
            Self::index_event(&mut self.by_fd, &mut self.by_type, e, pos);
        }
    }

    fn retain(&mut self, mut keep: impl FnMut(&Event) -> bool) -> usize {
        let before = self.events.len();
        self.events.retain(|e| keep(e));
        self.rebuild_indices();
        before - self.events.len()
    }

    fn collect(&self, positions: &[usize]) -> Vec<Event> {
        positions.iter().map(|&pos| self.events[pos].clone()).collect()
    }

    /// First position with `ts >= bound`, assuming monotonic order.
    fn lower_bound(&self, bound: SystemTime) -> usize {
        self.events.partition_point(|e| e.ts < bound)
    }

    fn time_range(&self, start: SystemTime, end: SystemTime) -> (usize, usize) {
        if start >= end {
            return (0, 0);
        }
        (self.lower_bound(start), self.lower_bound(end))
    }
}

#[derive(Debug, Default)]
pub struct Timeline {
    inner: Mutex<Inner>,
}

impl Timeline {
    pub fn new() -> Timeline {
        Timeline::default()
    }

    /// Appends an event and returns its log position.
    pub fn push(&self, e: Event) -> Result<usize> {
        Ok(self.inner.lock().unwrap().push(e))
    }

    /// Appends a batch, returning how many were stored.
    pub fn push_bulk(&self, batch: Vec<Event>) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();

        let count = batch.len();
        inner.events.reserve(count);
        for e in batch {
            inner.push(e);
        }

        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_fd(&self, fd: RawFd) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.by_fd.get(&fd).map_or(0, Vec::len)
    }

    pub fn count_by_type(&self, kind: EventType) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.by_type.get(&kind).map_or(0, Vec::len)
    }

    /// Events with `start <= ts < end`.
    pub fn count_by_time(&self, start: SystemTime, end: SystemTime) -> usize {
        let inner = self.inner.lock().unwrap();
        let (lo, hi) = inner.time_range(start, end);
        hi - lo
    }

    pub fn has_type(&self, kind: EventType) -> bool {
        self.count_by_type(kind) > 0
    }

    /// Stable-sorts the log by timestamp, rebuilds both indices and returns
    /// the event count.
    pub fn sort_by_time(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();

        inner.events.sort_by_key(|e| e.ts);
        inner.rebuild_indices();
        inner.events.len()
    }

    pub fn query_by_fd(&self, fd: RawFd) -> Vec<Event> {
        let inner = self.inner.lock().unwrap();
        match inner.by_fd.get(&fd) {
            Some(positions) => inner.collect(positions),
            None => Vec::new(),
        }
    }

    pub fn query_by_type(&self, kind: EventType) -> Vec<Event> {
        let inner = self.inner.lock().unwrap();
        match inner.by_type.get(&kind) {
            Some(positions) => inner.collect(positions),
            None => Vec::new(),
        }
    }

    pub fn query_by_time(&self, start: SystemTime, end: SystemTime) -> Vec<Event> {
        let inner = self.inner.lock().unwrap();
        let (lo, hi) = inner.time_range(start, end);
        inner.events[lo..hi].to_vec()
    }

    pub fn query_errors(&self) -> Vec<Event> {
        let inner = self.inner.lock().unwrap();
        inner.events.iter().filter(|e| e.is_error()).cloned().collect()
    }

    /// Removes events bound to `fd`. Negative fds are the unbound sentinel,
    /// not a real descriptor, so they match nothing.
    pub fn remove_by_fd(&self, fd: RawFd) -> usize {
        if fd < 0 {
            return 0;
        }
        self.inner.lock().unwrap().retain(|e| e.fd != fd)
    }

    pub fn remove_by_type(&self, kind: EventType) -> usize {
        self.inner.lock().unwrap().retain(|e| e.kind != kind)
    }

    /// Removes events with `start <= ts < end`.
    pub fn remove_by_time(&self, start: SystemTime, end: SystemTime) -> usize {
        if start >= end {
            return 0;
        }
        self.inner
            .lock()
            .unwrap()
            .retain(|e| !(start <= e.ts && e.ts < end))
    }

    pub fn latest_event(&self) -> Result<Event> {
        let inner = self.inner.lock().unwrap();
        inner
            .events
            .last()
            .cloned()
            .ok_or_else(|| empty_error("timeline holds no events", None))
    }

    pub fn latest_by_fd(&self, fd: RawFd) -> Result<Event> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_fd
            .get(&fd)
            .and_then(|positions| positions.last())
            .map(|&pos| inner.events[pos].clone())
            .ok_or_else(|| empty_error("no events for fd", Some(fd.to_string())))
    }

    pub fn latest_by_type(&self, kind: EventType) -> Result<Event> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_type
            .get(&kind)
            .and_then(|positions| positions.last())
            .map(|&pos| inner.events[pos].clone())
            .ok_or_else(|| empty_error("no events of type", Some(kind.as_ref().to_owned())))
    }

    /// Full copy of the log in insertion order, for subscriber catch-up.
    pub fn replay_all(&self) -> Vec<Event> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn replay_by_fd(&self, fd: RawFd) -> Vec<Event> {
        self.query_by_fd(fd)
    }

    pub fn replay_since(&self, ts: SystemTime) -> Vec<Event> {
        let inner = self.inner.lock().unwrap();
        let lo = inner.lower_bound(ts);
        inner.events[lo..].to_vec()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.events.clear();
        inner.by_fd.clear();
        inner.by_type.clear();
    }

    /// Checks that both indices exactly cover the event vector. Intended
    /// for tests and debug assertions.
    pub fn indices_consistent(&self) -> bool {
        let inner = self.inner.lock().unwrap();

        let with_fd = inner.events.iter().filter(|e| e.has_fd()).count();
        let fd_total: usize = inner.by_fd.values().map(Vec::len).sum();
        let type_total: usize = inner.by_type.values().map(Vec::len).sum();

        if fd_total != with_fd || type_total != inner.events.len() {
            return false;
        }

        let in_range = |positions: &Vec<usize>| positions.iter().all(|&p| p < inner.events.len());
        inner.by_fd.values().all(in_range) && inner.by_type.values().all(in_range)
    }
}

fn empty_error(message: &str, context: Option<String>) -> Error {
    let builder = Error::state().target_not_found().message(message);
    match context {
        Some(ctx) => builder.context(ctx).build(),
        None => builder.build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(kind: EventType, fd: RawFd) -> Event {
        Event::info(kind, "").fd(fd)
    }

    fn seeded() -> Timeline {
        let tl = Timeline::new();
        tl.push(event(EventType::DnsResolveStart, -1)).unwrap();
        tl.push(event(EventType::TcpConnectStart, 4)).unwrap();
        tl.push(event(EventType::DnsResolveDone, -1)).unwrap();
        tl.push(event(EventType::TcpConnectSuccess, 4)).unwrap();
        tl
    }

    #[test]
    fn push_returns_positions() {
        let tl = Timeline::new();

        assert_eq!(tl.push(event(EventType::HttpSent, 1)).unwrap(), 0);
        assert_eq!(tl.push(event(EventType::HttpSent, 1)).unwrap(), 1);
        assert_eq!(tl.len(), 2);
    }

    #[test]
    fn query_by_type_counts() {
        let tl = seeded();

        assert_eq!(tl.query_by_type(EventType::DnsResolveStart).len(), 1);
        assert_eq!(tl.query_by_type(EventType::HttpSent).len(), 0);
        assert_eq!(tl.count_by_type(EventType::TcpConnectSuccess), 1);
    }

    #[test]
    fn fd_index_skips_unbound_events() {
        let tl = seeded();

        assert_eq!(tl.count_by_fd(4), 2);
        assert_eq!(tl.count_by_fd(-1), 0);
        assert_eq!(tl.query_by_fd(4).len(), 2);
    }

    #[test]
    fn replay_preserves_insertion_order() {
        let tl = seeded();
        let all = tl.replay_all();

        assert_eq!(all.len(), 4);
        assert_eq!(all[0].kind, EventType::DnsResolveStart);
        assert_eq!(all[3].kind, EventType::TcpConnectSuccess);
    }

    #[test]
    fn remove_by_type_rebuilds_indices() {
        let tl = seeded();

        let removed = tl.remove_by_type(EventType::DnsResolveStart);
        assert_eq!(removed, 1);
        assert_eq!(tl.len(), 3);
        assert!(tl.indices_consistent());
        assert_eq!(tl.count_by_type(EventType::DnsResolveStart), 0);
        assert_eq!(tl.count_by_fd(4), 2);
    }

    #[test]
    fn remove_by_fd_rebuilds_indices() {
        let tl = seeded();

        let removed = tl.remove_by_fd(4);
        assert_eq!(removed, 2);
        assert_eq!(tl.len(), 2);
        assert!(tl.indices_consistent());
        assert_eq!(tl.count_by_fd(4), 0);
    }

    #[test]
    fn remove_by_unbound_fd_is_a_noop() {
        let tl = seeded();

        // The seeded timeline has two unbound (fd = -1) events; the
        // sentinel must not act as a "wipe all fd-less events" filter.
        assert_eq!(tl.remove_by_fd(-1), 0);
        assert_eq!(tl.len(), 4);
        assert!(tl.indices_consistent());
    }

    #[test]
    fn latest_accessors() {
        let tl = seeded();

        assert_eq!(tl.latest_event().unwrap().kind, EventType::TcpConnectSuccess);
        assert_eq!(tl.latest_by_fd(4).unwrap().kind, EventType::TcpConnectSuccess);
        assert_eq!(
            tl.latest_by_type(EventType::DnsResolveDone).unwrap().kind,
            EventType::DnsResolveDone
        );
    }

    #[test]
    fn latest_on_empty_is_target_not_found() {
        let tl = Timeline::new();

        let err = tl.latest_event().unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::TargetNotFound);
        assert!(tl.latest_by_fd(1).is_err());
        assert!(tl.latest_by_type(EventType::HttpSent).is_err());
    }

    #[test]
    fn time_windows_are_inclusive_exclusive() {
        let tl = Timeline::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = t0 + Duration::from_secs(1);
        let t2 = t0 + Duration::from_secs(2);

        for (ts, kind) in [
            (t0, EventType::DnsResolveStart),
            (t1, EventType::TcpConnectStart),
            (t2, EventType::TcpConnectSuccess),
        ] {
            let mut e = Event::info(kind, "");
            e.ts = ts;
            tl.push(e).unwrap();
        }

        assert_eq!(tl.count_by_time(t0, t2), 2);
        assert_eq!(tl.query_by_time(t0, t2).len(), 2);
        assert_eq!(tl.count_by_time(t0, t0), 0);
        assert_eq!(tl.replay_since(t1).len(), 2);

        assert_eq!(tl.remove_by_time(t1, t2), 1);
        assert_eq!(tl.len(), 2);
        assert!(tl.indices_consistent());
    }

    #[test]
    fn sort_by_time_is_stable_and_rebuilds() {
        let tl = Timeline::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(50);
        let t1 = t0 + Duration::from_secs(5);

        // Pushed out of order; the two t0 events must keep their relative
        // order after sorting.
        let mut a = Event::info(EventType::HttpSent, "late").fd(1);
        a.ts = t1;
        let mut b = Event::info(EventType::DnsResolveStart, "first").fd(2);
        b.ts = t0;
        let mut c = Event::info(EventType::DnsResolveDone, "second").fd(3);
        c.ts = t0;

        tl.push(a).unwrap();
        tl.push(b).unwrap();
        tl.push(c).unwrap();

        assert_eq!(tl.sort_by_time(), 3);
        assert!(tl.indices_consistent());

        let all = tl.replay_all();
        assert_eq!(all[0].message, "first");
        assert_eq!(all[1].message, "second");
        assert_eq!(all[2].message, "late");
    }

    #[test]
    fn query_errors_filters() {
        let tl = seeded();
        tl.push(Event::failure(
            EventType::TcpConnectTimeout,
            Error::transport().timeout().message("timed out").build(),
        ))
        .unwrap();

        let errors = tl.query_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, EventType::TcpConnectTimeout);
    }

    #[test]
    fn push_bulk_counts_and_indexes() {
        let tl = Timeline::new();

        let batch = vec![
            event(EventType::HttpSent, 2),
            event(EventType::HttpReceived, 2),
        ];
        assert_eq!(tl.push_bulk(batch).unwrap(), 2);
        assert_eq!(tl.count_by_fd(2), 2);
        assert!(tl.indices_consistent());
    }

    #[test]
    fn clear_drops_everything() {
        let tl = seeded();
        tl.clear();

        assert!(tl.is_empty());
        assert_eq!(tl.count_by_fd(4), 0);
        assert!(tl.indices_consistent());
    }
}
