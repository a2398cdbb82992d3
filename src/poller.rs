//! Readiness multiplexer over epoll.
//!
//! The poller owns the interest set for a group of file descriptors and
//! delivers readiness in batches of at most [`MAX_EVENTS`] per wait. It is
//! move-only and expects external synchronisation: one thread drives a
//! given poller instance.

use std::collections::HashSet;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use tracing::trace;

use crate::error::{Error, Result};
use crate::ready::Ready;
use crate::sys;

/// Batch limit for a single wait.
pub const MAX_EVENTS: usize = 64;

/// A single readiness report: which fd, and what it is ready for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PollEvent {
    pub fd: RawFd,
    pub ready: Ready,
}

impl PollEvent {
    pub fn is_readable(&self) -> bool {
        self.ready.is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.ready.is_writable()
    }

    pub fn is_error(&self) -> bool {
        self.ready.is_error()
    }
}

pub struct Poller {
    epoll: sys::epoll::Epoll,
    interest: HashSet<RawFd>,
    events: Vec<libc::epoll_event>,
}

impl Poller {
    pub fn new() -> Result<Poller> {
        let epoll = sys::epoll::Epoll::new().map_err(|e| {
            Error::system()
                .from_io(&e)
                .message("failed to create epoll instance")
                .context("epoll_create1")
                .build()
        })?;

        Ok(Poller {
            epoll,
            interest: HashSet::new(),
            events: Vec::with_capacity(MAX_EVENTS),
        })
    }

    pub fn is_tracking(&self, fd: RawFd) -> bool {
        self.interest.contains(&fd)
    }

    /// Registers `fd` with the given interest. Adding an fd that is already
    /// tracked degrades to [`modify`](Self::modify).
    pub fn add(&mut self, fd: RawFd, interest: Ready) -> Result<()> {
        if self.is_tracking(fd) {
            return self.modify(fd, interest);
        }

        trace!(fd, ?interest, "poller add");
        self.epoll
            .add(fd, interest)
            .map_err(|e| ctl_error(&e, "Poller::add: epoll_ctl"))?;
        self.interest.insert(fd);

        Ok(())
    }

    /// Changes the interest of a tracked `fd`. Modifying an fd that is not
    /// tracked degrades to [`add`](Self::add).
    pub fn modify(&mut self, fd: RawFd, interest: Ready) -> Result<()> {
        if !self.is_tracking(fd) {
            return self.add(fd, interest);
        }

        trace!(fd, ?interest, "poller modify");
        self.epoll
            .modify(fd, interest)
            .map_err(|e| ctl_error(&e, "Poller::modify: epoll_ctl"))
    }

    /// Drops `fd` from the interest set. Removing an untracked fd is an
    /// error but leaves the set intact.
    pub fn remove(&mut self, fd: RawFd) -> Result<()> {
        if !self.is_tracking(fd) {
            return Err(Error::state()
                .target_not_found()
                .message("fd is not tracked by this poller")
                .context(fd.to_string())
                .build());
        }

        trace!(fd, "poller remove");
        self.epoll
            .delete(fd)
            .map_err(|e| ctl_error(&e, "Poller::remove: epoll_ctl"))?;
        self.interest.remove(&fd);

        Ok(())
    }

    /// Blocks for up to `timeout_ms` and returns the batch of fds that
    /// became ready. Negative means block indefinitely, zero polls without
    /// blocking. An elapsed timeout yields an empty batch, not an error;
    /// OS interrupts are retried inside the wait.
    pub fn wait(&mut self, timeout_ms: i32) -> Result<Vec<PollEvent>> {
        self.epoll.wait(&mut self.events, timeout_ms).map_err(|e| {
            Error::system()
                .from_io(&e)
                .message("epoll wait failed")
                .context("epoll_wait")
                .build()
        })?;

        let batch = self
            .events
            .iter()
            .map(|ev| PollEvent {
                fd: ev.u64 as RawFd,
                ready: sys::epoll::epoll_to_ready(ev.events as libc::c_int),
            })
            .collect::<Vec<_>>();

        trace!(count = batch.len(), timeout_ms, "poller wake");
        Ok(batch)
    }
}

impl AsRawFd for Poller {
    fn as_raw_fd(&self) -> RawFd {
        self.epoll.as_raw_fd()
    }
}

fn ctl_error(e: &io::Error, context: &str) -> Error {
    Error::system()
        .from_io(e)
        .message("failed to update epoll interest list")
        .context(context)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0; 2];
        let res = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(res, 0);
        (fds[0], fds[1])
    }

    fn close(fd: RawFd) {
        unsafe {
            libc::close(fd);
        }
    }

    #[test]
    fn wait_times_out_with_empty_batch() {
        let mut poller = Poller::new().unwrap();

        let events = poller.wait(0).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn readable_pipe_reported() {
        let (rd, wr) = pipe();
        let mut poller = Poller::new().unwrap();

        poller.add(rd, Ready::readable()).unwrap();

        let n = unsafe { libc::write(wr, b"x".as_ptr() as *const _, 1) };
        assert_eq!(n, 1);

        let events = poller.wait(1000).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fd, rd);
        assert!(events[0].is_readable());

        close(rd);
        close(wr);
    }

    #[test]
    fn add_twice_degrades_to_modify() {
        let (rd, wr) = pipe();
        let mut poller = Poller::new().unwrap();

        poller.add(rd, Ready::readable()).unwrap();
        // Second add must not fail with EEXIST.
        poller.add(rd, Ready::readable()).unwrap();

        close(rd);
        close(wr);
    }

    #[test]
    fn modify_untracked_degrades_to_add() {
        let (rd, wr) = pipe();
        let mut poller = Poller::new().unwrap();

        poller.modify(rd, Ready::readable()).unwrap();
        assert!(poller.is_tracking(rd));

        close(rd);
        close(wr);
    }

    #[test]
    fn remove_untracked_is_an_error() {
        let (rd, wr) = pipe();
        let mut poller = Poller::new().unwrap();

        assert!(poller.remove(rd).is_err());

        // The failed remove must not have corrupted the interest set.
        poller.add(rd, Ready::readable()).unwrap();
        poller.remove(rd).unwrap();

        close(rd);
        close(wr);
    }
}
