//! Deadline-bounded TCP on a non-blocking socket.
//!
//! Every operation looks blocking to the caller but suspends only in the
//! poller: syscalls run until `WouldBlock`, then the fd is registered for
//! the missing readiness and the remaining deadline is spent in
//! [`Poller::wait`]. The fd is non-blocking for the whole lifetime of the
//! socket. Reads land directly in a [`ByteBuffer`]'s reserved tail; writes
//! drain its readable front.

use std::cmp;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};
use crate::net::endpoint::{AddressFamily, Endpoint};
use crate::poller::Poller;
use crate::ready::Ready;
use crate::sys;

/// Bytes reserved per receive syscall.
const READ_CHUNK: usize = 4096;

pub struct TcpSocket {
    fd: RawFd,
}

impl TcpSocket {
    pub fn new(family: AddressFamily) -> Result<TcpSocket> {
        let raw_family = match family {
            AddressFamily::V6 => libc::AF_INET6,
            _ => libc::AF_INET,
        };

        let fd = sys::socket::stream_socket(raw_family).map_err(|e| {
            Error::transport()
                .from_io(&e)
                .message("failed to create socket")
                .context("socket")
                .build()
        })?;

        Ok(TcpSocket { fd })
    }

    /// Connects to `endpoint`, blocking in the poller for at most `timeout`.
    ///
    /// The in-progress path registers the fd for writable readiness and
    /// interrogates `SO_ERROR` once woken; the registration is removed on
    /// every return path.
    pub fn connect(
        &mut self,
        poller: &mut Poller,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let (addr, len) = endpoint.as_raw();

        match sys::socket::connect(self.fd, addr, len) {
            Ok(()) => {
                debug!(fd = self.fd, %endpoint, "connected immediately");
                return Ok(());
            }
            Err(ref e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
            Err(e) => {
                return Err(Error::transport()
                    .from_io(&e)
                    .message("connect failed")
                    .context(endpoint.to_string())
                    .build())
            }
        }

        poller.add(self.fd, Ready::writable())?;
        let result = self.finish_connect(poller, endpoint, deadline);
        self.deregister(poller, "connect");
        result
    }

    /// Drops the fd from the poller's interest set. Cleanup only: a failure
    /// here must not mask the operation's own result, but it may leave the
    /// tracked set out of step with the kernel, so it is logged.
    fn deregister(&self, poller: &mut Poller, op: &str) {
        if let Err(err) = poller.remove(self.fd) {
            warn!(fd = self.fd, op, error = %err, "failed to deregister fd from poller");
        }
    }

    fn finish_connect(
        &mut self,
        poller: &mut Poller,
        endpoint: &Endpoint,
        deadline: Instant,
    ) -> Result<()> {
        let timeout_ms = match remaining_ms(deadline) {
            Some(ms) => ms,
            None => return Err(timeout_error("connect", endpoint)),
        };

        let events = poller.wait(timeout_ms)?;
        if events.is_empty() {
            return Err(timeout_error("connect", endpoint));
        }

        // Writable (or error) readiness: the handshake finished one way or
        // the other, SO_ERROR tells which.
        let so_error = sys::socket::take_error(self.fd).map_err(|e| {
            Error::system()
                .from_io(&e)
                .message("getsockopt SO_ERROR failed")
                .build()
        })?;

        match so_error {
            None => {
                debug!(fd = self.fd, %endpoint, "connected");
                Ok(())
            }
            Some(e) => Err(Error::transport()
                .from_io(&e)
                .message("connect failed")
                .context(endpoint.to_string())
                .build()),
        }
    }

    /// Receives into `buf` until the deadline, the peer closing, or a hard
    /// error. Returns the bytes accumulated; an elapsed deadline is an
    /// error only when nothing arrived.
    pub fn read(
        &mut self,
        poller: &mut Poller,
        buf: &mut ByteBuffer,
        timeout: Duration,
    ) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut total = 0usize;
        let mut registered = false;

        let result = loop {
            let received = sys::socket::recv(self.fd, buf.reserve_unchecked(READ_CHUNK));
            match received {
                Ok(0) => {
                    trace!(fd = self.fd, total, "peer closed");
                    if total == 0 {
                        break Err(Error::transport()
                            .peer_closed()
                            .message("peer closed the connection")
                            .build());
                    }
                    break Ok(total);
                }
                Ok(n) => {
                    buf.commit_unchecked(n);
                    total += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let timeout_ms = match remaining_ms(deadline) {
                        Some(ms) => ms,
                        None => break read_expired(total),
                    };

                    if !registered {
                        if let Err(e) = poller.add(self.fd, Ready::readable()) {
                            break Err(e);
                        }
                        registered = true;
                    }

                    match poller.wait(timeout_ms) {
                        Ok(events) if events.is_empty() => break read_expired(total),
                        Ok(_) => {}
                        Err(e) => break Err(e),
                    }
                }
                Err(e) => {
                    break Err(Error::transport()
                        .from_io(&e)
                        .message("recv failed")
                        .build())
                }
            }
        };

        if registered {
            self.deregister(poller, "read");
        }

        result
    }

    /// Sends `buf`'s readable bytes until drained or the deadline elapses.
    /// Returns the bytes written; an elapsed deadline is an error only when
    /// nothing was written.
    pub fn write(
        &mut self,
        poller: &mut Poller,
        buf: &mut ByteBuffer,
        timeout: Duration,
    ) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut total = 0usize;
        let mut registered = false;

        let result = loop {
            if buf.is_empty() {
                break Ok(total);
            }

            let sent = sys::socket::send(self.fd, buf.readable());
            match sent {
                Ok(n) => {
                    if let Err(e) = buf.consume(n) {
                        break Err(e);
                    }
                    total += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let timeout_ms = match remaining_ms(deadline) {
                        Some(ms) => ms,
                        None => break write_expired(total),
                    };

                    if !registered {
                        if let Err(e) = poller.add(self.fd, Ready::writable()) {
                            break Err(e);
                        }
                        registered = true;
                    }

                    match poller.wait(timeout_ms) {
                        Ok(events) if events.is_empty() => break write_expired(total),
                        Ok(_) => {}
                        Err(e) => break Err(e),
                    }
                }
                Err(e) => {
                    break Err(Error::transport()
                        .from_io(&e)
                        .message("send failed")
                        .build())
                }
            }
        };

        if registered {
            self.deregister(poller, "write");
        }

        result
    }

    pub fn close(&mut self) {
        if self.fd >= 0 {
            trace!(fd = self.fd, "closing socket");
            sys::socket::close(self.fd);
            self.fd = -1;
        }
    }
}

impl AsRawFd for TcpSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for TcpSocket {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_expired(total: usize) -> Result<usize> {
    if total == 0 {
        Err(Error::transport()
            .timeout()
            .message("read timed out with no data")
            .build())
    } else {
        Ok(total)
    }
}

fn write_expired(total: usize) -> Result<usize> {
    if total == 0 {
        Err(Error::transport()
            .timeout()
            .message("write timed out with no data sent")
            .build())
    } else {
        Ok(total)
    }
}

fn timeout_error(op: &str, endpoint: &Endpoint) -> Error {
    Error::transport()
        .timeout()
        .message(format!("{} timed out", op))
        .context(endpoint.to_string())
        .build()
}

/// Milliseconds left before `deadline`, rounded up to 1 while any time
/// remains; `None` once the deadline has passed.
fn remaining_ms(deadline: Instant) -> Option<i32> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return None;
    }

    Some(cmp::min(cmp::max(left.as_millis(), 1), i32::MAX as u128) as i32)
}
