//! The event record every component communicates with.

use std::fmt;
use std::os::unix::io::RawFd;
use std::time::SystemTime;

use strum::AsRefStr;

use crate::error::Error;

pub type SessionId = u64;

/// Closed vocabulary of probe events. The serialized names are stable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // DNS
    DnsResolveStart,
    DnsResolveDone,
    // TCP
    TcpConnectStart,
    TcpConnectSuccess,
    TcpConnectTimeout,
    // TLS (reserved for a future security layer)
    TlsHandshakeStart,
    TlsHandshakeDone,
    // HTTP
    HttpRequestBuild,
    HttpSent,
    HttpReceived,
    HttpHeadersReceived,
    HttpBodyDone,
    // Lifecycle
    ConnectionIdle,
    ConnectionClosed,
}

/// An immutable record of something that happened, stamped with wall time
/// and optionally bound to an fd and a session.
///
/// [`Event::info`] and [`Event::failure`] are the only constructors; the
/// consuming decorators ([`fd`](Event::fd), [`session`](Event::session),
/// [`payload`](Event::payload)) refine a record while it is being built.
#[derive(Clone, Debug)]
pub struct Event {
    pub kind: EventType,
    pub ts: SystemTime,
    pub fd: RawFd,
    pub session_id: SessionId,
    pub message: String,
    pub error: Option<Error>,
    pub payload: Option<Vec<u8>>,
}

impl Event {
    pub fn info(kind: EventType, message: impl Into<String>) -> Event {
        Event {
            kind,
            ts: SystemTime::now(),
            fd: -1,
            session_id: 0,
            message: message.into(),
            error: None,
            payload: None,
        }
    }

    pub fn failure(kind: EventType, error: Error) -> Event {
        Event {
            kind,
            ts: SystemTime::now(),
            fd: -1,
            session_id: 0,
            message: error.message().to_owned(),
            error: Some(error),
            payload: None,
        }
    }

    pub fn fd(mut self, fd: RawFd) -> Event {
        self.fd = fd;
        self
    }

    pub fn session(mut self, session_id: SessionId) -> Event {
        self.session_id = session_id;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Event {
        self.payload = Some(payload);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn has_fd(&self) -> bool {
        self.fd >= 0
    }
}

impl fmt::Display for Event {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "[{}]", self.kind.as_ref())?;

        match &self.error {
            Some(err) => write!(fmt, " {}", err)?,
            None => write!(fmt, " {}", self.message)?,
        }

        if self.has_fd() {
            write!(fmt, " fd={}", self.fd)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn info_is_ok_and_unbound() {
        let e = Event::info(EventType::DnsResolveStart, "resolving");

        assert!(e.is_ok());
        assert_eq!(e.fd, -1);
        assert_eq!(e.session_id, 0);
        assert!(!e.has_fd());
    }

    #[test]
    fn failure_carries_the_error() {
        let e = Event::failure(
            EventType::TcpConnectStart,
            Error::transport().timeout().message("connect timed out").build(),
        );

        assert!(e.is_error());
        assert_eq!(e.message, "connect timed out");
    }

    #[test]
    fn decorators_bind_fd_and_session() {
        let e = Event::info(EventType::HttpSent, "sent").fd(7).session(3);

        assert_eq!(e.fd, 7);
        assert_eq!(e.session_id, 3);
        assert!(e.has_fd());
    }

    #[test]
    fn stable_names() {
        assert_eq!(EventType::DnsResolveStart.as_ref(), "DNS_RESOLVE_START");
        assert_eq!(EventType::HttpHeadersReceived.as_ref(), "HTTP_HEADERS_RECEIVED");
        assert_eq!(EventType::ConnectionClosed.as_ref(), "CONNECTION_CLOSED");
    }
}
