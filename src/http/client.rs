//! Event-emitting HTTP GET over the non-blocking TCP engine.
//!
//! Every phase of the request reports itself to the orchestrator, so an
//! observer can watch resolution, connection, transfer and shutdown as
//! they happen. Failure events carry the structured error that is also
//! returned to the caller.

use std::os::unix::io::AsRawFd;

use tracing::debug;

use crate::buffer::ByteBuffer;
use crate::core::event::{Event, EventType, SessionId};
use crate::core::orchestrator::Orchestrator;
use crate::error::{Error, ErrorCategory, Result};
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::net::endpoint::AddressFamily;
use crate::net::resolver::{Resolver, SystemResolver};
use crate::net::tcp::TcpSocket;
use crate::poller::Poller;

pub struct HttpClient<'a> {
    orch: &'a Orchestrator,
    session: SessionId,
}

impl<'a> HttpClient<'a> {
    pub fn new(orch: &'a Orchestrator, session: SessionId) -> HttpClient<'a> {
        HttpClient { orch, session }
    }

    fn emit(&self, e: Event) {
        let _ = self.orch.emit(e.session(self.session));
    }

    /// Performs one GET request, emitting the full event sequence along
    /// the way.
    pub fn get(&mut self, req: &HttpRequest) -> Result<HttpResponse> {
        let mut poller = Poller::new()?;
        let endpoint = self.resolve(req)?;

        let mut sock = TcpSocket::new(endpoint.family())?;
        let fd = sock.as_raw_fd();
        self.connect(&mut sock, &mut poller, &endpoint, req)?;

        self.emit(
            Event::info(
                EventType::HttpRequestBuild,
                format!("{} {}", req.method, req.target),
            )
            .fd(fd),
        );

        let mut out = ByteBuffer::new();
        out.append(&req.serialize());

        match sock.write(&mut poller, &mut out, req.timeout) {
            Ok(sent) => {
                self.emit(Event::info(EventType::HttpSent, format!("request sent ({} bytes)", sent)).fd(fd));
            }
            Err(err) => {
                self.emit(Event::failure(EventType::HttpSent, err.clone()).fd(fd));
                return Err(err);
            }
        }

        let response = self.receive(&mut sock, &mut poller, req)?;

        sock.close();
        self.emit(Event::info(EventType::ConnectionClosed, "connection closed").fd(fd));

        Ok(response)
    }

    fn resolve(&self, req: &HttpRequest) -> Result<crate::net::endpoint::Endpoint> {
        self.emit(Event::info(
            EventType::DnsResolveStart,
            format!("resolving {}", req.host),
        ));

        match SystemResolver.resolve(&req.host, req.port, AddressFamily::Any) {
            Ok(endpoints) => {
                self.emit(Event::info(
                    EventType::DnsResolveDone,
                    format!("resolved {} ({} addresses)", req.host, endpoints.len()),
                ));
                Ok(endpoints[0])
            }
            Err(err) => {
                self.emit(Event::failure(EventType::DnsResolveDone, err.clone()));
                Err(err)
            }
        }
    }

    fn connect(
        &self,
        sock: &mut TcpSocket,
        poller: &mut Poller,
        endpoint: &crate::net::endpoint::Endpoint,
        req: &HttpRequest,
    ) -> Result<()> {
        let fd = sock.as_raw_fd();
        self.emit(Event::info(EventType::TcpConnectStart, format!("connecting to {}", endpoint)).fd(fd));

        match sock.connect(poller, endpoint, req.timeout) {
            Ok(()) => {
                self.emit(Event::info(EventType::TcpConnectSuccess, "connection established").fd(fd));
                Ok(())
            }
            Err(err) if err.category() == ErrorCategory::Timeout => {
                self.emit(Event::failure(EventType::TcpConnectTimeout, err.clone()).fd(fd));
                Err(err)
            }
            Err(err) => {
                self.emit(Event::failure(EventType::TcpConnectStart, err.clone()).fd(fd));
                Err(err)
            }
        }
    }

    fn receive(
        &self,
        sock: &mut TcpSocket,
        poller: &mut Poller,
        req: &HttpRequest,
    ) -> Result<HttpResponse> {
        let fd = sock.as_raw_fd();
        let mut buf = ByteBuffer::new();
        let mut response: Option<HttpResponse> = None;
        let mut header_len = 0usize;
        let mut peer_closed: Option<Error> = None;

        loop {
            match sock.read(poller, &mut buf, req.timeout) {
                Ok(n) => {
                    self.emit(Event::info(EventType::HttpReceived, format!("received {} bytes", n)).fd(fd));
                }
                Err(err) if err.category() == ErrorCategory::PeerClosed => {
                    peer_closed = Some(err);
                }
                Err(err) => {
                    self.emit(Event::failure(EventType::HttpReceived, err.clone()).fd(fd));
                    return Err(err);
                }
            }

            if response.is_none() {
                if let Some(end) = HttpResponse::find_header_end(buf.readable()) {
                    let head = HttpResponse::parse_head(&buf.readable()[..end])?;
                    self.emit(
                        Event::info(
                            EventType::HttpHeadersReceived,
                            format!("{} {}", head.status, head.reason),
                        )
                        .fd(fd),
                    );
                    header_len = end;
                    response = Some(head);
                }
            }

            if let Some(head) = &response {
                let body_len = buf.len() - header_len;
                let done = match head.content_length() {
                    Some(want) => body_len >= want,
                    None => peer_closed.is_some(),
                };
                if done {
                    break;
                }
            }

            if let Some(err) = peer_closed.take() {
                // The peer hung up before the head (or the promised body)
                // arrived. The close surfaces unchanged so callers can
                // decide whether it ends the exchange.
                self.emit(Event::failure(EventType::HttpReceived, err.clone()).fd(fd));
                return Err(err);
            }
        }

        let mut head = response.unwrap_or_default();
        let body_end = match head.content_length() {
            Some(want) => header_len + want.min(buf.len() - header_len),
            None => buf.len(),
        };
        head.body = buf.readable()[header_len..body_end].to_vec();

        debug!(
            status = head.status,
            body = head.body.len(),
            "response complete"
        );
        self.emit(
            Event::info(
                EventType::HttpBodyDone,
                format!("body complete ({} bytes)", head.body.len()),
            )
            .fd(fd),
        );

        Ok(head)
    }
}
