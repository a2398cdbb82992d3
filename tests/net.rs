//! Socket behavior against real loopback peers.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::{Duration, Instant};

use netprobe::{AddressFamily, ByteBuffer, Endpoint, ErrorCategory, Poller, TcpSocket};

fn bind_ephemeral() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[test]
fn connect_to_listener_succeeds() {
    let (listener, addr) = bind_ephemeral();
    let endpoint = Endpoint::from_std(&addr);

    let mut poller = Poller::new().unwrap();
    let mut sock = TcpSocket::new(AddressFamily::V4).unwrap();

    sock.connect(&mut poller, &endpoint, Duration::from_secs(1))
        .unwrap();

    let (_peer, _) = listener.accept().unwrap();
}

#[test]
fn connect_to_closed_port_is_refused() {
    let (listener, addr) = bind_ephemeral();
    drop(listener);
    let endpoint = Endpoint::from_std(&addr);

    let mut poller = Poller::new().unwrap();
    let mut sock = TcpSocket::new(AddressFamily::V4).unwrap();

    let err = sock
        .connect(&mut poller, &endpoint, Duration::from_secs(1))
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::ConnectionRefused);
}

#[test]
fn connect_to_blackhole_times_out() {
    // TEST-NET-1 is reserved and not routed; the SYN just disappears.
    let endpoint = Endpoint::from_ip_string("192.0.2.1", 81).unwrap();

    let mut poller = Poller::new().unwrap();
    let mut sock = TcpSocket::new(AddressFamily::V4).unwrap();

    let start = Instant::now();
    let err = sock
        .connect(&mut poller, &endpoint, Duration::from_millis(100))
        .unwrap_err();
    let elapsed = start.elapsed();

    // Some environments reject the route outright instead of dropping
    // packets; only a genuine black hole exercises the deadline.
    if matches!(
        err.category(),
        ErrorCategory::HostUnreachable | ErrorCategory::NetworkDown
    ) {
        return;
    }

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(500));
}

#[test]
fn write_then_read_echo() {
    let (listener, addr) = bind_ephemeral();
    let endpoint = Endpoint::from_std(&addr);

    let server = thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let mut data = [0u8; 64];
        let n = peer.read(&mut data).unwrap();
        peer.write_all(&data[..n]).unwrap();
        // Dropping the stream closes it, ending the client's read early.
    });

    let mut poller = Poller::new().unwrap();
    let mut sock = TcpSocket::new(AddressFamily::V4).unwrap();
    sock.connect(&mut poller, &endpoint, Duration::from_secs(1))
        .unwrap();

    let mut out = ByteBuffer::new();
    out.append(b"0123456789");
    let sent = sock
        .write(&mut poller, &mut out, Duration::from_secs(1))
        .unwrap();
    assert_eq!(sent, 10);
    assert!(out.is_empty());

    let mut input = ByteBuffer::new();
    let received = sock
        .read(&mut poller, &mut input, Duration::from_secs(1))
        .unwrap();
    assert_eq!(received, 10);
    assert_eq!(input.readable(), b"0123456789");

    server.join().unwrap();
}

#[test]
fn read_returns_partial_data_on_deadline() {
    let (listener, addr) = bind_ephemeral();
    let endpoint = Endpoint::from_std(&addr);

    let server = thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        peer.write_all(b"abc").unwrap();
        // Fall silent well past the client's deadline.
        thread::sleep(Duration::from_millis(600));
    });

    let mut poller = Poller::new().unwrap();
    let mut sock = TcpSocket::new(AddressFamily::V4).unwrap();
    sock.connect(&mut poller, &endpoint, Duration::from_secs(1))
        .unwrap();

    let mut input = ByteBuffer::new();
    let received = sock
        .read(&mut poller, &mut input, Duration::from_millis(150))
        .unwrap();

    // Deadline expiry with data accumulated is a success, not a timeout.
    assert_eq!(received, 3);
    assert_eq!(input.readable(), b"abc");

    server.join().unwrap();
}

#[test]
fn read_with_no_data_times_out_within_bounds() {
    let (listener, addr) = bind_ephemeral();
    let endpoint = Endpoint::from_std(&addr);

    let mut poller = Poller::new().unwrap();
    let mut sock = TcpSocket::new(AddressFamily::V4).unwrap();
    sock.connect(&mut poller, &endpoint, Duration::from_secs(1))
        .unwrap();
    let (_peer, _) = listener.accept().unwrap();

    let start = Instant::now();
    let mut input = ByteBuffer::new();
    let err = sock
        .read(&mut poller, &mut input, Duration::from_millis(100))
        .unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(400));
}

#[test]
fn read_after_peer_close_is_peer_closed() {
    let (listener, addr) = bind_ephemeral();
    let endpoint = Endpoint::from_std(&addr);

    let mut poller = Poller::new().unwrap();
    let mut sock = TcpSocket::new(AddressFamily::V4).unwrap();
    sock.connect(&mut poller, &endpoint, Duration::from_secs(1))
        .unwrap();

    let (peer, _) = listener.accept().unwrap();
    drop(peer);

    let mut input = ByteBuffer::new();
    let err = sock
        .read(&mut poller, &mut input, Duration::from_secs(1))
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::PeerClosed);
}
