//! End-to-end tests against a live event loop.
//!
//! Each test binds a server on an ephemeral port, runs it on a background
//! thread and talks to it with blocking std clients.

use echo_reactor::client::Client;
use echo_reactor::config::Config;
use echo_reactor::protocol::wire::{STATUS_ERR, STATUS_OK};
use echo_reactor::protocol::Framing;
use echo_reactor::runtime::EventLoop;
use echo_reactor::Error;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn spawn_server(framing: Framing, max_pending_write: usize) -> SocketAddr {
    let config = Config {
        listen: "127.0.0.1:0".to_string(),
        framing,
        max_pending_write,
        ..Config::default()
    };
    let mut event_loop = EventLoop::bind(&config).unwrap();
    let addr = event_loop.local_addr();
    thread::spawn(move || event_loop.run());
    addr
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(TIMEOUT)).unwrap();
    stream
}

fn read_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).unwrap();
    buf
}

/// True once the server has closed (or reset) the connection.
fn is_closed_by_server(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    match stream.read(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => e.kind() == io::ErrorKind::ConnectionReset,
    }
}

#[test]
fn test_line_echo() {
    let addr = spawn_server(Framing::Line, 64 * 1024);
    let mut stream = connect(addr);

    stream.write_all(b"ping\n").unwrap();
    assert_eq!(read_n(&mut stream, 5), b"ping\n");
}

#[test]
fn test_line_echo_split_across_writes() {
    let addr = spawn_server(Framing::Line, 64 * 1024);
    let mut stream = connect(addr);
    stream.set_nodelay(true).unwrap();

    for piece in [&b"he"[..], b"llo wo", b"rld\nsec", b"ond\n"] {
        stream.write_all(piece).unwrap();
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(read_n(&mut stream, 19), b"hello world\nsecond\n");
}

#[test]
fn test_concurrent_clients_get_own_echo() {
    let addr = spawn_server(Framing::Line, 64 * 1024);
    let mut first = connect(addr);
    let mut second = connect(addr);

    first.write_all(b"a\n").unwrap();
    second.write_all(b"b\n").unwrap();

    assert_eq!(read_n(&mut second, 2), b"b\n");
    assert_eq!(read_n(&mut first, 2), b"a\n");

    // Nothing else is waiting on either socket
    for stream in [&mut first, &mut second] {
        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut buf = [0u8; 1];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }
}

#[test]
fn test_framed_request_never_completes_a_line() {
    let addr = spawn_server(Framing::Line, 64 * 1024);
    let mut client = Client::connect(&addr.to_string(), Some(Duration::from_millis(300))).unwrap();

    // The encoded request contains no newline, so the line server never replies
    match client.call(&["hello", "world"]) {
        Err(Error::Io(e)) => assert!(matches!(
            e.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        )),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_length_framing_round_trip() {
    let addr = spawn_server(Framing::Length, 64 * 1024);
    let mut client = Client::connect(&addr.to_string(), Some(TIMEOUT)).unwrap();

    let response = client.call(&["hello", "world"]).unwrap();
    assert_eq!(response.status, STATUS_OK);
    assert_eq!(response.body, b"hello world");

    // Same connection, next request
    let response = client.call(&["again"]).unwrap();
    assert_eq!(response.status, STATUS_OK);
    assert_eq!(response.body, b"again");

    let empty: [&str; 0] = [];
    let response = client.call(&empty).unwrap();
    assert_eq!(response.status, STATUS_ERR);
}

#[test]
fn test_length_framing_pipelined_requests() {
    let addr = spawn_server(Framing::Length, 64 * 1024);
    let mut client = Client::connect(&addr.to_string(), Some(TIMEOUT)).unwrap();

    for i in 0..20 {
        client.send_request(&[format!("req-{i}")]).unwrap();
    }
    for i in 0..20 {
        let response = client.receive_response().unwrap();
        assert_eq!(response.body_lossy(), format!("req-{i}"));
    }
}

#[test]
fn test_line_client_helpers() {
    let addr = spawn_server(Framing::Line, 64 * 1024);
    let mut client = Client::connect(&addr.to_string(), Some(TIMEOUT)).unwrap();

    client.send_line(b"hello there").unwrap();
    assert_eq!(client.receive_line().unwrap(), b"hello there\n");
}

#[test]
fn test_protocol_violation_is_isolated() {
    let addr = spawn_server(Framing::Line, 64 * 1024);
    let mut healthy = connect(addr);
    let mut offender = connect(addr);

    // Healthy connection holds a partial frame
    healthy.write_all(b"par").unwrap();

    // Longer than the read buffer with no newline
    offender.write_all(&vec![b'x'; 5000]).unwrap();
    assert!(is_closed_by_server(&mut offender));

    healthy.write_all(b"tial\n").unwrap();
    assert_eq!(read_n(&mut healthy, 8), b"partial\n");
}

#[test]
fn test_abrupt_close_is_isolated() {
    let addr = spawn_server(Framing::Length, 64 * 1024);
    let mut client = Client::connect(&addr.to_string(), Some(TIMEOUT)).unwrap();

    let mut quitter = connect(addr);
    quitter.write_all(&[10, 0, 0]).unwrap();
    drop(quitter);

    let response = client.call(&["still", "here"]).unwrap();
    assert_eq!(response.body, b"still here");
}

#[test]
fn test_oversized_length_header_closes_connection() {
    let addr = spawn_server(Framing::Length, 64 * 1024);
    let mut stream = connect(addr);

    stream.write_all(&5000u32.to_le_bytes()).unwrap();
    assert!(is_closed_by_server(&mut stream));
}

/// Send `count` lines in one go, start reading late, and expect every echo in order.
fn assert_slow_reader_in_order(max_pending_write: usize, count: usize) {
    let addr = spawn_server(Framing::Line, max_pending_write);
    let stream = connect(addr);
    let mut writer = stream.try_clone().unwrap();

    let payload: Vec<u8> = (0..count)
        .map(|i| format!("line number {i}\n"))
        .collect::<String>()
        .into_bytes();
    let expected = payload.clone();

    let sender = thread::spawn(move || {
        writer.write_all(&payload).unwrap();
    });

    // Let the server fill its queue before reading anything
    thread::sleep(Duration::from_millis(100));

    let mut reader = BufReader::new(stream);
    let mut received = Vec::with_capacity(expected.len());
    for _ in 0..count {
        let n = reader.read_until(b'\n', &mut received).unwrap();
        assert!(n > 0, "server closed early");
    }

    sender.join().unwrap();
    assert_eq!(received, expected);
}

#[test]
fn test_slow_reader_gets_everything_in_order() {
    // Tiny queue cap forces reads to pause and resume many times
    assert_slow_reader_in_order(256, 5000);
}

#[test]
fn test_bulk_input_with_default_cap() {
    // Several times the default 64 KiB cap in a single write
    assert_slow_reader_in_order(64 * 1024, 20_000);
}

#[test]
fn test_peer_half_close_still_gets_reply() {
    let addr = spawn_server(Framing::Line, 64 * 1024);
    let mut stream = connect(addr);

    stream.write_all(b"bye\n").unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let mut received = Vec::new();
    stream.read_to_end(&mut received).unwrap();
    assert_eq!(received, b"bye\n");
}
