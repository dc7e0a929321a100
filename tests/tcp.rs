//! TCP backend against a local listener

mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use common::{wait_until, Recorder};
use vtty::{Callbacks, ConfigPatch, Geometry, InterfaceState, VttyError};

#[test]
fn session_round_trip_and_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        sock.write_all(b"welcome\nbanner\r\n").unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while !received.ends_with(b"ping\r\n") {
            let n = sock.read(&mut buf).unwrap();
            assert!(n > 0, "client hung up early");
            received.extend_from_slice(&buf[..n]);
        }
        sock.write_all(b"pong\r\n").unwrap();
        received
    });

    let uri = format!("tcp://127.0.0.1:{}?auto_shutdown=0", port);
    let iface = vtty::create(&uri, &ConfigPatch::default(), Callbacks::new()).unwrap();
    // Attached before the reader starts, so the banner arrives live
    let screen = Arc::new(Recorder::default());
    let client = iface.attach_client(screen.clone(), Geometry::new(24, 80)).unwrap();
    iface.start().unwrap();
    wait_until("banner", || screen.text().contains("banner\r\n"));
    // Bare newlines from the peer are converted by default
    assert!(screen.text().contains("welcome\r\nbanner\r\n"));
    assert_eq!(iface.line_text(1), "banner");

    client.send(b"ping\r").unwrap();
    let received = server.join().unwrap();
    assert_eq!(received, b"ping\r\n");

    // Server is gone: the reader sees EOF and shuts the interface down
    wait_until("peer close", || iface.state() == InterfaceState::Shutdown);
    assert!(screen.text().contains("ping\r\n"));
    assert!(screen.text().contains("pong"));
    assert!(matches!(client.send(b"late"), Err(VttyError::AlreadyShutdown)));
}

#[test]
fn local_echo_can_be_disabled() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let mut buf = [0u8; 16];
        let n = sock.read(&mut buf).unwrap();
        buf[..n].to_vec()
    });

    let uri = format!("tcp://127.0.0.1:{}?local_echo=0", port);
    let iface = vtty::create(&uri, &ConfigPatch::default(), Callbacks::new()).unwrap();
    iface.start().unwrap();
    let screen = Arc::new(Recorder::default());
    let client = iface.attach_client(screen.clone(), Geometry::new(24, 80)).unwrap();

    client.send(b"secret").unwrap();
    assert_eq!(server.join().unwrap(), b"secret");
    assert!(!screen.text().contains("secret"));

    client.detach();
    assert!(iface.is_shutdown());
}

#[test]
fn refused_connection_leaves_interface_initialized() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("tcp://127.0.0.1:{}", port);
    let iface = vtty::create(&uri, &ConfigPatch::default(), Callbacks::new()).unwrap();

    assert!(matches!(iface.start(), Err(VttyError::Backend(_))));
    assert_eq!(iface.state(), InterfaceState::Initialized);
}

#[test]
fn tcp_defaults_to_eol_conversion() {
    let iface = vtty::create("tcp://127.0.0.1:9", &ConfigPatch::default(), Callbacks::new()).unwrap();
    assert!(iface.config().convert_eol);

    let iface = vtty::create("tcp://127.0.0.1:9?convertEol=0", &ConfigPatch::default(), Callbacks::new()).unwrap();
    assert!(!iface.config().convert_eol);
}

#[test]
fn tcp_uri_needs_host_and_port() {
    for uri in ["tcp://", "tcp://localhost"] {
        assert!(matches!(
            vtty::create(uri, &ConfigPatch::default(), Callbacks::new()),
            Err(VttyError::MalformedUri { .. })
        ));
    }
}
