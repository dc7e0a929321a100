//! TLS backend against a local OpenSSL listener
#![cfg(feature = "tls")]

mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509NameBuilder, X509};
use tempfile::NamedTempFile;

use common::{wait_until, Recorder};
use vtty::{Callbacks, ConfigPatch, Geometry, InterfaceState, VttyError};

fn self_signed() -> (PKey<Private>, X509) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "127.0.0.1").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    let san = SubjectAlternativeName::new()
        .ip("127.0.0.1")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

fn acceptor(key: &PKey<Private>, cert: &X509) -> Arc<SslAcceptor> {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    builder.set_private_key(key).unwrap();
    builder.set_certificate(cert).unwrap();
    builder.check_private_key().unwrap();
    Arc::new(builder.build())
}

#[test]
fn secure_session_round_trip() {
    let (key, cert) = self_signed();
    let acceptor = acceptor(&key, &cert);
    let mut ca_file = NamedTempFile::new().unwrap();
    ca_file.write_all(&cert.to_pem().unwrap()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (sock, _) = listener.accept().unwrap();
        let mut tls = acceptor.accept(sock).unwrap();
        tls.write_all(b"secure hello\n").unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while !received.ends_with(b"ping\r\n") {
            let n = tls.read(&mut buf).unwrap();
            assert!(n > 0, "client hung up early");
            received.extend_from_slice(&buf[..n]);
        }
        tls.write_all(b"bye\r\n").unwrap();
        let _ = tls.shutdown();
        received
    });

    let uri = format!(
        "ssl://127.0.0.1:{}?auto_shutdown=0&ca_file={}",
        port,
        ca_file.path().display()
    );
    let iface = vtty::create(&uri, &ConfigPatch::default(), Callbacks::new()).unwrap();
    assert!(iface.config().convert_eol);
    let screen = Arc::new(Recorder::default());
    let client = iface.attach_client(screen.clone(), Geometry::new(24, 80)).unwrap();
    iface.start().unwrap();

    wait_until("greeting", || screen.text().contains("secure hello\r\n"));
    client.send(b"ping\r").unwrap();
    assert_eq!(server.join().unwrap(), b"ping\r\n");

    wait_until("peer close", || iface.state() == InterfaceState::Shutdown);
    assert!(screen.text().contains("bye"));
}

#[test]
fn untrusted_certificate_fails_start() {
    let (key, cert) = self_signed();
    let acceptor = acceptor(&key, &cert);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (sock, _) = listener.accept().unwrap();
        acceptor.accept(sock).is_ok()
    });

    let uri = format!("ssl://127.0.0.1:{}", port);
    let iface = vtty::create(&uri, &ConfigPatch::default(), Callbacks::new()).unwrap();
    assert!(matches!(iface.start(), Err(VttyError::Backend(_))));
    assert_eq!(iface.state(), InterfaceState::Initialized);
    assert!(!server.join().unwrap());
}
