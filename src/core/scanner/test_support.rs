// src/core/scanner/test_support.rs

//! TLS endpoint for tests, serving a self-signed certificate for
//! `shop.example.com`.

use native_tls::{Identity, TlsAcceptor};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) const CERT_COMMON_NAME: &str = "shop.example.com";

const CERT_PEM: &[u8] = include_bytes!("testdata/cert.pem");
const KEY_PEM: &[u8] = include_bytes!("testdata/key.pem");

/// Answers every TLS connection with `body` as a 200 response. Runs on plain
/// threads so it works under any test runtime. Returns the port and the
/// number of completed handshakes.
pub(crate) fn tls_server(body: &'static str) -> (u16, Arc<AtomicUsize>) {
    let identity = Identity::from_pkcs8(CERT_PEM, KEY_PEM).unwrap();
    let acceptor = Arc::new(TlsAcceptor::new(identity).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handshakes = Arc::new(AtomicUsize::new(0));
    let counter = handshakes.clone();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { return };
            let acceptor = acceptor.clone();
            let counter = counter.clone();
            std::thread::spawn(move || {
                let Ok(mut tls) = acceptor.accept(stream) else { return };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = tls.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = tls.write_all(response.as_bytes());
                let _ = tls.shutdown();
            });
        }
    });
    (port, handshakes)
}
