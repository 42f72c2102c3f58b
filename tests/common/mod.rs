//! Shared fixtures: a mock DNS-over-TLS upstream with a self-signed cert.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rcgen::{CertifiedKey, generate_simple_self_signed};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use pdns::{Host, Protocol};

/// Build a 12-byte DNS header-only query with the given ID.
pub fn build_query(id: u16) -> Vec<u8> {
    let mut query = Vec::new();
    query.extend_from_slice(&id.to_be_bytes());
    query.extend_from_slice(&[0x01, 0x00]); // Flags: standard query, RD
    query.extend_from_slice(&[0x00, 0x00]); // Questions
    query.extend_from_slice(&[0x00, 0x00]); // Answer RRs
    query.extend_from_slice(&[0x00, 0x00]); // Authority RRs
    query.extend_from_slice(&[0x00, 0x00]); // Additional RRs
    query
}

/// A TLS server that reads one framed query per connection and writes
/// back a fixed byte sequence verbatim.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub tls_config: Arc<ClientConfig>,
    accepted: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockUpstream {
    /// Answer every query with `reply`, written as-is (include the prefix).
    pub async fn start(reply: &'static [u8]) -> Self {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();

        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert.der().clone()], key)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(server_config));

        let mut root_store = RootCertStore::empty();
        root_store.add(cert.der().clone()).unwrap();
        let tls_config = Arc::new(
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let accepted_in = accepted.clone();
        let received_in = received.clone();
        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    continue;
                };
                accepted_in.fetch_add(1, Ordering::SeqCst);

                let acceptor = acceptor.clone();
                let received = received_in.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = acceptor.accept(tcp).await else {
                        return;
                    };

                    let mut prefix = [0u8; 2];
                    if stream.read_exact(&mut prefix).await.is_err() {
                        return;
                    }
                    let mut payload = vec![0u8; u16::from_be_bytes(prefix) as usize];
                    if stream.read_exact(&mut payload).await.is_err() {
                        return;
                    }

                    let mut raw = prefix.to_vec();
                    raw.extend_from_slice(&payload);
                    received.lock().unwrap().push(raw);

                    let _ = stream.write_all(reply).await;
                    let _ = stream.flush().await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            addr,
            tls_config,
            accepted,
            received,
        }
    }

    pub fn host(&self) -> Host {
        Host::new("127.0.0.1", self.addr.port(), Protocol::Dot)
    }

    /// Number of TCP connections the upstream has accepted.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Raw framed queries received so far, prefix included.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }
}

/// A local port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
