//! Upstream relay over DNS-over-TLS (RFC 7858).
//!
//! Every query gets its own TCP connection and TLS handshake. The
//! connection is dropped when [`Upstream::forward`] returns, whatever the
//! outcome.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::config::{Host, Protocol};
use crate::error::{ConfigError, UpstreamError};
use crate::transport::framing::{read_framed, write_framed};

/// Client TLS config trusting the Mozilla root set.
pub fn default_tls_config() -> Arc<rustls::ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// The resolver queries are relayed to.
#[derive(Clone)]
pub struct Upstream {
    host: String,
    port: u16,
    server_name: ServerName<'static>,
    connector: TlsConnector,
}

impl Upstream {
    /// Build a relay for `host` using the default root certificates.
    pub fn new(host: &Host) -> Result<Self, ConfigError> {
        Self::with_tls_config(host, default_tls_config())
    }

    /// Build a relay for `host` with a caller supplied TLS config.
    pub fn with_tls_config(
        host: &Host,
        tls_config: Arc<rustls::ClientConfig>,
    ) -> Result<Self, ConfigError> {
        if host.protocol() != Protocol::Dot {
            warn!(
                protocol = %host.protocol(),
                "upstream protocol ignored, upstream is always reached over TLS"
            );
        }

        let name = host.ip().trim_start_matches('[').trim_end_matches(']');
        let server_name = ServerName::try_from(name.to_string())
            .map_err(|_| ConfigError::InvalidServerName(host.ip().to_string()))?;

        Ok(Self {
            host: name.to_string(),
            port: host.port(),
            server_name,
            connector: TlsConnector::from(tls_config),
        })
    }

    /// `host:port` as dialled.
    pub fn address(&self) -> String {
        Host::new(self.host.as_str(), self.port, Protocol::Dot).address()
    }

    /// Send one query and return the payload of the upstream's answer.
    pub async fn forward(&self, query: &[u8]) -> Result<Vec<u8>, UpstreamError> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(UpstreamError::Connect)?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!(upstream = %self.address(), error = %e, "failed to set TCP_NODELAY");
        }

        let mut stream = self
            .connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(UpstreamError::Handshake)?;

        write_framed(&mut stream, query)
            .await
            .map_err(UpstreamError::Write)?;

        let response = read_framed(&mut stream)
            .await
            .map_err(UpstreamError::Read)?;

        debug!(
            upstream = %self.address(),
            query_len = query.len(),
            response_len = response.len(),
            "upstream answered"
        );

        // close_notify; the answer is already in hand.
        let _ = stream.shutdown().await;

        Ok(response)
    }
}
