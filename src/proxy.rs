//! DNS proxy orchestration.
//!
//! Picks the client transport from the listen protocol, binds it and runs
//! it against the upstream relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{Protocol, ServerConfig};
use crate::error::{ListenError, ServeError};
use crate::transport::TCP_READ_TIMEOUT;
use crate::transport::{tcp::TcpTransport, udp::UdpTransport};
use crate::upstream::{Upstream, default_tls_config};

/// The forwarder. Owns its configuration for its whole lifetime.
pub struct Server {
    config: Arc<ServerConfig>,
    tls_config: Option<Arc<rustls::ClientConfig>>,
    tcp_read_timeout: Duration,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            tls_config: None,
            tcp_read_timeout: TCP_READ_TIMEOUT,
        }
    }

    /// Use this TLS config for upstream connections instead of the
    /// Mozilla root set.
    pub fn with_tls_config(mut self, tls_config: Arc<rustls::ClientConfig>) -> Self {
        self.tls_config = Some(tls_config);
        self
    }

    /// Override how long TCP clients have to deliver their query.
    pub fn with_tcp_read_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_read_timeout = timeout;
        self
    }

    /// Bind the listener selected by the listen protocol.
    pub async fn bind(&self) -> Result<Listener, ServeError> {
        let protocol = self.config.listen.protocol();
        if !matches!(protocol, Protocol::Tcp | Protocol::Udp) {
            return Err(ServeError::UnimplementedProtocol(protocol));
        }

        let tls_config = self.tls_config.clone().unwrap_or_else(default_tls_config);
        let upstream = Arc::new(Upstream::with_tls_config(&self.config.upstream, tls_config)?);
        let addr = self.config.listen.address();

        let transport = match protocol {
            Protocol::Udp => ListenerTransport::Udp(UdpTransport::bind(&addr).await?),
            _ => ListenerTransport::Tcp(TcpTransport::bind(&addr).await?),
        };

        Ok(Listener {
            transport,
            upstream,
            tcp_read_timeout: self.tcp_read_timeout,
        })
    }

    /// Bind and serve until the listener fails.
    pub async fn serve(&self) -> Result<(), ServeError> {
        let listener = self.bind().await?;

        info!(
            listen = %self.config.listen,
            upstream = %self.config.upstream,
            "DNS proxy listening"
        );

        listener.run().await
    }
}

enum ListenerTransport {
    Tcp(TcpTransport),
    Udp(UdpTransport),
}

/// A bound listener, ready to run.
pub struct Listener {
    transport: ListenerTransport,
    upstream: Arc<Upstream>,
    tcp_read_timeout: Duration,
}

impl Listener {
    pub fn local_addr(&self) -> Result<SocketAddr, ListenError> {
        match &self.transport {
            ListenerTransport::Tcp(t) => t.local_addr(),
            ListenerTransport::Udp(t) => t.local_addr(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self.transport {
            ListenerTransport::Tcp(_) => Protocol::Tcp,
            ListenerTransport::Udp(_) => Protocol::Udp,
        }
    }

    /// Run the accept or receive loop.
    pub async fn run(self) -> Result<(), ServeError> {
        match self.transport {
            ListenerTransport::Tcp(t) => t.run(self.upstream, self.tcp_read_timeout).await?,
            ListenerTransport::Udp(t) => t.run(self.upstream).await?,
        }

        Ok(())
    }
}
