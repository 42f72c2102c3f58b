//! UDP transport for DNS queries.
//!
//! The datagram boundary is the message boundary, so queries and answers
//! pass through without framing. Every datagram is relayed from its own
//! task and answered from the listening socket.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::warn;

use crate::error::{FramingError, ListenError, TransactionError};
use crate::upstream::Upstream;

use super::{MAX_UDP_MESSAGE_SIZE, QueryLogger, Transport};

/// UDP transport for the proxy.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: &str) -> Result<Self, ListenError> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| ListenError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenError> {
        self.socket.local_addr().map_err(ListenError::LocalAddr)
    }

    /// Receive loop. Receive errors are logged and skipped, so this only
    /// returns if the task is cancelled.
    pub async fn run(self, upstream: Arc<Upstream>) -> Result<(), ListenError> {
        let logger = QueryLogger::new(Transport::Udp);
        let mut buf = [0u8; MAX_UDP_MESSAGE_SIZE];

        loop {
            let (len, src) = match self.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "failed to read packet");
                    continue;
                }
            };

            let query = buf[..len].to_vec();
            let socket = self.socket.clone();
            let upstream = upstream.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_datagram(&socket, src, &query, &upstream, logger).await {
                    logger.abandoned(src, &e);
                }
            });
        }
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    src: SocketAddr,
    query: &[u8],
    upstream: &Upstream,
    logger: QueryLogger,
) -> Result<(), TransactionError> {
    let started = Instant::now();

    let response = upstream.forward(query).await?;

    socket
        .send_to(&response, src)
        .await
        .map_err(|e| TransactionError::Reply(FramingError::Io(e)))?;

    logger.forwarded(src, query.len(), response.len(), started.elapsed());

    Ok(())
}
