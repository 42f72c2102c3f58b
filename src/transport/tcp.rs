//! TCP transport for DNS queries.
//!
//! Each accepted connection carries exactly one query: it is read within
//! the read deadline, relayed upstream, answered and closed. Connections
//! are handled in their own task so a slow client never holds up the
//! accept loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{DeadlineError, ListenError, TransactionError};
use crate::upstream::Upstream;

use super::framing::{read_framed, write_framed};
use super::{QueryLogger, Transport};

/// TCP transport for the proxy.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind a TCP listener for the transport.
    pub async fn bind(addr: &str) -> Result<Self, ListenError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ListenError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenError> {
        self.listener.local_addr().map_err(ListenError::LocalAddr)
    }

    /// Run the accept loop until the listener fails.
    ///
    /// Spawns a handler task per connection.
    pub async fn run(
        self,
        upstream: Arc<Upstream>,
        read_timeout: Duration,
    ) -> Result<(), ListenError> {
        let logger = QueryLogger::new(Transport::Tcp);

        loop {
            let (client, from) = self.listener.accept().await.map_err(ListenError::Accept)?;
            let deadline = Instant::now() + read_timeout;
            let upstream = upstream.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(client, from, &upstream, deadline, logger).await {
                    logger.abandoned(from, &e);
                }
            });
        }
    }
}

/// Handle a single TCP connection: read query, forward, return response.
async fn handle_connection(
    mut client: TcpStream,
    from: SocketAddr,
    upstream: &Upstream,
    deadline: Instant,
    logger: QueryLogger,
) -> Result<(), TransactionError> {
    let started = Instant::now();

    let query = tokio::time::timeout_at(deadline, read_framed(&mut client))
        .await
        .map_err(|_| DeadlineError(deadline - started))??;

    let response = upstream.forward(&query).await?;

    write_framed(&mut client, &response)
        .await
        .map_err(TransactionError::Reply)?;

    logger.forwarded(from, query.len(), response.len(), started.elapsed());

    if let Err(e) = client.shutdown().await {
        debug!(client = %from, error = %e, "shutdown after reply failed");
    }

    Ok(())
}
