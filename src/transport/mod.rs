//! Client-facing transports.
//!
//! TCP clients send length-prefixed messages, UDP clients send bare
//! datagrams. Both are relayed to the upstream over TLS.

pub mod framing;
pub mod tcp;
pub mod udp;

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::TransactionError;

/// UDP messages are limited to 512 bytes (RFC 1035 section 4.2.1).
pub const MAX_UDP_MESSAGE_SIZE: usize = 512;

/// How long a TCP client has to send its query (RFC 1035 section 4.2.2).
pub const TCP_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Client transport, used to label log events.
#[derive(Debug, Clone, Copy)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

/// Logger for per-transaction events.
#[derive(Debug, Clone, Copy)]
pub struct QueryLogger {
    transport: Transport,
}

impl QueryLogger {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn forwarded(
        &self,
        from: SocketAddr,
        query_len: usize,
        response_len: usize,
        elapsed: Duration,
    ) {
        debug!(
            transport = self.transport.as_str(),
            client = %from,
            query_len,
            response_len,
            total_ms = elapsed.as_secs_f64() * 1000.0,
            "FORWARDED"
        );
    }

    /// Log a transaction that was abandoned without a response.
    pub fn abandoned(&self, from: SocketAddr, err: &TransactionError) {
        let transport = self.transport.as_str();

        match err {
            TransactionError::Deadline(_) => {
                warn!(transport, client = %from, error = %err, "connection timed out")
            }
            _ => error!(transport, client = %from, error = %err, "transaction dropped"),
        }
    }
}
