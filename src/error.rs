//! Error types for the forwarder.
//!
//! Startup failures (`ConfigError`, `ListenError`) end a serve invocation.
//! Everything wrapped in `TransactionError` only ends the one client
//! transaction it happened in.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::Protocol;

/// Invalid configuration detected before any socket is opened.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("protocol {0:?} is not valid, expected one of: udp, tcp, dot, doh")]
    InvalidProtocol(String),

    #[error("protocol {0} has not yet been implemented")]
    NotImplemented(Protocol),

    #[error("upstream host {0:?} is neither an IP address nor a DNS name")]
    InvalidServerName(String),

    #[error("failed to read config file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Malformed or truncated length-prefixed message.
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("stream closed before a complete message was read")]
    Truncated,

    #[error("message of {0} bytes does not fit a 2-byte length prefix")]
    Oversized(usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure talking to the upstream resolver. Never retried.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("cannot connect to upstream resolver: {0}")]
    Connect(#[source] io::Error),

    #[error("TLS handshake with upstream resolver failed: {0}")]
    Handshake(#[source] io::Error),

    #[error("failed to write query to upstream: {0}")]
    Write(#[source] FramingError),

    #[error("unable to read upstream response: {0}")]
    Read(#[source] FramingError),
}

/// A TCP client did not deliver a complete query in time.
#[derive(Error, Debug)]
#[error("no complete query received within {0:?}")]
pub struct DeadlineError(pub Duration);

/// Anything that abandons a single client transaction.
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error(transparent)]
    Deadline(#[from] DeadlineError),

    #[error("unable to unpack incoming message: {0}")]
    Framing(#[from] FramingError),

    #[error("unable to proxy request to server: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("unable to write response to client: {0}")]
    Reply(#[source] FramingError),
}

/// Failure of a listening socket. Fatal for that listener.
#[derive(Error, Debug)]
pub enum ListenError {
    #[error("unable to start listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("error accepting connection: {0}")]
    Accept(#[source] io::Error),

    #[error("unable to read listener address: {0}")]
    LocalAddr(#[source] io::Error),
}

/// Why `Server::serve` returned.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listen(#[from] ListenError),

    #[error("cannot start server: listen protocol {0} is unimplemented")]
    UnimplementedProtocol(Protocol),
}
