//! pDNS - a DNS proxy that upconverts plain DNS to DNS over TLS.
//!
//! Queries arrive over TCP or UDP and are relayed, one fresh TLS connection
//! per query, to an upstream resolver. Messages are never parsed.

pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod proxy;
pub mod transport;
pub mod upstream;

pub use config::{Host, Protocol, ServerConfig};
pub use error::{ConfigError, FramingError, ServeError, UpstreamError};
pub use proxy::{Listener, Server};
