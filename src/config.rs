//! Listen and upstream configuration.
//!
//! A [`ServerConfig`] is built once at startup from defaults, optionally
//! overlaid with a TOML file and command-line values, and then handed to the
//! [`Server`](crate::proxy::Server). It is never mutated after that.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Config file read when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pdns.toml";

pub const DEFAULT_UPSTREAM_IP: &str = "8.8.8.8";
pub const DEFAULT_UPSTREAM_PORT: u16 = 853;
pub const DEFAULT_LISTEN_IP: &str = "127.0.0.1";
pub const DEFAULT_LISTEN_PORT: u16 = 53;

/// The pipes DNS can travel over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
    /// DNS over TLS.
    Dot,
    /// DNS over HTTPS.
    Doh,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
            Protocol::Dot => "dot",
            Protocol::Doh => "doh",
        }
    }

    /// Whether a host may be configured with this protocol.
    pub fn is_implemented(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Dot)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            "dot" => Ok(Protocol::Dot),
            "doh" => Ok(Protocol::Doh),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

/// An address to bind to or to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    ip: String,
    port: u16,
    protocol: Protocol,
}

impl Host {
    /// Build a host directly. Unlike [`Host::set_protocol`] this accepts
    /// protocols that cannot be configured, such as UDP for a listener.
    pub fn new(ip: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            ip: ip.into(),
            port,
            protocol,
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Override the IP. Not validated; a bad value shows up when the
    /// address is bound or dialled.
    pub fn set_ip(&mut self, ip: impl Into<String>) {
        self.ip = ip.into();
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    /// Set the protocol, rejecting unknown and not yet implemented ones.
    pub fn set_protocol(&mut self, protocol: &str) -> Result<(), ConfigError> {
        let protocol: Protocol = protocol.parse()?;

        if !protocol.is_implemented() {
            return Err(ConfigError::NotImplemented(protocol));
        }

        self.protocol = protocol;

        Ok(())
    }

    /// `ip:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.ip.contains(':') && !self.ip.starts_with('[') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.address())
    }
}

/// The resolver to forward to and the address to accept queries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub upstream: Host,
    pub listen: Host,
}

impl ServerConfig {
    /// Defaults: forward to 8.8.8.8:853 over TLS, listen on 127.0.0.1:53/tcp.
    pub fn new() -> Self {
        Self {
            upstream: Host::new(DEFAULT_UPSTREAM_IP, DEFAULT_UPSTREAM_PORT, Protocol::Dot),
            listen: Host::new(DEFAULT_LISTEN_IP, DEFAULT_LISTEN_PORT, Protocol::Tcp),
        }
    }

    /// Overlay the values present in a config file.
    pub fn apply_file(&mut self, file: &FileConfig) -> Result<(), ConfigError> {
        file.server.upstream.apply(&mut self.upstream)?;
        file.server.listen.apply(&mut self.listen)?;

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub upstream: HostSection,
    pub listen: HostSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostSection {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
}

impl HostSection {
    fn apply(&self, host: &mut Host) -> Result<(), ConfigError> {
        if let Some(ip) = &self.ip {
            host.set_ip(ip.as_str());
        }
        if let Some(port) = self.port {
            host.set_port(port);
        }
        if let Some(protocol) = &self.protocol {
            host.set_protocol(protocol)?;
        }

        Ok(())
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `pdns=debug`.
    pub level: Option<String>,
    /// `pretty`, `compact` or `json`.
    pub format: Option<String>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicitly named file must exist. When no path is given,
    /// [`DEFAULT_CONFIG_PATH`] is read if present and defaults are used
    /// otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: PathBuf::from(path),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }
}
