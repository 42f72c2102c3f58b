//! Command-line interface.
//!
//! Configuration is layered: built-in defaults, then the config file, then
//! environment variables and flags (clap resolves those two).

use std::io;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{FileConfig, LoggingConfig, ServerConfig};
use crate::error::{ConfigError, ServeError};

/// Input data was incorrect (sysexits `EX_DATAERR`).
pub const EX_DATAERR: u8 = 65;
/// Service unavailable (sysexits `EX_UNAVAILABLE`).
pub const EX_UNAVAILABLE: u8 = 69;
/// Internal software error (sysexits `EX_SOFTWARE`).
pub const EX_SOFTWARE: u8 = 70;

#[derive(Parser, Debug)]
#[command(name = "pdns", version)]
#[command(about = "pDNS is a DNS proxy that upconverts DNS to DNS over TLS")]
#[command(long_about = "pDNS is a reverse proxy that converts DNS into DNS over TLS.

It is designed for applications that do not support DNS over TLS so that
they can ensure the integrity and deliverability of their DNS responses.")]
pub struct Cli {
    /// Config file (default is /etc/pdns.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the DNS proxy
    Serve(ServeArgs),

    /// Show the application version
    Version {
        /// Show more detailed build info
        #[arg(long)]
        detail: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// The upstream resolver to send requests to (default: 8.8.8.8)
    #[arg(long, env = "PDNS_UPSTREAM_IP")]
    pub upstream_ip: Option<String>,

    /// Port of the upstream resolver (default: 853)
    #[arg(long, env = "PDNS_UPSTREAM_PORT")]
    pub upstream_port: Option<u16>,

    /// Address to accept queries on (default: 127.0.0.1)
    #[arg(long, env = "PDNS_LISTEN_IP")]
    pub listen_ip: Option<String>,

    /// Port to accept queries on (default: 53)
    #[arg(long, env = "PDNS_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// Protocol to accept queries over (default: tcp)
    #[arg(long, env = "PDNS_LISTEN_PROTOCOL")]
    pub listen_protocol: Option<String>,

    /// Log filter (trace, debug, info, warn, error or a directive list)
    #[arg(long, env = "PDNS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Build the server and logging configuration for `serve`.
pub fn load_config(
    path: Option<&Path>,
    args: &ServeArgs,
) -> Result<(ServerConfig, LoggingConfig), ConfigError> {
    let file = FileConfig::load(path)?;

    let mut config = ServerConfig::new();
    config.apply_file(&file)?;

    if let Some(ip) = &args.upstream_ip {
        config.upstream.set_ip(ip.as_str());
    }
    if let Some(port) = args.upstream_port {
        config.upstream.set_port(port);
    }
    if let Some(ip) = &args.listen_ip {
        config.listen.set_ip(ip.as_str());
    }
    if let Some(port) = args.listen_port {
        config.listen.set_port(port);
    }
    if let Some(protocol) = &args.listen_protocol {
        config.listen.set_protocol(protocol)?;
    }

    let mut logging = file.logging;
    if let Some(level) = &args.log_level {
        logging.level = Some(level.clone());
    }
    if let Some(format) = &args.log_format {
        logging.format = Some(format.clone());
    }

    Ok((config, logging))
}

/// Exit status for a failed `serve`.
pub fn exit_code(err: &ServeError) -> u8 {
    match err {
        ServeError::Config(_) => EX_DATAERR,
        _ => EX_SOFTWARE,
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

fn log_filter(level: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(level) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    }
}

/// Install the global tracing subscriber. Logs go to stderr.
///
/// An invalid level or format falls back to `info`/`pretty` and is
/// reported once the subscriber is up.
pub fn init_tracing(config: &LoggingConfig) {
    let level = config.level.as_deref().unwrap_or("info");
    let (filter, level_error) = log_filter(level);

    let format_name = config.format.as_deref().unwrap_or("pretty");
    let format = LogFormat::from_name(format_name);

    match format.unwrap_or(LogFormat::Pretty) {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }

    if let Some(e) = level_error {
        warn!(log_level = level, error = %e, "invalid log level, using info");
    }
    if format.is_none() {
        warn!(format = format_name, "unknown log format, using pretty");
    }
}

/// Resolve on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::error::ListenError;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "pdns",
            "serve",
            "--upstream-ip",
            "1.1.1.1",
            "--listen-port",
            "5353",
        ])
        .unwrap();

        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.upstream_ip.as_deref(), Some("1.1.1.1"));
        assert_eq!(args.listen_port, Some(5353));
    }

    #[test]
    fn test_version_detail_flag() {
        let cli = Cli::try_parse_from(["pdns", "version", "--detail"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Version { detail: true })));
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["pdns", "serve", "--config", "/tmp/pdns.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pdns.toml")));
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["pdns"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdns.toml");
        std::fs::write(
            &path,
            "[server.upstream]\nip = \"9.9.9.9\"\nport = 8853\n\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        let args = ServeArgs {
            upstream_ip: Some("1.1.1.1".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        let (config, logging) = load_config(Some(&path), &args).unwrap();

        assert_eq!(config.upstream.ip(), "1.1.1.1");
        assert_eq!(config.upstream.port(), 8853);
        assert_eq!(config.listen.protocol(), Protocol::Tcp);
        assert_eq!(logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_listen_protocol_flag_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let args = ServeArgs {
            listen_protocol: Some("doh".to_string()),
            ..Default::default()
        };

        let err = load_config(Some(&path), &args).unwrap_err();
        assert!(matches!(err, ConfigError::NotImplemented(Protocol::Doh)));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = load_config(Some(&path), &ServeArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[server.upstream\nip = ").unwrap();

        let err = load_config(Some(&path), &ServeArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_exit_code_for_serve_errors() {
        let config = ServeError::Config(ConfigError::InvalidServerName("not a host".into()));
        assert_eq!(exit_code(&config), EX_DATAERR);

        let unimplemented = ServeError::UnimplementedProtocol(Protocol::Dot);
        assert_eq!(exit_code(&unimplemented), EX_SOFTWARE);

        let listen = ServeError::Listen(ListenError::Bind {
            addr: "127.0.0.1:53".to_string(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        });
        assert_eq!(exit_code(&listen), EX_SOFTWARE);
    }

    #[test]
    fn test_log_format_names() {
        assert_eq!(LogFormat::from_name("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::from_name("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::from_name("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_name("xml"), None);
    }

    #[test]
    fn test_invalid_log_level_reported() {
        let (_, error) = log_filter("pdns=debug");
        assert!(error.is_none());

        let (_, error) = log_filter("pdns=loud");
        assert!(error.is_some());
    }
}
