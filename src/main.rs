use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use pdns::cli::{self, Cli, Command, EX_DATAERR, EX_SOFTWARE, EX_UNAVAILABLE, ServeArgs};
use pdns::{ServeError, Server, ServerConfig, metadata};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => serve(cli.config.as_deref(), &args),
        Some(Command::Version { detail }) => {
            println!("{}", metadata::version(detail));
            ExitCode::SUCCESS
        }
        None => {
            println!("This functionality has not yet been implemented");
            ExitCode::from(EX_UNAVAILABLE)
        }
    }
}

fn serve(config_path: Option<&Path>, args: &ServeArgs) -> ExitCode {
    let (config, logging) = match cli::load_config(config_path, args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Can't read config: {e}");
            return ExitCode::from(EX_DATAERR);
        }
    };

    cli::init_tracing(&logging);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "unable to start runtime");
            return ExitCode::from(EX_SOFTWARE);
        }
    };

    match rt.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::from(cli::exit_code(&e))
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), ServeError> {
    let server = Server::new(config);

    tokio::select! {
        result = server.serve() => result?,
        _ = cli::shutdown_signal() => info!("shutdown signal received"),
    }

    Ok(())
}
