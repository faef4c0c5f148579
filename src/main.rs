use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::EnvFilter;

use nextlevel::{gateway, Config};

/// Three-phase LLM orchestrator with coherence reporting.
#[derive(Debug, Parser)]
#[command(name = "nextlevel", version, about)]
struct Cli {
    /// Path to a TOML config file (environment variables still override it)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP gateway (default)
    Serve {
        /// Listen host, overrides config and HOST
        #[arg(long)]
        host: Option<String>,
        /// Listen port, overrides config and PORT
        #[arg(long, short)]
        port: Option<u16>,
    },
    /// Print the effective configuration with secrets masked
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_timer(ChronoUtc::rfc_3339())
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            config.validate()?;
            gateway::run_gateway(config).await
        }
        Command::Config => {
            print!("{}", config.to_redacted_toml()?);
            if let Err(e) = config.validate() {
                eprintln!("warning: {e}");
            }
            Ok(())
        }
    }
}
