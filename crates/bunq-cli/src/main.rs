/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Created, resumed or ended bunq sessions
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bunq_cli::{CliConfig, commands};

#[derive(Parser, Debug)]
#[command(name = "bunq-cli", version, about = "bunq API session and account tool")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    /// Overrides `context_file` from the configuration
    #[arg(long = "context", value_name = "PATH")]
    context_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Validate configuration and exit
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install a new identity, register the device and open a session
    Init,
    /// Resume the saved context and show the session user
    Session {
        /// Open a new session even if the saved one looks valid
        #[arg(long)]
        renew: bool,
    },
    /// List bank accounts
    Accounts {
        #[arg(long)]
        count: Option<u32>,
        #[arg(long = "older-than", value_name = "ID")]
        older_than: Option<u64>,
    },
    /// End the remote session, keeping the installation
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = CliConfig::from_file(&args.config_path).context("load config")?;
    let context_path = config.context_path(args.context_path.as_deref())?;
    info!(
        config_path = %args.config_path.display(),
        context_path = %context_path.display(),
        api_url = config.api_url(),
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    match args.command {
        Command::Init => commands::run_init(&config, &context_path, &shutdown).await,
        Command::Session { renew } => commands::run_session(&context_path, renew, &shutdown).await,
        Command::Accounts { count, older_than } => {
            commands::run_accounts(&context_path, count, older_than, &shutdown).await
        }
        Command::Logout => commands::run_logout(&context_path, &shutdown).await,
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
