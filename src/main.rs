use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use loginguard::auth::{LoginGate, StaticVerifier};
use loginguard::config::{GuardConfig, LogFormat};
use loginguard::ratelimit::{spawn_sweeper, RateLimiter};
use loginguard::replay;

/// Login attempt rate limiter.
#[derive(Debug, Parser)]
#[command(name = "loginguard", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (overrides the configuration file)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Log filter directive (overrides the configuration file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective rate limit policies as YAML
    Policy,
    /// Run a script of sign-in attempts through the login gate
    Replay {
        /// Script to read; stdin when omitted or `-`
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GuardConfig::load(cli.config.as_deref())?;

    init_tracing(
        cli.log_level.as_deref().unwrap_or(&config.logging.level),
        cli.log_format.unwrap_or(config.logging.format),
    );

    info!(version = env!("CARGO_PKG_VERSION"), "Starting loginguard");
    match &cli.config {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("No configuration file, using defaults and environment"),
    }

    match cli.command {
        Command::Policy => {
            print!("{}", serde_yaml::to_string(&config.policies)?);
        }
        Command::Replay { input } => {
            run_replay(&config, input).await?;
        }
    }

    Ok(())
}

async fn run_replay(config: &GuardConfig, input: Option<PathBuf>) -> anyhow::Result<()> {
    let limiter = Arc::new(RateLimiter::new());
    let login = config.policies.login;
    info!(
        window = ?login.window(),
        max_attempts = login.max_attempts(),
        block_duration = ?login.block_duration(),
        "Login policy loaded"
    );

    let sweeper = config.sweeper.enabled.then(|| {
        spawn_sweeper(
            Arc::clone(&limiter),
            config.sweep_interval(),
            config.sweep_retention(),
        )
    });

    let verifier = StaticVerifier::new(config.replay.accounts.clone());
    let gate = LoginGate::new(Arc::clone(&limiter), login, verifier);

    let reader: Box<dyn BufRead> = match input {
        Some(path) if path.as_os_str() != "-" => Box::new(BufReader::new(File::open(path)?)),
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let result = replay::run(&gate, reader, io::stdout().lock()).await;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    let replayed = result?;
    info!(
        attempts = replayed,
        tracked_keys = limiter.tracked_keys(),
        "Replay finished"
    );
    Ok(())
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
