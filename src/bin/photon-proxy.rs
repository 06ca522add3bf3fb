//! PhotonDB Proxy command-line interface
//!
//! Inspect the resolved proxy configuration, or replay a script of model
//! operations against the in-memory store.
//!
//! # Examples
//!
//! ```bash
//! # Show configuration after file and environment overrides
//! photon-proxy --config proxy.toml config
//!
//! # Replay a script and print the results
//! photon-proxy replay --script users.json --metrics
//! ```

use clap::{Args, Parser, Subcommand};
use photondb_proxy::config::ProxyConfig;
use photondb_proxy::metrics::{export_metrics, init_metrics};
use photondb_proxy::replay::{replay, Script};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// PhotonDB Proxy - model CRUD operations over a document store
#[derive(Parser, Debug)]
#[command(name = "photon-proxy")]
#[command(version = photondb_proxy::VERSION)]
#[command(about = "PhotonDB Proxy - model CRUD operations over a document store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "PHOTON_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "PHOTON_PROXY_LOG_DIR")]
    log_dir: PathBuf,

    /// Log filter, a level or directives such as `photondb_proxy=debug`
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved configuration
    Config,

    /// Run a JSON script of operations against the in-memory store
    Replay(ReplayArgs),

    /// Show version
    Version,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Script file
    #[arg(short, long)]
    script: PathBuf,

    /// Override the per-command timeout (milliseconds)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = setup_logging(&cli)?;

    let config = ProxyConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => config_command(&config),
        Commands::Replay(args) => replay_command(config, args).await,
        Commands::Version => {
            println!("PhotonDB Proxy {}", photondb_proxy::VERSION);
            Ok(())
        }
    }
}

/// Console logs on stderr (stdout carries command output) and JSON lines in
/// a daily log file. The returned guard flushes the file writer on drop.
fn setup_logging(cli: &Cli) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&cli.log_dir)?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(rolling::daily(&cli.log_dir, "photon-proxy.log"));

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(!cli.no_color).compact())
        .with(fmt::layer().json().with_writer(file_writer))
        .init();

    Ok(guard)
}

fn config_command(config: &ProxyConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    println!("connection: {}", config.connection_string());
    Ok(())
}

async fn replay_command(mut config: ProxyConfig, args: ReplayArgs) -> anyhow::Result<()> {
    init_metrics();

    if let Some(ms) = args.timeout_ms {
        config = config.with_command_timeout(Duration::from_millis(ms));
    }

    let script = Script::from_path(&args.script)?;
    info!(
        script = %args.script.display(),
        model = %script.model.name,
        steps = script.operations.len(),
        "replaying script"
    );

    let reports = replay(script, config).await?;
    println!("{}", serde_json::to_string_pretty(&reports)?);

    if args.metrics {
        print!("{}", export_metrics());
    }
    Ok(())
}
