//! `castnet-supervisor`: spawns the mining processes on this host and keeps
//! them on the work of one controller.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use mining::prelude::*;
use network::{Connection, ShardCodec};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "castnet-supervisor")]
#[command(about = "Follows a castnet controller and drives local mining processes", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "supervisor.toml")]
    config: PathBuf,

    /// Shared passphrase (overrides the config file)
    #[arg(short, long)]
    passphrase: Option<String>,

    /// Number of mining processes (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Path of the castnet-miner executable
    #[arg(long)]
    miner_path: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match SupervisorConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", args.config.display(), e);
            process::exit(1);
        }
    };
    if let Some(passphrase) = args.passphrase {
        config.transport.passphrase = passphrase;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.miner_path.is_some() {
        config.miner_path = args.miner_path;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(config, &args.log_level).await {
        error!("Supervisor error: {}", e);
        process::exit(1);
    }
    info!("castnet supervisor stopped");
}

async fn run(config: SupervisorConfig, log_level: &str) -> Result<(), MiningError> {
    let program = match &config.miner_path {
        Some(path) => path.clone(),
        None => std::env::current_exe()?.with_file_name("castnet-miner"),
    };

    let mut children = Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        children.push(ChildMiner::spawn(
            id,
            &program,
            &config.miner,
            config.transport.data_shards,
            config.transport.parity_shards,
            log_level,
        )?);
    }
    info!("spawned {} miners from {}", children.len(), program.display());

    let codec = Arc::new(ShardCodec::from_config(&config.transport)?);
    let connection = Connection::bind(config.transport.multicast_addr, Vec::new(), codec).await?;
    info!("listening for controllers on {}", config.transport.multicast_addr);

    let supervisor = Arc::new(Supervisor::new(children, config.staleness(), config.ack_timeout()));
    supervisor.start(&config.transport.passphrase).await;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping miners");
        }
        on_signal.cancel();
    });

    supervisor.run(&connection, config.watchdog_interval(), config.stop_grace(), cancel).await;
    Ok(())
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt().with_env_filter(filter).with_target(true).with_thread_ids(true).with_writer(std::io::stderr).init();
}
