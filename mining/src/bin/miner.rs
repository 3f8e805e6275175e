//! `castnet-miner`: one mining process, driven by a supervisor over
//! stdin/stdout. Logs go to stderr.

use clap::Parser;
use log::{error, info};
use mining::prelude::*;
use network::TransportConfig;

#[derive(Parser, Debug)]
#[command(name = "castnet-miner")]
#[command(about = "Mining process driven by castnet-supervisor over stdin/stdout", long_about = None)]
struct Args {
    /// Rounds spent on each algorithm before rotating
    #[arg(long, default_value_t = 1)]
    rounds_per_algo: u32,

    /// Hash attempts per round
    #[arg(long, default_value_t = 1)]
    nonce_window: u32,

    /// Abandon a job after this many seconds without a replacement
    #[arg(long, default_value_t = 360)]
    job_timeout_secs: u64,

    /// Data shards per solution message
    #[arg(long, default_value_t = 3)]
    data_shards: u8,

    /// Parity shards per solution message
    #[arg(long, default_value_t = 6)]
    parity_shards: u8,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(args.log_level.parse()?)
        .target(env_logger::Target::Stderr)
        .init();

    let config = MinerConfig {
        rounds_per_algo: args.rounds_per_algo,
        nonce_window: args.nonce_window,
        job_timeout_secs: args.job_timeout_secs,
        ..Default::default()
    };
    let transport = TransportConfig { data_shards: args.data_shards, parity_shards: args.parity_shards, ..Default::default() };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        info!("castnet miner {} starting", std::process::id());
        let service = MinerService::start(config, transport)?;
        let mut stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        if let Err(e) = service.serve(&mut stdin, &mut stdout).await {
            error!("IPC link failed: {}", e);
            return Err(e.into());
        }
        info!("castnet miner exiting");
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    // stdin reads may still be parked on the blocking pool
    runtime.shutdown_background();
    Ok(())
}
