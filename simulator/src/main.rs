// GridMint mint simulator
// Connects to the chain, loads the token contracts and mints for simulated
// energy surplus until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use grid_core::{Settings, TransactionSender};
use grid_simulator::{JobConfig, SimulationJob};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "grid-simulator")]
#[command(about = "Simulate prosumer energy surplus and mint tokens for it", long_about = None)]
struct Args {
    /// Configuration file (defaults to grid.toml in the working directory)
    #[arg(short, long, env = "GRID_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Seconds to wait between cycles
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(cycles) = args.cycles {
        settings.max_cycles = Some(cycles);
    }
    if let Some(interval) = args.interval {
        settings.simulation_interval_secs = interval;
    }
    settings
        .validate_for_simulation()
        .context("Invalid simulator configuration")?;

    let chain = grid_core::connect(&settings)
        .await
        .context("Simulator startup failed")?;

    let signer = settings.owner_signer()?;
    info!("Minting from owner account {}", signer.address());
    let sender = TransactionSender::new(chain.connector, signer, chain.chain_id, settings.send_options());

    let config = JobConfig {
        prosumers: settings.prosumers()?,
        interval: settings.simulation_interval(),
        max_cycles: settings.max_cycles,
    };
    info!(
        "Simulating {} prosumers every {} seconds",
        config.prosumers.len(),
        settings.simulation_interval_secs
    );

    let job = SimulationJob::new(config, sender, &chain.registry)?;
    let mut handle = job.spawn();

    let cycles = tokio::select! {
        result = handle.wait() => result.context("Simulation task failed")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, finishing the current cycle");
            handle.stop().await.context("Simulation task failed")?
        }
    };

    info!("Simulator exiting after {} cycles", cycles);
    Ok(())
}
