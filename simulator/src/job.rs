//! The mint simulation loop.
//!
//! A cycle walks the prosumer list in order. Each prosumer gets one reading;
//! a surplus is minted on the energy token and then on the carbon credit
//! token, each mint waiting for its receipt before the next one is signed.
//! Failures are logged and counted and never end the cycle early.

use crate::energy::EnergyReading;
use grid_core::{
    format_token_amount, Address, ContractError, ContractHandle, ContractRegistry, SendError,
    TransactionSender, B256, U256,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("No prosumer addresses configured")]
    NoProsumers,

    #[error("Simulation task failed: {0}")]
    Task(String),
}

/// Why a single mint did not go through
#[derive(Debug, Error)]
pub enum MintError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Send(#[from] SendError),
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub prosumers: Vec<Address>,
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until stopped
    pub max_cycles: Option<u64>,
}

/// A confirmed mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintOutcome {
    pub contract: String,
    pub symbol: String,
    pub recipient: Address,
    pub amount: U256,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    pub readings: Vec<(Address, EnergyReading)>,
    pub minted: Vec<MintOutcome>,
    pub mints_failed: usize,
}

impl CycleReport {
    pub fn addresses_processed(&self) -> usize {
        self.readings.len()
    }

    pub fn mints_succeeded(&self) -> usize {
        self.minted.len()
    }

    pub fn mints_attempted(&self) -> usize {
        self.minted.len() + self.mints_failed
    }
}

pub struct SimulationJob {
    config: JobConfig,
    sender: TransactionSender,
    // energy token first, then carbon credits
    tokens: [ContractHandle; 2],
    rng: StdRng,
    cycles: u64,
}

impl SimulationJob {
    pub fn new(
        config: JobConfig,
        sender: TransactionSender,
        registry: &ContractRegistry,
    ) -> Result<Self, JobError> {
        if config.prosumers.is_empty() {
            return Err(JobError::NoProsumers);
        }

        Ok(Self {
            config,
            sender,
            tokens: [
                registry.energy_token().clone(),
                registry.carbon_credit_token().clone(),
            ],
            rng: StdRng::from_entropy(),
            cycles: 0,
        })
    }

    /// Replace the entropy-seeded generator, e.g. with a fixed seed.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Cycles completed so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// One pass over every prosumer.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..CycleReport::default()
        };
        info!("--- Running simulation cycle {} ---", self.cycles);

        for &prosumer in &self.config.prosumers {
            let reading = EnergyReading::draw(&mut self.rng);
            info!(
                "Prosumer {}... | Generated: {} kWh | Consumed: {} kWh",
                short_address(&prosumer),
                reading.generated,
                reading.consumed
            );
            report.readings.push((prosumer, reading));

            let (Some(excess), Some(amount)) = (reading.excess(), reading.mint_amount()) else {
                continue;
            };
            info!("  -> Excess energy: {} kWh. Minting tokens...", excess);

            for token in &self.tokens {
                match self.mint(token, prosumer, amount).await {
                    Ok(outcome) => report.minted.push(outcome),
                    Err(e) => {
                        error!("  -> An error occurred during minting: {}", e);
                        report.mints_failed += 1;
                    }
                }
            }
        }

        info!(
            "Cycle {} finished: {} prosumers, {} mints succeeded, {} failed",
            report.cycle,
            report.addresses_processed(),
            report.mints_succeeded(),
            report.mints_failed
        );
        report
    }

    async fn mint(
        &self,
        token: &ContractHandle,
        recipient: Address,
        amount: U256,
    ) -> Result<MintOutcome, MintError> {
        let symbol = token.symbol(self.sender.connector().as_ref()).await?;
        info!(
            "Minting {} {} for {}...",
            format_token_amount(amount),
            symbol,
            short_address(&recipient)
        );

        let calldata = token.mint_calldata(recipient, amount)?;
        let receipt = self.sender.send(token.address(), calldata).await?;
        info!("  -> Minting successful! Tx: {}", receipt.transaction_hash);
        debug!(
            "Mint included in block {:?}, gas used {}",
            receipt.block_number, receipt.gas_used
        );

        Ok(MintOutcome {
            contract: token.name().to_string(),
            symbol,
            recipient,
            amount,
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }

    fn reached_max_cycles(&self) -> bool {
        self.config
            .max_cycles
            .is_some_and(|max| self.cycles >= max)
    }

    /// Run cycles until `stop` flips to true, its sender is dropped, or
    /// `max_cycles` is reached. A cycle in progress always completes; the
    /// wait between cycles is cut short. Returns the number of cycles run.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> u64 {
        let started_at = self.cycles;

        loop {
            if *stop.borrow() || self.reached_max_cycles() {
                break;
            }

            self.run_cycle().await;

            if self.reached_max_cycles() {
                info!("Reached the configured limit of {} cycles", self.cycles);
                break;
            }
            if stopped_during_wait(&mut stop, self.config.interval).await {
                break;
            }
        }

        info!("Simulation stopped after {} cycles", self.cycles - started_at);
        self.cycles - started_at
    }

    /// Move the job onto its own task.
    pub fn spawn(mut self) -> JobHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(stop_rx).await });
        JobHandle {
            stop_tx,
            state: TaskState::Running(task),
        }
    }
}

/// Sleep for `interval` unless a stop arrives first; true means stop.
async fn stopped_during_wait(stop: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    let deadline = sleep(interval);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return false,
            changed = stop.changed() => match changed {
                Ok(()) if *stop.borrow() => return true,
                Ok(()) => continue,
                // handle dropped
                Err(_) => return true,
            },
        }
    }
}

fn short_address(address: &Address) -> String {
    let checksummed = address.to_string();
    checksummed.get(..10).unwrap_or(&checksummed).to_string()
}

/// Control for a spawned [`SimulationJob`]. Dropping the handle stops the job
/// at the next wait.
pub struct JobHandle {
    stop_tx: watch::Sender<bool>,
    state: TaskState,
}

enum TaskState {
    Running(JoinHandle<u64>),
    Finished(Result<u64, JobError>),
}

impl JobHandle {
    /// Ask the job to stop without waiting for it.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop the job and wait for the current cycle to finish.
    pub async fn stop(mut self) -> Result<u64, JobError> {
        self.request_stop();
        self.join().await
    }

    /// Wait for the job to end on its own (max cycles reached). Safe to call
    /// again, or to follow with [`JobHandle::stop`]; the first result is kept.
    pub async fn wait(&mut self) -> Result<u64, JobError> {
        self.join().await
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            TaskState::Running(task) => task.is_finished(),
            TaskState::Finished(_) => true,
        }
    }

    // The task handle is only awaited by reference so a cancelled wait (e.g.
    // losing a select! to ctrl_c) leaves it joinable.
    async fn join(&mut self) -> Result<u64, JobError> {
        let outcome = match &mut self.state {
            TaskState::Finished(outcome) => return outcome.clone(),
            TaskState::Running(task) => task.await.map_err(|e| JobError::Task(e.to_string())),
        };
        self.state = TaskState::Finished(outcome.clone());
        outcome
    }
}
