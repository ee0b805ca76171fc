// GridMint Simulator
//
// Draws energy readings for a list of prosumers and mints EnergyToken and
// CarbonCreditToken for every kWh of surplus.

#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod energy;
pub mod job;

pub use energy::EnergyReading;
pub use job::{CycleReport, JobConfig, JobError, JobHandle, MintError, MintOutcome, SimulationJob};
