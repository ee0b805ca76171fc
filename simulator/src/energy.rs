//! Simulated meter readings for one prosumer.

use grid_core::{to_token_units, U256};
use rand::Rng;
use std::ops::RangeInclusive;

/// kWh produced per cycle
pub const GENERATED_KWH: RangeInclusive<u64> = 5..=20;

/// kWh consumed per cycle
pub const CONSUMED_KWH: RangeInclusive<u64> = 2..=10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyReading {
    pub generated: u64,
    pub consumed: u64,
}

impl EnergyReading {
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            generated: rng.gen_range(GENERATED_KWH),
            consumed: rng.gen_range(CONSUMED_KWH),
        }
    }

    /// Surplus energy, if the prosumer produced more than it used.
    pub fn excess(&self) -> Option<u64> {
        if self.generated > self.consumed {
            Some(self.generated - self.consumed)
        } else {
            None
        }
    }

    /// Tokens owed for the surplus, one whole token per kWh.
    pub fn mint_amount(&self) -> Option<U256> {
        self.excess().map(to_token_units)
    }
}
