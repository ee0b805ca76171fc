//! Fixed-point token amounts.
//!
//! Both grid tokens declare 18 decimals, so one whole token (one kWh of
//! excess energy) is `10^18` base units on chain.

use alloy::primitives::utils::format_units;
use alloy::primitives::U256;

/// Decimals declared by the EnergyToken and CarbonCreditToken contracts.
pub const TOKEN_DECIMALS: u8 = 18;

/// Scale a whole-token quantity into base units.
pub fn to_token_units(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(TOKEN_DECIMALS))
}

/// Render a base-unit amount as a decimal string with trailing zeros removed,
/// e.g. `12500000000000000000` becomes `"12.5"`.
pub fn format_token_amount(amount: U256) -> String {
    match format_units(amount, TOKEN_DECIMALS) {
        Ok(formatted) => trim_fraction(&formatted),
        // Only reachable for a decimals value outside 0..=77
        Err(_) => amount.to_string(),
    }
}

fn trim_fraction(formatted: &str) -> String {
    if !formatted.contains('.') {
        return formatted.to_string();
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
