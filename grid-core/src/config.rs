//! Layered configuration: built-in defaults, an optional TOML file, `.env`,
//! then the process environment.
//!
//! Environment keys are unprefixed (`RPC_URL`, `ENERGY_TOKEN_ADDRESS`, ...)
//! so an existing deployment `.env` works unchanged.

use crate::contracts::ContractAddresses;
use crate::sender::SendOptions;
use crate::signer::{OwnerSigner, SignerError};
use alloy::primitives::Address;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "grid.toml";

/// Hardhat's default development accounts, used as prosumers when none are
/// configured.
pub const DEFAULT_PROSUMERS: [&str; 20] = [
    "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
    "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
    "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc",
    "0x90f79bf6eb2c4f870365e785982e1f101e93b906",
    "0x15d34aaf54267db7d7c367839aaf71a00a2c6a65",
    "0x9965507d1a55bcc2695c58ba16fb37d819b0a4dc",
    "0x976ea74026e726554db657fa54763abd0c3a0aa9",
    "0x14dc79964da2c08b23698b3d3cc7ca32193d9955",
    "0x23618e81e3f5cdf7f54c3d65f7fbc0abf5b21e8f",
    "0xa0ee7a142d267c1f36714e4a8f75612f20a79720",
    "0xbcd4042de499d14e55001ccbb24a551f3b954096",
    "0x71be63f3384f5fb98995898a86b02fb2426c5788",
    "0xfabb0ac9d68b0b445fb7357272ff202c5651694a",
    "0x1cbd3b2770909d4e10f157cabc84c7264073c9ec",
    "0xdf3e18d64bc6a983f673ab319ccae4f1a57c7097",
    "0xcd3b766ccdd6ae721141f452c550ca635964ce71",
    "0x2546bcd3c84621e976d8185a91a922ae77ecec30",
    "0xbda5747bfd65f08deb54cb465eb87d40e51b197e",
    "0xdd2fd4581271e230360230f9337d5c0430bf44c0",
    "0x8626f6940e2eb28930efb4cef49b2d1f2c9c1199",
];

#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),

    #[error("Invalid address in {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid RPC URL {value}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    InvalidKey(#[from] SignerError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,

    pub energy_token_address: Option<String>,
    pub carbon_credit_token_address: Option<String>,
    pub marketplace_address: Option<String>,

    /// Hex key of the token owner; only the simulator needs it
    pub owner_private_key: Option<String>,

    /// Directory holding the contract artifacts
    pub contracts_dir: PathBuf,

    /// HTTP request timeout for RPC calls
    pub rpc_timeout_secs: u64,

    /// Pause between simulation cycles
    pub simulation_interval_secs: u64,

    /// Stop after this many cycles; run forever when unset
    pub max_cycles: Option<u64>,

    pub prosumer_addresses: Vec<String>,

    pub gas_limit: u64,
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,

    /// Status server bind address
    pub server_host: String,
    pub server_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            energy_token_address: None,
            carbon_credit_token_address: None,
            marketplace_address: None,
            owner_private_key: None,
            contracts_dir: PathBuf::from("contracts"),
            rpc_timeout_secs: 30,
            simulation_interval_secs: 5,
            max_cycles: None,
            prosumer_addresses: DEFAULT_PROSUMERS.iter().map(|a| a.to_string()).collect(),
            gas_limit: 300_000,
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 100,
            server_host: "127.0.0.1".to_string(),
            server_port: 5001,
        }
    }
}

impl Settings {
    /// Load settings. `config_path` overrides the default `grid.toml`; an
    /// explicitly given file must exist.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            if !e.not_found() {
                warn!("Failed to read .env file: {}", e);
            }
        }

        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        builder = match config_path {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false)),
        };

        builder = builder.add_source(
            Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("prosumer_addresses"),
        );

        builder.build()?.try_deserialize()
    }

    /// Checks shared by every binary.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let rpc_url = self.rpc_url.trim();
        if rpc_url.is_empty() {
            return Err(ConfigValidationError::MissingField("rpc_url"));
        }
        url::Url::parse(rpc_url).map_err(|e| ConfigValidationError::InvalidUrl {
            value: rpc_url.to_string(),
            reason: e.to_string(),
        })?;

        self.contract_addresses()?;

        if self.rpc_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "rpc_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Additional checks for the mint simulator.
    pub fn validate_for_simulation(&self) -> Result<(), ConfigValidationError> {
        self.validate()?;
        self.owner_signer()?;
        self.prosumers()?;

        if self.simulation_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "simulation_interval_secs must be > 0".to_string(),
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigValidationError::InvalidValue(
                "max_cycles must be > 0 when set".to_string(),
            ));
        }
        if self.gas_limit == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "gas_limit must be > 0".to_string(),
            ));
        }
        if self.receipt_timeout_secs == 0 || self.receipt_poll_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "receipt_timeout_secs and receipt_poll_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn contract_addresses(&self) -> Result<ContractAddresses, ConfigValidationError> {
        Ok(ContractAddresses {
            energy_token: required_address("energy_token_address", &self.energy_token_address)?,
            carbon_credit_token: required_address(
                "carbon_credit_token_address",
                &self.carbon_credit_token_address,
            )?,
            marketplace: required_address("marketplace_address", &self.marketplace_address)?,
        })
    }

    pub fn owner_signer(&self) -> Result<OwnerSigner, ConfigValidationError> {
        let key = self
            .owner_private_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigValidationError::MissingField("owner_private_key"))?;
        Ok(OwnerSigner::from_hex(key)?)
    }

    /// Prosumer addresses in configured order
    pub fn prosumers(&self) -> Result<Vec<Address>, ConfigValidationError> {
        let prosumers = self
            .prosumer_addresses
            .iter()
            .map(|raw| parse_address("prosumer_addresses", raw))
            .collect::<Result<Vec<_>, _>>()?;
        if prosumers.is_empty() {
            return Err(ConfigValidationError::MissingField("prosumer_addresses"));
        }
        Ok(prosumers)
    }

    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            gas_limit: self.gas_limit,
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
            poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_secs(self.simulation_interval_secs)
    }
}

fn required_address(
    field: &'static str,
    value: &Option<String>,
) -> Result<Address, ConfigValidationError> {
    match value.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_address(field, raw),
        _ => Err(ConfigValidationError::MissingField(field)),
    }
}

/// Parse a `0x`-prefixed 20-byte hex address. Accepts any casing; checksum
/// casing is applied when addresses are printed. `field` names the setting or
/// parameter in the error.
pub fn parse_address(field: &'static str, raw: &str) -> Result<Address, ConfigValidationError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(ConfigValidationError::InvalidAddress {
            field,
            value: raw.to_string(),
        });
    }
    Address::from_str(trimmed).map_err(|_| ConfigValidationError::InvalidAddress {
        field,
        value: raw.to_string(),
    })
}
