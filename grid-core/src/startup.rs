//! Startup sequence shared by the simulator and the status server.
//!
//! Both binaries refuse to start unless the node answers `eth_chainId` and
//! every contract artifact loads. The connectivity check comes first so an
//! unreachable node is reported as such even when the artifacts are also
//! missing.

use crate::config::{ConfigValidationError, Settings};
use crate::contracts::{ContractError, ContractRegistry};
use crate::rpc::{ChainConnector, RpcClient, RpcError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigValidationError),

    #[error("Failed to build RPC client: {0}")]
    Client(#[source] RpcError),

    #[error("Failed to connect to the blockchain at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: RpcError,
    },

    #[error("Failed to load contracts: {0}")]
    Contracts(#[from] ContractError),
}

/// A reachable node plus the contracts bound to it
pub struct ChainContext {
    pub connector: Arc<dyn ChainConnector>,
    pub chain_id: u64,
    pub registry: ContractRegistry,
}

/// Connect to `settings.rpc_url` over HTTP and load the contracts.
pub async fn connect(settings: &Settings) -> Result<ChainContext, StartupError> {
    let client = RpcClient::new(settings.rpc_url.clone(), settings.rpc_timeout())
        .map_err(StartupError::Client)?;
    connect_with(settings, Arc::new(client)).await
}

/// [`connect`] over an existing connector.
pub async fn connect_with(
    settings: &Settings,
    connector: Arc<dyn ChainConnector>,
) -> Result<ChainContext, StartupError> {
    let addresses = settings.contract_addresses()?;

    info!("Connecting to blockchain at {}...", settings.rpc_url);
    let chain_id = connector
        .chain_id()
        .await
        .map_err(|source| StartupError::Unreachable {
            url: settings.rpc_url.clone(),
            source,
        })?;
    info!("Successfully connected to the blockchain (chain id {})", chain_id);

    let registry = ContractRegistry::load(&settings.contracts_dir, &addresses)?;

    Ok(ChainContext {
        connector,
        chain_id,
        registry,
    })
}
