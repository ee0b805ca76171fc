// GridMint Core Library
//
// Chain connector, transaction signing and contract bindings shared by the
// mint simulator and the backend status server.

// Enforce panic-free code in production
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), warn(clippy::panic))]
// Test-specific allows
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod amount;
pub mod config;
pub mod contracts;
pub mod marketplace;
pub mod rpc;
pub mod sender;
pub mod signer;
pub mod startup;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use amount::{format_token_amount, to_token_units, TOKEN_DECIMALS};
pub use config::{parse_address, ConfigValidationError, Settings};
pub use contracts::{ContractAddresses, ContractError, ContractHandle, ContractRegistry};
pub use marketplace::Sale;
pub use rpc::{ChainConnector, RpcClient, RpcError, TransactionReceipt};
pub use sender::{SendError, SendOptions, TransactionSender};
pub use signer::{OwnerSigner, SignedTransaction, SignerError, TransactionIntent};
pub use startup::{connect, connect_with, ChainContext, StartupError};

// Re-exported so downstream crates build call arguments against the same types.
pub use alloy::dyn_abi::DynSolValue;
pub use alloy::primitives::{Address, Bytes, B256, U256};
