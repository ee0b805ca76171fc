//! Owner account signing.
//!
//! Mint transactions are plain legacy (EIP-155) transactions: the harness sets
//! nonce, gas limit and gas price itself, so no fee-market estimation is
//! involved.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid owner private key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign transaction: {0}")]
    Signing(String),
}

/// Everything needed to sign one contract call. Built per call and dropped
/// once the raw transaction has been produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
}

/// An EIP-2718 encoded transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: B256,
    pub raw: Bytes,
}

/// Holds the owner key. The key itself never leaves this type and is not
/// printed by `Debug`.
#[derive(Clone)]
pub struct OwnerSigner {
    address: Address,
    wallet: EthereumWallet,
}

impl OwnerSigner {
    /// Parse a hex private key, with or without the `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self, SignerError> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| SignerError::InvalidKey(format!("{e}")))?;

        Ok(Self {
            address: signer.address(),
            wallet: EthereumWallet::from(signer),
        })
    }

    /// Address of the owner account
    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn sign(&self, intent: &TransactionIntent) -> Result<SignedTransaction, SignerError> {
        if intent.from != self.address {
            return Err(SignerError::Signing(format!(
                "intent sender {} does not match owner {}",
                intent.from, self.address
            )));
        }

        let request = TransactionRequest::default()
            .with_from(intent.from)
            .with_to(intent.to)
            .with_input(intent.input.clone())
            .with_nonce(intent.nonce)
            .with_gas_limit(intent.gas_limit)
            .with_gas_price(intent.gas_price)
            .with_chain_id(intent.chain_id);

        let envelope = request
            .build(&self.wallet)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
        })
    }
}

impl fmt::Debug for OwnerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
