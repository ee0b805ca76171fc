//! Submit signed contract calls and wait for their receipts.

use crate::rpc::{ChainConnector, RpcError, TransactionReceipt};
use crate::signer::{OwnerSigner, SignerError, TransactionIntent};
use alloy::primitives::{Address, Bytes, B256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("No receipt for {hash} after {timeout:?}")]
    ReceiptTimeout { hash: B256, timeout: Duration },

    #[error("Transaction {0} reverted")]
    Reverted(B256),
}

/// Knobs for transaction submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub gas_limit: u64,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            gas_limit: 300_000,
            receipt_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Signs and submits transactions for the owner account, one at a time.
///
/// The nonce is fetched from the node for every transaction rather than
/// tracked locally, so callers must not submit concurrently.
pub struct TransactionSender {
    connector: Arc<dyn ChainConnector>,
    signer: OwnerSigner,
    chain_id: u64,
    options: SendOptions,
}

impl TransactionSender {
    pub fn new(
        connector: Arc<dyn ChainConnector>,
        signer: OwnerSigner,
        chain_id: u64,
        options: SendOptions,
    ) -> Self {
        Self {
            connector,
            signer,
            chain_id,
            options,
        }
    }

    /// Address transactions are sent from
    pub fn owner(&self) -> Address {
        self.signer.address()
    }

    pub fn options(&self) -> &SendOptions {
        &self.options
    }

    /// Node the transactions go to; read-only calls for the same flow should
    /// use it too.
    pub fn connector(&self) -> &Arc<dyn ChainConnector> {
        &self.connector
    }

    /// Sign `input` as a call to `to`, submit it and block until it is mined.
    /// A receipt with a failed status is returned as [`SendError::Reverted`].
    pub async fn send(&self, to: Address, input: Bytes) -> Result<TransactionReceipt, SendError> {
        let from = self.signer.address();
        let nonce = self.connector.transaction_count(from).await?;
        let gas_price = self.connector.gas_price().await?;

        let intent = TransactionIntent {
            from,
            to,
            input,
            nonce,
            gas_limit: self.options.gas_limit,
            gas_price,
            chain_id: self.chain_id,
        };
        let signed = self.signer.sign(&intent).await?;
        debug!("Submitting {} (nonce {}, gas price {})", signed.hash, nonce, gas_price);

        let hash = self.connector.send_raw_transaction(signed.raw).await?;
        if hash != signed.hash {
            warn!("Node reported hash {} for locally computed {}", hash, signed.hash);
        }

        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.succeeded() {
            return Err(SendError::Reverted(hash));
        }
        Ok(receipt)
    }

    /// Poll for a receipt until it appears or the receipt timeout elapses.
    pub async fn wait_for_receipt(&self, hash: B256) -> Result<TransactionReceipt, SendError> {
        let poll = async {
            loop {
                match self.connector.transaction_receipt(hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => sleep(self.options.poll_interval).await,
                    Err(e) => return Err(SendError::from(e)),
                }
            }
        };

        match timeout(self.options.receipt_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(SendError::ReceiptTimeout {
                hash,
                timeout: self.options.receipt_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnector;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn sender(mock: Arc<MockConnector>, options: SendOptions) -> TransactionSender {
        let signer = OwnerSigner::from_hex(DEV_KEY).unwrap();
        TransactionSender::new(mock, signer, 31337, options)
    }

    #[tokio::test]
    async fn test_send_uses_node_nonce_and_gas_price() {
        let mock = Arc::new(MockConnector::new());
        mock.set_gas_price(2_000_000_000);
        mock.set_next_nonce(41);
        let sender = sender(mock.clone(), SendOptions::default());
        let to = Address::repeat_byte(0xaa);

        let receipt = sender.send(to, Bytes::from(vec![1, 2, 3, 4])).await.unwrap();
        assert!(receipt.succeeded());

        let submitted = mock.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].hash, receipt.transaction_hash);
        assert_eq!(submitted[0].nonce, 41);
        assert_eq!(submitted[0].gas_price, Some(2_000_000_000));
        assert_eq!(submitted[0].gas_limit, 300_000);
        assert_eq!(submitted[0].to, Some(to));
    }

    #[tokio::test]
    async fn test_connector_is_the_one_sends_use() {
        let mock = Arc::new(MockConnector::new());
        mock.set_unreachable(true);
        let sender = sender(mock, SendOptions::default());

        assert!(sender.connector().chain_id().await.is_err());
        assert!(matches!(
            sender.send(Address::repeat_byte(0xaa), Bytes::new()).await,
            Err(SendError::Rpc(_))
        ));
    }

    #[tokio::test]
    async fn test_consecutive_sends_advance_nonce() {
        let mock = Arc::new(MockConnector::new());
        let sender = sender(mock.clone(), SendOptions::default());

        for _ in 0..3 {
            sender
                .send(Address::repeat_byte(0xbb), Bytes::new())
                .await
                .unwrap();
        }

        let nonces: Vec<u64> = mock.submitted().iter().map(|tx| tx.nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_rejected_submission_is_reported() {
        let mock = Arc::new(MockConnector::new());
        mock.fail_submission(1);
        let sender = sender(mock.clone(), SendOptions::default());

        let result = sender.send(Address::repeat_byte(0xcc), Bytes::new()).await;
        assert!(matches!(result, Err(SendError::Rpc(RpcError::Node { .. }))));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_an_error() {
        let mock = Arc::new(MockConnector::new());
        mock.revert_submission(1);
        let sender = sender(mock.clone(), SendOptions::default());

        let result = sender.send(Address::repeat_byte(0xdd), Bytes::new()).await;
        assert!(matches!(result, Err(SendError::Reverted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_receipt_times_out() {
        let mock = Arc::new(MockConnector::new());
        mock.withhold_receipts(true);
        let options = SendOptions {
            receipt_timeout: Duration::from_secs(2),
            ..SendOptions::default()
        };
        let sender = sender(mock.clone(), options);

        let result = sender.send(Address::repeat_byte(0xee), Bytes::new()).await;
        match result {
            Err(SendError::ReceiptTimeout { timeout, .. }) => {
                assert_eq!(timeout, Duration::from_secs(2))
            }
            other => panic!("expected receipt timeout, got {other:?}"),
        }
        assert!(mock.receipt_polls() > 1);
    }
}
