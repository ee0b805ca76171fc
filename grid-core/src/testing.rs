//! In-memory [`ChainConnector`] for tests.
//!
//! Decodes every raw transaction it receives, hands out sequential nonces and
//! produces receipts immediately. Individual submissions can be made to fail
//! or revert by their 1-based submission number.

#![allow(clippy::panic)]

use crate::contracts::ContractHandle;
use crate::rpc::{ChainConnector, RpcError, TransactionReceipt};
use alloy::consensus::{Transaction, TxEnvelope};
use alloy::dyn_abi::{DynSolValue, FunctionExt};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, Selector, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A transaction accepted by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: B256,
    pub to: Option<Address>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: Option<u128>,
    pub chain_id: Option<u64>,
    pub input: Bytes,
}

impl SubmittedTransaction {
    /// Decode `mint(address,uint256)` arguments from the calldata.
    pub fn mint_args(&self) -> Option<(Address, U256)> {
        // selector (4) + address word (32) + amount word (32)
        if self.input.len() != 68 {
            return None;
        }
        let recipient = Address::from_slice(&self.input[16..36]);
        let amount = U256::from_be_slice(&self.input[36..68]);
        Some((recipient, amount))
    }
}

#[derive(Debug)]
struct MockState {
    chain_id: u64,
    gas_price: u128,
    next_nonce: u64,
    unreachable: bool,
    withhold_receipts: bool,
    call_responses: HashMap<(Address, Selector), Bytes>,
    // full calldata match, checked before the per-selector answers
    exact_responses: HashMap<(Address, Bytes), Bytes>,
    failing_calls: HashSet<(Address, Selector)>,
    failing_submissions: HashSet<usize>,
    reverting_submissions: HashSet<usize>,
    submission_attempts: usize,
    submitted: Vec<SubmittedTransaction>,
    receipts: HashMap<B256, TransactionReceipt>,
    calls: Vec<(Address, Bytes)>,
    receipt_polls: usize,
}

#[derive(Debug)]
pub struct MockConnector {
    state: Mutex<MockState>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// A reachable Hardhat-like chain (id 31337, 1 gwei gas price).
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                chain_id: 31337,
                gas_price: 1_000_000_000,
                next_nonce: 0,
                unreachable: false,
                withhold_receipts: false,
                call_responses: HashMap::new(),
                exact_responses: HashMap::new(),
                failing_calls: HashSet::new(),
                failing_submissions: HashSet::new(),
                reverting_submissions: HashSet::new(),
                submission_attempts: 0,
                submitted: Vec::new(),
                receipts: HashMap::new(),
                calls: Vec::new(),
                receipt_polls: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Every method fails as if the node were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.state().gas_price = gas_price;
    }

    pub fn set_next_nonce(&self, nonce: u64) {
        self.state().next_nonce = nonce;
    }

    /// Never produce receipts; submissions stay pending forever.
    pub fn withhold_receipts(&self, withhold: bool) {
        self.state().withhold_receipts = withhold;
    }

    /// Reject the n-th submission (1-based) with a node error.
    pub fn fail_submission(&self, n: usize) {
        self.state().failing_submissions.insert(n);
    }

    /// Accept the n-th submission (1-based) but give it a failed receipt.
    pub fn revert_submission(&self, n: usize) {
        self.state().reverting_submissions.insert(n);
    }

    /// Answer `function` on `contract` with the ABI-encoded `outputs`.
    pub fn respond(&self, contract: &ContractHandle, function: &str, outputs: &[DynSolValue]) {
        let func = contract
            .abi()
            .function(function)
            .and_then(|overloads| overloads.first())
            .unwrap_or_else(|| panic!("{} has no function {}", contract.name(), function));
        let encoded = func
            .abi_encode_output(outputs)
            .unwrap_or_else(|e| panic!("cannot encode {function} output: {e}"));
        self.state()
            .call_responses
            .insert((contract.address(), func.selector()), Bytes::from(encoded));
    }

    /// Answer `function` on `contract` with `outputs` only when it is called
    /// with exactly `args`; other arguments fall back to [`Self::respond`].
    pub fn respond_with_args(
        &self,
        contract: &ContractHandle,
        function: &str,
        args: &[DynSolValue],
        outputs: &[DynSolValue],
    ) {
        let calldata = contract
            .encode_call(function, args)
            .unwrap_or_else(|e| panic!("cannot encode {function} call: {e}"));
        let encoded = contract
            .abi()
            .function(function)
            .and_then(|overloads| overloads.first())
            .unwrap_or_else(|| panic!("{} has no function {}", contract.name(), function))
            .abi_encode_output(outputs)
            .unwrap_or_else(|e| panic!("cannot encode {function} output: {e}"));
        self.state()
            .exact_responses
            .insert((contract.address(), calldata), Bytes::from(encoded));
    }

    /// Make `function` on `contract` revert.
    pub fn fail_call(&self, contract: &ContractHandle, function: &str) {
        let selector = contract
            .abi()
            .function(function)
            .and_then(|overloads| overloads.first())
            .map(|func| func.selector())
            .unwrap_or_else(|| panic!("{} has no function {}", contract.name(), function));
        self.state()
            .failing_calls
            .insert((contract.address(), selector));
    }

    /// Transactions accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<SubmittedTransaction> {
        self.state().submitted.clone()
    }

    /// Read-only calls made so far, in order.
    pub fn calls(&self) -> Vec<(Address, Bytes)> {
        self.state().calls.clone()
    }

    pub fn receipt_polls(&self) -> usize {
        self.state().receipt_polls
    }

    fn check_reachable(state: &MockState) -> Result<(), RpcError> {
        if state.unreachable {
            return Err(RpcError::Node {
                code: -32603,
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

fn node_error(message: &str) -> RpcError {
    RpcError::Node {
        code: -32000,
        message: message.to_string(),
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let state = self.state();
        Self::check_reachable(&state)?;
        Ok(state.chain_id)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.push((to, data.clone()));

        if data.len() < 4 {
            return Err(node_error("execution reverted"));
        }
        let key = (to, Selector::from_slice(&data[..4]));
        if state.failing_calls.contains(&key) {
            return Err(node_error("execution reverted"));
        }
        if let Some(output) = state.exact_responses.get(&(to, data)) {
            return Ok(output.clone());
        }
        state
            .call_responses
            .get(&key)
            .cloned()
            .ok_or_else(|| node_error("execution reverted: no mock response"))
    }

    async fn transaction_count(&self, _account: Address) -> Result<u64, RpcError> {
        let state = self.state();
        Self::check_reachable(&state)?;
        Ok(state.next_nonce)
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        let state = self.state();
        Self::check_reachable(&state)?;
        Ok(state.gas_price)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RpcError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.submission_attempts += 1;
        let attempt = state.submission_attempts;

        if state.failing_submissions.contains(&attempt) {
            return Err(node_error("transaction rejected"));
        }

        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| node_error(&format!("invalid raw transaction: {e}")))?;
        if envelope.nonce() != state.next_nonce {
            return Err(node_error("nonce too low"));
        }

        let hash = keccak256(&raw);
        state.submitted.push(SubmittedTransaction {
            hash,
            to: envelope.to(),
            nonce: envelope.nonce(),
            gas_limit: envelope.gas_limit(),
            gas_price: envelope.gas_price(),
            chain_id: envelope.chain_id(),
            input: envelope.input().clone(),
        });
        state.next_nonce += 1;

        let block_number = state.submitted.len() as u64;
        let status = if state.reverting_submissions.contains(&attempt) { 0 } else { 1 };
        state.receipts.insert(
            hash,
            TransactionReceipt {
                transaction_hash: hash,
                block_number: Some(block_number),
                gas_used: 51_000,
                status: Some(status),
            },
        );

        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.receipt_polls += 1;
        if state.withhold_receipts {
            return Ok(None);
        }
        Ok(state.receipts.get(&hash).cloned())
    }
}
