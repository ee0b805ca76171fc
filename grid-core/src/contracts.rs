//! Contract registry
//!
//! Loads Hardhat artifacts (JSON documents with an `abi` field) and binds them
//! to deployed addresses. Every artifact and address must resolve; there is no
//! partially-loaded registry.

use crate::rpc::{ChainConnector, RpcError};
use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, Bytes, U256};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const ENERGY_TOKEN_ARTIFACT: &str = "EnergyToken.json";
pub const CARBON_CREDIT_TOKEN_ARTIFACT: &str = "CarbonCreditToken.json";
pub const MARKETPLACE_ARTIFACT: &str = "Marketplace.json";

/// Functions the simulator and the status server call on both tokens.
pub const TOKEN_FUNCTIONS: [&str; 4] = ["mint", "symbol", "name", "balanceOf"];

/// Read-only marketplace surface used to list open sales.
pub const MARKETPLACE_FUNCTIONS: [&str; 2] = ["nextSaleId", "sales"];

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Failed to read artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Contract {contract} has no function {function}")]
    MissingFunction { contract: String, function: String },

    #[error("Failed to encode {function} call: {reason}")]
    Encode { function: String, reason: String },

    #[error("Failed to decode {function} output: {reason}")]
    Decode { function: String, reason: String },

    #[error("Call to {function} on {contract} failed: {source}")]
    Call {
        contract: String,
        function: String,
        #[source]
        source: RpcError,
    },
}

#[derive(Debug, Deserialize)]
struct ContractArtifact {
    abi: JsonAbi,
}

/// Read the `abi` field of a contract artifact.
pub fn load_abi(path: &Path) -> Result<JsonAbi, ContractError> {
    let contents = fs::read_to_string(path).map_err(|source| ContractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let artifact: ContractArtifact =
        serde_json::from_str(&contents).map_err(|source| ContractError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(
        "Loaded ABI from {:?} ({} functions)",
        path,
        artifact.abi.functions().count()
    );
    Ok(artifact.abi)
}

/// An ABI bound to a deployed address
#[derive(Debug, Clone)]
pub struct ContractHandle {
    name: String,
    address: Address,
    abi: JsonAbi,
}

impl ContractHandle {
    pub fn new(name: impl Into<String>, address: Address, abi: JsonAbi) -> Self {
        Self {
            name: name.into(),
            address,
            abi,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn has_function(&self, function: &str) -> bool {
        self.abi.function(function).is_some_and(|f| !f.is_empty())
    }

    // Overloads are not used by the grid contracts; the first declaration wins.
    fn function(&self, function: &str) -> Result<&Function, ContractError> {
        self.abi
            .function(function)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| ContractError::MissingFunction {
                contract: self.name.clone(),
                function: function.to_string(),
            })
    }

    /// Selector plus ABI-encoded arguments
    pub fn encode_call(&self, function: &str, args: &[DynSolValue]) -> Result<Bytes, ContractError> {
        let func = self.function(function)?;
        let encoded = func
            .abi_encode_input(args)
            .map_err(|e| ContractError::Encode {
                function: function.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Bytes::from(encoded))
    }

    pub fn decode_output(&self, function: &str, data: &[u8]) -> Result<Vec<DynSolValue>, ContractError> {
        let func = self.function(function)?;
        func.abi_decode_output(data)
            .map_err(|e| ContractError::Decode {
                function: function.to_string(),
                reason: e.to_string(),
            })
    }

    /// Read-only call through `connector`
    pub async fn call(
        &self,
        connector: &dyn ChainConnector,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ContractError> {
        let data = self.encode_call(function, args)?;
        let output = connector
            .call(self.address, data)
            .await
            .map_err(|source| ContractError::Call {
                contract: self.name.clone(),
                function: function.to_string(),
                source,
            })?;
        self.decode_output(function, &output)
    }

    async fn call_string(
        &self,
        connector: &dyn ChainConnector,
        function: &str,
    ) -> Result<String, ContractError> {
        let output = self.call(connector, function, &[]).await?;
        output
            .first()
            .and_then(DynSolValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| ContractError::Decode {
                function: function.to_string(),
                reason: "expected a single string".to_string(),
            })
    }

    /// ERC20 `name()`
    pub async fn token_name(&self, connector: &dyn ChainConnector) -> Result<String, ContractError> {
        self.call_string(connector, "name").await
    }

    /// ERC20 `symbol()`
    pub async fn symbol(&self, connector: &dyn ChainConnector) -> Result<String, ContractError> {
        self.call_string(connector, "symbol").await
    }

    /// ERC20 `balanceOf(owner)` in base units
    pub async fn balance_of(
        &self,
        connector: &dyn ChainConnector,
        owner: Address,
    ) -> Result<U256, ContractError> {
        let output = self
            .call(connector, "balanceOf", &[DynSolValue::Address(owner)])
            .await?;
        output
            .first()
            .and_then(DynSolValue::as_uint)
            .map(|(value, _)| value)
            .ok_or_else(|| ContractError::Decode {
                function: "balanceOf".to_string(),
                reason: "expected a single uint256".to_string(),
            })
    }

    /// Calldata for `mint(to, amount)`
    pub fn mint_calldata(&self, to: Address, amount: U256) -> Result<Bytes, ContractError> {
        self.encode_call(
            "mint",
            &[DynSolValue::Address(to), DynSolValue::Uint(amount, 256)],
        )
    }
}

/// Deployed addresses of the three grid contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub energy_token: Address,
    pub carbon_credit_token: Address,
    pub marketplace: Address,
}

/// Handles for every grid contract, built once at startup.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    energy_token: ContractHandle,
    carbon_credit_token: ContractHandle,
    marketplace: ContractHandle,
}

impl ContractRegistry {
    /// Load all three artifacts from `contracts_dir` and bind them.
    pub fn load(contracts_dir: &Path, addresses: &ContractAddresses) -> Result<Self, ContractError> {
        let energy_token = ContractHandle::new(
            "EnergyToken",
            addresses.energy_token,
            load_abi(&contracts_dir.join(ENERGY_TOKEN_ARTIFACT))?,
        );
        let carbon_credit_token = ContractHandle::new(
            "CarbonCreditToken",
            addresses.carbon_credit_token,
            load_abi(&contracts_dir.join(CARBON_CREDIT_TOKEN_ARTIFACT))?,
        );
        let marketplace = ContractHandle::new(
            "Marketplace",
            addresses.marketplace,
            load_abi(&contracts_dir.join(MARKETPLACE_ARTIFACT))?,
        );

        let registry = Self::from_handles(energy_token, carbon_credit_token, marketplace)?;
        info!("Contract instances created successfully");
        Ok(registry)
    }

    /// Bind already-built handles, checking each contract's surface.
    pub fn from_handles(
        energy_token: ContractHandle,
        carbon_credit_token: ContractHandle,
        marketplace: ContractHandle,
    ) -> Result<Self, ContractError> {
        for token in [&energy_token, &carbon_credit_token] {
            require_functions(token, &TOKEN_FUNCTIONS)?;
        }
        require_functions(&marketplace, &MARKETPLACE_FUNCTIONS)?;

        Ok(Self {
            energy_token,
            carbon_credit_token,
            marketplace,
        })
    }

    pub fn energy_token(&self) -> &ContractHandle {
        &self.energy_token
    }

    pub fn carbon_credit_token(&self) -> &ContractHandle {
        &self.carbon_credit_token
    }

    pub fn marketplace(&self) -> &ContractHandle {
        &self.marketplace
    }
}

fn require_functions(handle: &ContractHandle, functions: &[&str]) -> Result<(), ContractError> {
    match functions.iter().find(|f| !handle.has_function(f)) {
        Some(missing) => Err(ContractError::MissingFunction {
            contract: handle.name().to_string(),
            function: missing.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnector;
    use alloy::primitives::address;

    const TOKEN_ABI: &str = r#"[
        {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
        {"type":"function","name":"symbol","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
        {"type":"function","name":"balanceOf","inputs":[{"name":"account","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"mint","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"}
    ]"#;

    fn token() -> ContractHandle {
        ContractHandle::new(
            "EnergyToken",
            address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
            serde_json::from_str(TOKEN_ABI).unwrap(),
        )
    }

    #[test]
    fn test_mint_calldata_layout() {
        let recipient = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
        let amount = U256::from(3_000_000_000_000_000_000u128);
        let data = token().mint_calldata(recipient, amount).unwrap();

        // keccak256("mint(address,uint256)")[..4]
        assert_eq!(&data[..4], &[0x40, 0xc1, 0x0f, 0x19]);
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[16..36], recipient.as_slice());
        assert_eq!(U256::from_be_slice(&data[36..68]), amount);
    }

    #[test]
    fn test_unknown_function_is_reported() {
        let err = token().encode_call("burn", &[]).unwrap_err();
        assert!(matches!(err, ContractError::MissingFunction { ref function, .. } if function == "burn"));
    }

    #[test]
    fn test_wrong_argument_types_fail_to_encode() {
        let err = token()
            .encode_call("balanceOf", &[DynSolValue::Bool(true)])
            .unwrap_err();
        assert!(matches!(err, ContractError::Encode { .. }));
    }

    #[tokio::test]
    async fn test_string_and_balance_reads() {
        let token = token();
        let mock = MockConnector::new();
        mock.respond(&token, "name", &[DynSolValue::String("EnergyToken".into())]);
        mock.respond(&token, "symbol", &[DynSolValue::String("ETKN".into())]);
        mock.respond(
            &token,
            "balanceOf",
            &[DynSolValue::Uint(U256::from(42u64), 256)],
        );

        assert_eq!(token.token_name(&mock).await.unwrap(), "EnergyToken");
        assert_eq!(token.symbol(&mock).await.unwrap(), "ETKN");
        assert_eq!(
            token.balance_of(&mock, Address::ZERO).await.unwrap(),
            U256::from(42u64)
        );
    }

    #[tokio::test]
    async fn test_reverted_call_surfaces_contract_and_function() {
        let token = token();
        let mock = MockConnector::new();
        mock.fail_call(&token, "name");

        match token.token_name(&mock).await {
            Err(ContractError::Call {
                contract, function, ..
            }) => {
                assert_eq!(contract, "EnergyToken");
                assert_eq!(function, "name");
            }
            other => panic!("expected call error, got {other:?}"),
        }
    }

    #[test]
    fn test_registry_loads_bundled_artifacts() {
        let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../contracts"));
        let addresses = ContractAddresses {
            energy_token: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
            carbon_credit_token: address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
            marketplace: address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
        };

        let registry = ContractRegistry::load(dir, &addresses).unwrap();
        assert_eq!(registry.energy_token().address(), addresses.energy_token);
        assert_eq!(registry.carbon_credit_token().name(), "CarbonCreditToken");
        assert!(registry.marketplace().has_function("executeSale"));
    }

    #[test]
    fn test_missing_artifact_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let addresses = ContractAddresses {
            energy_token: Address::ZERO,
            carbon_credit_token: Address::ZERO,
            marketplace: Address::ZERO,
        };

        match ContractRegistry::load(dir.path(), &addresses) {
            Err(ContractError::Io { path, .. }) => {
                assert!(path.ends_with(ENERGY_TOKEN_ARTIFACT))
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn test_artifact_without_abi_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.json");
        fs::write(&path, r#"{"contractName":"Broken"}"#).unwrap();

        assert!(matches!(load_abi(&path), Err(ContractError::Json { .. })));
    }

    #[test]
    fn test_registry_rejects_token_without_mint() {
        let abi: JsonAbi = serde_json::from_str(
            r#"[{"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"}]"#,
        )
        .unwrap();
        let crippled = ContractHandle::new("CarbonCreditToken", Address::ZERO, abi);

        let err = ContractRegistry::from_handles(token(), crippled, token()).unwrap_err();
        assert!(matches!(
            err,
            ContractError::MissingFunction { ref contract, .. } if contract == "CarbonCreditToken"
        ));
    }
}
