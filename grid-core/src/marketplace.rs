//! Read-only view of marketplace sales.

use crate::contracts::{ContractError, ContractHandle};
use crate::rpc::ChainConnector;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use tracing::debug;

/// One entry of the marketplace `sales` mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    pub id: U256,
    pub seller: Address,
    pub token_contract: Address,
    pub amount: U256,
    /// Total price in wei
    pub price: U256,
    pub active: bool,
}

impl Sale {
    fn from_outputs(values: &[DynSolValue]) -> Option<Self> {
        match values {
            [id, seller, token_contract, amount, price, active] => Some(Self {
                id: id.as_uint()?.0,
                seller: seller.as_address()?,
                token_contract: token_contract.as_address()?,
                amount: amount.as_uint()?.0,
                price: price.as_uint()?.0,
                active: active.as_bool()?,
            }),
            _ => None,
        }
    }
}

/// Number of sales ever created; ids run from 0 to this value exclusive.
pub async fn next_sale_id(
    marketplace: &ContractHandle,
    connector: &dyn ChainConnector,
) -> Result<U256, ContractError> {
    let output = marketplace.call(connector, "nextSaleId", &[]).await?;
    output
        .first()
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value)
        .ok_or_else(|| ContractError::Decode {
            function: "nextSaleId".to_string(),
            reason: "expected a single uint256".to_string(),
        })
}

pub async fn sale(
    marketplace: &ContractHandle,
    connector: &dyn ChainConnector,
    id: U256,
) -> Result<Sale, ContractError> {
    let output = marketplace
        .call(connector, "sales", &[DynSolValue::Uint(id, 256)])
        .await?;
    Sale::from_outputs(&output).ok_or_else(|| ContractError::Decode {
        function: "sales".to_string(),
        reason: "expected (uint256, address, address, uint256, uint256, bool)".to_string(),
    })
}

/// Every sale that is still open, oldest first.
pub async fn active_sales(
    marketplace: &ContractHandle,
    connector: &dyn ChainConnector,
) -> Result<Vec<Sale>, ContractError> {
    let count = next_sale_id(marketplace, connector).await?;
    let count = u64::try_from(count).map_err(|_| ContractError::Decode {
        function: "nextSaleId".to_string(),
        reason: format!("sale count {count} out of range"),
    })?;

    let mut open = Vec::new();
    for id in 0..count {
        let sale = sale(marketplace, connector, U256::from(id)).await?;
        if sale.active {
            open.push(sale);
        }
    }
    debug!("{} of {} sales are active", open.len(), count);
    Ok(open)
}
