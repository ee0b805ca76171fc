//! HTTP handlers

use crate::error::{ApiError, Result};
use crate::AppState;
use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use grid_core::marketplace::{self, Sale};
use grid_core::{format_token_amount, parse_address, Address, ContractHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// `GET /`: liveness plus one read of the energy token's name.
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    let token = state.registry.energy_token();
    match token.token_name(state.connector.as_ref()).await {
        Ok(name) => HttpResponse::Ok()
            .content_type(ContentType::plaintext())
            .body(format!("Backend server is running! Energy Token name: {name}")),
        Err(e) => {
            error!("Status check failed: {}", e);
            HttpResponse::InternalServerError()
                .content_type(ContentType::plaintext())
                .body(e.to_string())
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub symbol: String,
    /// Base units as a decimal string
    pub raw: String,
    /// Whole tokens, trailing zeros trimmed
    pub formatted: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BalancesResponse {
    pub address: String,
    pub energy_token: TokenBalance,
    pub carbon_credit_token: TokenBalance,
}

async fn token_balance(
    state: &AppState,
    token: &ContractHandle,
    owner: Address,
) -> Result<TokenBalance> {
    let connector = state.connector.as_ref();
    let symbol = token.symbol(connector).await?;
    let balance = token.balance_of(connector, owner).await?;
    Ok(TokenBalance {
        symbol,
        raw: balance.to_string(),
        formatted: format_token_amount(balance),
    })
}

/// `GET /balances/{address}`
pub async fn balances(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let raw = path.into_inner();
    let owner = parse_address("address", &raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    debug!("Reading balances for {}", owner);

    let energy_token = token_balance(&state, state.registry.energy_token(), owner).await?;
    let carbon_credit_token =
        token_balance(&state, state.registry.carbon_credit_token(), owner).await?;

    Ok(HttpResponse::Ok().json(BalancesResponse {
        address: owner.to_string(),
        energy_token,
        carbon_credit_token,
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SaleView {
    pub id: String,
    pub seller: String,
    pub token_contract: String,
    /// `energy_token` or `carbon_credit_token` when the contract is one of ours
    pub token: Option<String>,
    pub amount: String,
    pub formatted_amount: String,
    pub price_wei: String,
}

impl SaleView {
    fn new(sale: &Sale, state: &AppState) -> Self {
        let token = if sale.token_contract == state.registry.energy_token().address() {
            Some("energy_token".to_string())
        } else if sale.token_contract == state.registry.carbon_credit_token().address() {
            Some("carbon_credit_token".to_string())
        } else {
            None
        };

        Self {
            id: sale.id.to_string(),
            seller: sale.seller.to_string(),
            token_contract: sale.token_contract.to_string(),
            token,
            amount: sale.amount.to_string(),
            formatted_amount: format_token_amount(sale.amount),
            price_wei: sale.price.to_string(),
        }
    }
}

/// `GET /sales`: open marketplace listings
pub async fn sales(state: web::Data<AppState>) -> Result<HttpResponse> {
    let open = marketplace::active_sales(state.registry.marketplace(), state.connector.as_ref())
        .await?;
    let views: Vec<SaleView> = open.iter().map(|sale| SaleView::new(sale, &state)).collect();
    Ok(HttpResponse::Ok().json(views))
}
