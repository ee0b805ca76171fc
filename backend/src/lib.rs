// GridMint Backend
//
// Read-only HTTP view over the deployed grid contracts.

#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]

pub mod error;
pub mod routes;

use actix_web::web;
use grid_core::{ChainConnector, ContractRegistry};
use std::sync::Arc;

pub use error::{ApiError, ErrorResponse};

/// Shared by every worker; holds no mutable state.
pub struct AppState {
    pub connector: Arc<dyn ChainConnector>,
    pub registry: ContractRegistry,
}

impl AppState {
    pub fn new(connector: Arc<dyn ChainConnector>, registry: ContractRegistry) -> Self {
        Self {
            connector,
            registry,
        }
    }
}

/// Register every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(routes::index))
        .route("/balances/{address}", web::get().to(routes::balances))
        .route("/sales", web::get().to(routes::sales));
}
