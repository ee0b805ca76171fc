//! API error types and error handling

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use grid_core::ContractError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// JSON body returned with every API error
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A contract read failed
    #[error("Chain read failed: {0}")]
    Chain(#[from] ContractError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Chain(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        HttpResponse::build(status_code).json(ErrorResponse {
            code: status_code.as_u16(),
            message: self.to_string(),
        })
    }
}
