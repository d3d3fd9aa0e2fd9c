//! # Web Errors
//!
//! `WebError` is what HTML handlers return; it renders an error page with the
//! status the underlying failure maps to. JSON endpoints use
//! [`ErrorResponse`] instead.

use crate::mail::EmailError;
use crate::templates::{ErrorTemplate, NotFoundTemplate};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shop_core::ShopError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Shop(#[from] ShopError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// The payment provider failed for a reason other than a refusal
    #[error("Payment provider error: {0}")]
    Gateway(ShopError),

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Shop(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            WebError::Gateway(_) => StatusCode::BAD_GATEWAY,
            WebError::Email(_) | WebError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::NotFound => StatusCode::NOT_FOUND,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status == StatusCode::NOT_FOUND {
            return (status, NotFoundTemplate { user: None }).into_response();
        }

        // Internal details stay in the log
        let message = if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
            "We couldn't complete your request. Please try again later.".to_string()
        } else {
            self.to_string()
        };

        (status, ErrorTemplate { user: None, message }).into_response()
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

pub fn shop_error_to_json(err: ShopError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}
