//! # Shop Error Types
//!
//! Typed error handling for the eshop storefront.
//! Catalog, account, cart and payment operations all return `Result<T, ShopError>`.

use thiserror::Error;

/// Message shown to a client when the product has no stock left.
pub const OUT_OF_STOCK_MESSAGE: &str = "Product is out of stock.";

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Missing or malformed settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: u64 },

    /// No stock left for the product
    #[error("{}", OUT_OF_STOCK_MESSAGE)]
    OutOfStock,

    /// The gateway declined the card. The message is the gateway's, verbatim.
    #[error("{message}")]
    CardDeclined { message: String },

    /// Username/password pair did not match an account
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Username is already registered
    #[error("Username is already taken: {username}")]
    DuplicateUsername { username: String },

    /// Client account not found
    #[error("Client not found: {client_id}")]
    ClientNotFound { client_id: u64 },

    /// The gateway answered with an error that is not a card refusal
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// The gateway could not be reached
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    /// A gateway response could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ShopError {
    /// Whether the same request may succeed if sent again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShopError::NetworkError(_)
                | ShopError::RateLimited { .. }
                | ShopError::ProviderError { .. }
        )
    }

    /// Returns true for the two failures a checkout reports back to the client
    /// instead of treating as a server fault.
    pub fn is_payment_refusal(&self) -> bool {
        matches!(self, ShopError::OutOfStock | ShopError::CardDeclined { .. })
    }

    /// HTTP status a web layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 500,
            ShopError::InvalidRequest(_) => 400,
            ShopError::ProductNotFound { .. } => 404,
            ShopError::OutOfStock => 409,
            ShopError::CardDeclined { .. } => 402,
            ShopError::InvalidCredentials => 401,
            ShopError::DuplicateUsername { .. } => 409,
            ShopError::ClientNotFound { .. } => 404,
            ShopError::ProviderError { .. } => 502,
            ShopError::NetworkError(_) => 503,
            ShopError::RateLimited { .. } => 429,
            ShopError::Internal(_) => 500,
            ShopError::Serialization(_) => 500,
        }
    }
}

/// Result type alias for storefront operations
pub type ShopResult<T> = Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ShopError::NetworkError("timeout".into()).is_retryable());
        assert!(ShopError::RateLimited {
            provider: "stripe".into(),
            retry_after_secs: 60
        }
        .is_retryable());
        assert!(!ShopError::OutOfStock.is_retryable());
        assert!(!ShopError::InvalidRequest("bad data".into()).is_retryable());
    }

    #[test]
    fn test_payment_refusal_messages() {
        assert_eq!(ShopError::OutOfStock.to_string(), "Product is out of stock.");

        let declined = ShopError::CardDeclined {
            message: "Your card was declined.".into(),
        };
        assert_eq!(declined.to_string(), "Your card was declined.");
        assert!(declined.is_payment_refusal());
        assert!(!ShopError::NetworkError("reset".into()).is_payment_refusal());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ShopError::InvalidRequest("test".into()).status_code(), 400);
        assert_eq!(
            ShopError::ProductNotFound { product_id: 7 }.status_code(),
            404
        );
        assert_eq!(ShopError::OutOfStock.status_code(), 409);
        assert_eq!(
            ShopError::CardDeclined {
                message: "no".into()
            }
            .status_code(),
            402
        );
        assert_eq!(
            ShopError::RateLimited {
                provider: "stripe".into(),
                retry_after_secs: 60
            }
            .status_code(),
            429
        );
    }
}
