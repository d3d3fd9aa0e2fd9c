//! # shop-stripe
//!
//! Stripe payment gateway for eshop-rs.
//!
//! **StripeChargeGateway** charges a card token once through the Charges API:
//! - Amount and currency from the product price
//! - Idempotency key per charge
//! - Receipt email and metadata passthrough
//! - `card_error` responses surface as `ShopError::CardDeclined` with
//!   Stripe's message verbatim
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeChargeGateway;
//! use shop_core::{ChargeRequest, PaymentGateway};
//!
//! // Create gateway from environment
//! let gateway = StripeChargeGateway::from_env()?;
//!
//! let request = ChargeRequest::new(product.price.clone(), token, &product.name);
//! let charge = gateway.charge(&request).await?;
//! ```

pub mod charges;
pub mod config;
pub mod tokens;

// Re-exports
pub use charges::StripeChargeGateway;
pub use config::{KeyMode, StripeConfig};
pub use tokens::CardDetails;
