//! # Payment Gateway Trait
//!
//! Seam between the storefront and whatever service actually charges a card.
//! Implementations: Stripe Charges (`shop-stripe`), plus in-process fakes in
//! tests.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           PaymentGateway (trait)            │
//! │  ├── charge()                               │
//! │  └── provider_name()                        │
//! └─────────────────────────────────────────────┘
//!                       ▲
//!           ┌───────────┴───────────┐
//!   ┌───────┴───────┐       ┌───────┴───────┐
//!   │ StripeCharge  │       │   test fakes  │
//!   │   Gateway     │       │               │
//!   └───────────────┘       └───────────────┘
//! ```

use crate::error::ShopResult;
use crate::product::Price;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A request to charge a tokenized card once
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    /// Amount and currency to charge
    pub amount: Price,

    /// Card token produced by the gateway's client-side library
    pub source: String,

    /// Description shown in the gateway dashboard
    pub description: String,

    /// Where the gateway sends its receipt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_email: Option<String>,

    /// Idempotency key (prevents duplicate charges on retry)
    pub idempotency_key: String,

    /// Custom metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl ChargeRequest {
    /// Create a request with a fresh idempotency key
    pub fn new(amount: Price, source: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            amount,
            source: source.into(),
            description: description.into(),
            receipt_email: None,
            idempotency_key: Uuid::new_v4().to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Builder: set receipt email (ignored when empty)
    pub fn with_receipt_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        if !email.is_empty() {
            self.receipt_email = Some(email);
        }
        self
    }

    /// Builder: add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Status of a charge as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Pending,
    Failed,
}

/// A completed charge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// Gateway's charge ID
    pub id: String,

    /// Provider name (e.g., "stripe")
    pub provider: String,

    /// Amount charged
    pub amount: Price,

    pub status: ChargeStatus,

    /// Hosted receipt page, if the gateway offers one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Charge {
    pub fn is_paid(&self) -> bool {
        matches!(self.status, ChargeStatus::Succeeded)
    }
}

/// Core trait for payment gateway implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge a tokenized card.
    ///
    /// A declined card must surface as `ShopError::CardDeclined` carrying the
    /// gateway's message; every other failure keeps its own variant.
    async fn charge(&self, request: &ChargeRequest) -> ShopResult<Charge>;

    /// Get the provider name (for logging and metadata).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a boxed payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
