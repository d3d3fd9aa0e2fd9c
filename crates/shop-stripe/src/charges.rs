//! # Stripe Charges
//!
//! Implementation of the Stripe Charges API behind the `PaymentGateway` trait.
//! A card token collected by Stripe.js on the payment page is charged once,
//! server-side, with an idempotency key.

use crate::config::StripeConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shop_core::{
    Charge, ChargeRequest, ChargeStatus, Currency, PaymentGateway, Price, ShopError, ShopResult,
};
use tracing::{debug, error, info, instrument, warn};

pub(crate) const PROVIDER: &str = "stripe";

/// Stripe Charges gateway
pub struct StripeChargeGateway {
    pub(crate) config: StripeConfig,
    pub(crate) client: Client,
}

impl StripeChargeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ShopError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        let config = StripeConfig::from_env()?;
        Self::new(config)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Build form data for `POST /v1/charges`
    fn charge_form(request: &ChargeRequest) -> Vec<(String, String)> {
        let mut form_params: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.amount.to_string()),
            (
                "currency".to_string(),
                request.amount.currency.as_str().to_string(),
            ),
            ("source".to_string(), request.source.clone()),
            ("description".to_string(), request.description.clone()),
        ];

        if let Some(ref email) = request.receipt_email {
            form_params.push(("receipt_email".to_string(), email.clone()));
        }

        let mut keys: Vec<&String> = request.metadata.keys().collect();
        keys.sort();
        for key in keys {
            form_params.push((format!("metadata[{}]", key), request.metadata[key].clone()));
        }

        form_params
    }

    /// POST a form to the Stripe API and return the raw success body.
    pub(crate) async fn post_form(
        &self,
        endpoint: &str,
        form_params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> ShopResult<String> {
        let url = format!("{}{}", self.config.api_base_url, endpoint);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version);
        if let Some(key) = idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let response = builder
            .form(form_params)
            .send()
            .await
            .map_err(|e| ShopError::NetworkError(e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::NetworkError(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        Err(map_error_response(status, retry_after, &body))
    }
}

/// Translate a non-2xx Stripe response into a `ShopError`.
fn map_error_response(status: StatusCode, retry_after: Option<u64>, body: &str) -> ShopError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Stripe rate limit hit");
        return ShopError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after_secs: retry_after.unwrap_or(1),
        };
    }

    match serde_json::from_str::<StripeErrorResponse>(body) {
        Ok(parsed) if parsed.error.error_type == "card_error" => {
            debug!(
                code = ?parsed.error.code,
                decline_code = ?parsed.error.decline_code,
                "Stripe declined the card"
            );
            ShopError::CardDeclined {
                message: parsed.error.message,
            }
        }
        Ok(parsed) => {
            error!(
                "Stripe API error: status={}, type={}, param={:?}",
                status, parsed.error.error_type, parsed.error.param
            );
            ShopError::ProviderError {
                provider: PROVIDER.to_string(),
                message: parsed.error.message,
            }
        }
        Err(_) => {
            error!("Stripe API error: status={}, body={}", status, body);
            ShopError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeChargeGateway {
    #[instrument(skip(self, request), fields(amount = request.amount.amount, currency = %request.amount.currency))]
    async fn charge(&self, request: &ChargeRequest) -> ShopResult<Charge> {
        if request.amount.amount <= 0 {
            return Err(ShopError::InvalidRequest(
                "Charge amount must be positive".to_string(),
            ));
        }
        if request.source.is_empty() {
            return Err(ShopError::InvalidRequest(
                "Missing payment token".to_string(),
            ));
        }

        let form_params = Self::charge_form(request);
        debug!("Creating Stripe charge: {} form fields", form_params.len());

        let body = self
            .post_form("/v1/charges", &form_params, Some(&request.idempotency_key))
            .await?;

        let charge: StripeChargeResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        info!("Created Stripe charge: id={}, status={}", charge.id, charge.status);

        let status = match charge.status.as_str() {
            "succeeded" => ChargeStatus::Succeeded,
            "pending" => ChargeStatus::Pending,
            _ => ChargeStatus::Failed,
        };
        match status {
            ChargeStatus::Failed => {
                return Err(ShopError::CardDeclined {
                    message: charge
                        .failure_message
                        .unwrap_or_else(|| "Your card was declined.".to_string()),
                })
            }
            // Not a refusal: the outcome is unknown until Stripe settles it
            ChargeStatus::Pending => {
                warn!(charge_id = %charge.id, "charge is still pending");
                return Err(ShopError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: format!("charge {} is pending", charge.id),
                });
            }
            ChargeStatus::Succeeded if !charge.paid => {
                return Err(ShopError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: format!("charge {} succeeded but is not paid", charge.id),
                });
            }
            ChargeStatus::Succeeded => {}
        }

        let currency = Currency::from_code(&charge.currency).unwrap_or(request.amount.currency);

        Ok(Charge {
            id: charge.id,
            provider: PROVIDER.to_string(),
            amount: Price::from_cents(charge.amount, currency),
            status,
            receipt_url: charge.receipt_url,
            created_at: DateTime::from_timestamp(charge.created, 0).unwrap_or_else(Utc::now),
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeChargeResponse {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    #[serde(default)]
    paid: bool,
    #[serde(default)]
    receipt_url: Option<String>,
    #[serde(default)]
    failure_message: Option<String>,
    created: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StripeErrorResponse {
    pub(crate) error: StripeError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StripeError {
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) code: Option<String>,
    #[serde(default)]
    pub(crate) decline_code: Option<String>,
    #[serde(default)]
    pub(crate) param: Option<String>,
}
