//! # Card Tokens
//!
//! Server-side token creation. In production Stripe.js tokenizes cards in the
//! browser; this exists for test mode, where a known test card number is
//! exchanged for a token to drive the checkout end to end.

use crate::charges::{StripeChargeGateway, PROVIDER};
use serde::Deserialize;
use shop_core::{ShopError, ShopResult};
use tracing::{debug, instrument};

/// Raw card details (test mode only)
#[derive(Clone)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
}

impl CardDetails {
    /// Stripe's always-succeeding Visa test card
    pub fn test_visa(exp_year: u16) -> Self {
        Self {
            number: "4242424242424242".to_string(),
            exp_month: 12,
            exp_year,
            cvc: "123".to_string(),
        }
    }

    fn last4(&self) -> &str {
        let len = self.number.len();
        self.number.get(len.saturating_sub(4)..).unwrap_or("")
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("last4", &self.last4())
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct StripeTokenResponse {
    id: String,
}

impl StripeChargeGateway {
    /// Exchange card details for a single-use token. Refused with live keys.
    #[instrument(skip(self, card), fields(last4 = card.last4()))]
    pub async fn create_card_token(&self, card: &CardDetails) -> ShopResult<String> {
        if !self.config.is_test_mode() {
            return Err(ShopError::Configuration(
                "server-side card tokens are only allowed with test keys".to_string(),
            ));
        }

        let form_params = vec![
            ("card[number]".to_string(), card.number.clone()),
            ("card[exp_month]".to_string(), card.exp_month.to_string()),
            ("card[exp_year]".to_string(), card.exp_year.to_string()),
            ("card[cvc]".to_string(), card.cvc.clone()),
        ];

        let body = self.post_form("/v1/tokens", &form_params, None).await?;
        let token: StripeTokenResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse {} token: {}", PROVIDER, e))
        })?;

        debug!("Created test card token: {}", token.id);
        Ok(token.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_card_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tokens"))
            .and(body_string_contains("4242424242424242"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "tok_1abc",
                "object": "token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = StripeChargeGateway::new(
            StripeConfig::new("sk_test_abc", "pk_test_abc").with_api_base_url(server.uri()),
        )
        .unwrap();

        let token = gateway
            .create_card_token(&CardDetails::test_visa(2030))
            .await
            .unwrap();
        assert_eq!(token, "tok_1abc");
    }

    #[tokio::test]
    async fn test_live_keys_refused() {
        let gateway =
            StripeChargeGateway::new(StripeConfig::new("sk_live_abc", "pk_live_abc")).unwrap();
        let err = gateway
            .create_card_token(&CardDetails::test_visa(2030))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Configuration(_)));
    }

    #[test]
    fn test_debug_hides_card_number() {
        let rendered = format!("{:?}", CardDetails::test_visa(2030));
        assert!(rendered.contains("4242"));
        assert!(!rendered.contains("4242424242424242"));
    }
}
