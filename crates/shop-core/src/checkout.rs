//! # Payment Processing
//!
//! Charges a single product against a card token and keeps stock in step
//! with successful charges.
//!
//! Flow for one purchase:
//!
//! 1. `count == 0` on the product snapshot → `OutOfStock`, gateway untouched.
//! 2. Reserve one unit in the inventory. Losing a race for the last unit also
//!    ends in `OutOfStock` without a gateway call.
//! 3. Charge the gateway. Any failure releases the reserved unit and is
//!    returned as-is; a declined card arrives as `CardDeclined`.
//! 4. Success keeps the reservation, so stock ends exactly one lower.

use crate::client::Client;
use crate::error::{ShopError, ShopResult};
use crate::gateway::{BoxedPaymentGateway, Charge, ChargeRequest};
use crate::inventory::Inventory;
use crate::product::Product;
use tracing::{error, info, instrument, warn};

/// `(success, error)` view of a payment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl From<&ShopResult<Charge>> for PaymentOutcome {
    fn from(result: &ShopResult<Charge>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Clone)]
pub struct PaymentProcessor {
    gateway: BoxedPaymentGateway,
    inventory: Inventory,
}

impl PaymentProcessor {
    pub fn new(gateway: BoxedPaymentGateway, inventory: Inventory) -> Self {
        Self { gateway, inventory }
    }

    pub fn provider_name(&self) -> &'static str {
        self.gateway.provider_name()
    }

    /// Charge `product.price` against `token` on behalf of `client`.
    #[instrument(skip(self, product, token, client), fields(product_id = product.id, client_id = client.id))]
    pub async fn process_payment(
        &self,
        product: &Product,
        token: &str,
        client: &Client,
    ) -> ShopResult<Charge> {
        if product.count == 0 {
            info!("refusing payment: product out of stock");
            return Err(ShopError::OutOfStock);
        }

        self.inventory.reserve_unit(product.id).await?;

        let request = ChargeRequest::new(product.price.clone(), token, product.name.clone())
            .with_receipt_email(client.email.clone())
            .with_metadata("product_id", product.id.to_string())
            .with_metadata("client_id", client.id.to_string());

        match self.gateway.charge(&request).await {
            Ok(charge) => {
                info!(
                    charge_id = %charge.id,
                    amount = %charge.amount.display(),
                    provider = self.gateway.provider_name(),
                    "payment captured"
                );
                Ok(charge)
            }
            Err(e) => {
                if let Err(release_err) = self.inventory.release_unit(product.id).await {
                    error!(error = %release_err, "failed to release reserved unit");
                }
                match &e {
                    ShopError::CardDeclined { message } => warn!(%message, "card declined"),
                    other => error!(error = %other, "payment gateway error"),
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientDirectory, NewClient};
    use crate::gateway::{ChargeStatus, PaymentGateway};
    use crate::product::{Currency, Price};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behaviour {
        Approve,
        Decline(&'static str),
        Unreachable,
    }

    struct FakeGateway {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn charge(&self, request: &ChargeRequest) -> ShopResult<Charge> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Approve => Ok(Charge {
                    id: "ch_test".to_string(),
                    provider: "fake".to_string(),
                    amount: request.amount.clone(),
                    status: ChargeStatus::Succeeded,
                    receipt_url: None,
                    created_at: Utc::now(),
                }),
                Behaviour::Decline(message) => Err(ShopError::CardDeclined {
                    message: message.to_string(),
                }),
                Behaviour::Unreachable => Err(ShopError::NetworkError("connection reset".into())),
            }
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    async fn setup(count: u32, behaviour: Behaviour) -> (PaymentProcessor, Arc<FakeGateway>, Inventory, Product, Client) {
        let inventory = Inventory::default();
        let product = inventory
            .insert(Product::new("Test Product", Price::new(10.0, Currency::USD)).with_count(count))
            .await;
        let client = ClientDirectory::new()
            .create_user(NewClient::new("testuser", "testpass").with_email("eeefs@gmail.com"))
            .await
            .unwrap();
        let gateway = FakeGateway::new(behaviour);
        let processor = PaymentProcessor::new(gateway.clone(), inventory.clone());
        (processor, gateway, inventory, product, client)
    }

    #[tokio::test]
    async fn test_out_of_stock_skips_gateway() {
        let (processor, gateway, _, product, client) = setup(0, Behaviour::Approve).await;

        let result = processor.process_payment(&product, "fake_token", &client).await;
        let outcome = PaymentOutcome::from(&result);

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Product is out of stock."));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_card_declined_passes_message_and_keeps_stock() {
        let (processor, gateway, inventory, product, client) =
            setup(1, Behaviour::Decline("Card error message")).await;

        let result = processor.process_payment(&product, "fake_token", &client).await;

        match result {
            Err(ShopError::CardDeclined { message }) => assert_eq!(message, "Card error message"),
            other => panic!("expected CardDeclined, got {:?}", other),
        }
        assert_eq!(gateway.calls(), 1);
        assert_eq!(inventory.get(product.id).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_success_decrements_stock_by_one() {
        let (processor, gateway, inventory, product, client) = setup(10, Behaviour::Approve).await;

        let result = processor.process_payment(&product, "tok_visa", &client).await;

        assert_eq!(
            PaymentOutcome::from(&result),
            PaymentOutcome {
                success: true,
                error: None
            }
        );
        assert_eq!(result.unwrap().amount.amount, 1000);
        assert_eq!(gateway.calls(), 1);
        assert_eq!(inventory.get(product.id).await.unwrap().count, 9);
    }

    #[tokio::test]
    async fn test_network_error_propagates_and_restores_stock() {
        let (processor, _, inventory, product, client) = setup(2, Behaviour::Unreachable).await;

        let err = processor
            .process_payment(&product, "tok_visa", &client)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(inventory.get(product.id).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_stale_snapshot_cannot_oversell() {
        let (processor, gateway, inventory, product, client) = setup(1, Behaviour::Approve).await;

        // Both buyers loaded the product while one unit was left.
        let stale = product.clone();
        processor.process_payment(&product, "tok_a", &client).await.unwrap();
        let second = processor.process_payment(&stale, "tok_b", &client).await;

        assert!(matches!(second, Err(ShopError::OutOfStock)));
        assert_eq!(gateway.calls(), 1);
        assert_eq!(inventory.get(product.id).await.unwrap().count, 0);
    }
}
