//! # Application State
//!
//! Shared state for the Axum application: stores, the payment processor and
//! the mailer.

use crate::config::AppConfig;
use crate::mail::{EmailSender, LogTransport, MailTransport, SmtpTransport};
use anyhow::{bail, Context};
use shop_core::{
    BoxedPaymentGateway, CartBook, ClientDirectory, Inventory, NewClient, PaymentProcessor,
    ProductCatalog,
};
use shop_stripe::StripeChargeGateway;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_FROM_ADDRESS: &str = "E-Shop <no-reply@eshop.local>";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub inventory: Inventory,
    pub clients: ClientDirectory,
    pub carts: CartBook,
    pub payments: PaymentProcessor,
    pub mailer: EmailSender,
    /// Handed to Stripe Checkout on the payment page
    pub stripe_publishable_key: String,
}

impl AppState {
    /// Build the state from the environment: catalog file, Stripe keys and
    /// SMTP settings.
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let catalog = load_product_catalog(config.catalog_path.as_deref())?;
        let inventory = Inventory::new(catalog);

        let stripe = StripeChargeGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
        let publishable_key = stripe.config().publishable_key.clone();
        let gateway: BoxedPaymentGateway = Arc::new(stripe);

        let mailer = build_mailer(&config)?;

        let state = Self::from_parts(config, inventory, gateway, mailer, publishable_key);

        if !state.config.is_production() {
            state.seed_demo_client().await?;
        }

        Ok(state)
    }

    /// Assemble state from already-built pieces.
    pub fn from_parts(
        config: AppConfig,
        inventory: Inventory,
        gateway: BoxedPaymentGateway,
        mailer: EmailSender,
        stripe_publishable_key: impl Into<String>,
    ) -> Self {
        Self {
            payments: PaymentProcessor::new(gateway, inventory.clone()),
            inventory,
            clients: ClientDirectory::new(),
            carts: CartBook::new(),
            mailer,
            stripe_publishable_key: stripe_publishable_key.into(),
            config,
        }
    }

    /// State for tests: testing config, memory mail, the given gateway.
    pub fn for_testing(
        inventory: Inventory,
        gateway: BoxedPaymentGateway,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self::from_parts(
            AppConfig::for_testing(),
            inventory,
            gateway,
            EmailSender::new(transport, DEFAULT_FROM_ADDRESS),
            "pk_test_placeholder",
        )
    }

    /// Development login so a fresh checkout can be tried end to end.
    async fn seed_demo_client(&self) -> anyhow::Result<()> {
        let demo = NewClient::new("demo", "demo-password")
            .with_email("demo@eshop.local")
            .with_name("Demo", "Client");
        self.clients
            .create_user(demo)
            .await
            .context("Failed to create demo client")?;
        info!("Created demo client 'demo' (password 'demo-password')");
        Ok(())
    }
}

/// SMTP when configured. Production refuses to start without it; elsewhere
/// mail is logged and dropped.
fn build_mailer(config: &AppConfig) -> anyhow::Result<EmailSender> {
    match &config.mail {
        Some(mail) => {
            let transport = SmtpTransport::new(mail).context("Failed to configure SMTP")?;
            Ok(EmailSender::new(Arc::new(transport), mail.from_address.clone()))
        }
        None if config.is_production() => bail!("SMTP_HOST must be set in production"),
        None => {
            warn!("SMTP_HOST not set, purchase emails will only be logged");
            Ok(EmailSender::new(Arc::new(LogTransport), DEFAULT_FROM_ADDRESS))
        }
    }
}

/// Load the product catalog from `explicit`, or the first
/// `config/products.toml` found walking up from the working directory.
fn load_product_catalog(explicit: Option<&str>) -> anyhow::Result<ProductCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path))?;
        let catalog = ProductCatalog::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", path))?;
        info!("Loaded {} products from {}", catalog.products.len(), path);
        return Ok(catalog);
    }

    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    warn!("No product catalog found, using empty catalog");
    Ok(ProductCatalog::new())
}
