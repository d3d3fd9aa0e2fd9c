//! # Stripe Configuration
//!
//! Keys and endpoint for the Stripe charges API, read from the environment.

use shop_core::ShopError;
use std::env;

/// Whether a key talks to Stripe's test or live environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Test,
    Live,
}

impl KeyMode {
    /// Mode of a key such as `sk_test_...`, given its kind prefix (`sk`, `pk`).
    fn of(key: &str, kind: &str) -> Option<Self> {
        let rest = key.strip_prefix(kind)?.strip_prefix('_')?;
        if rest.starts_with("test_") {
            Some(KeyMode::Test)
        } else if rest.starts_with("live_") {
            Some(KeyMode::Live)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMode::Test => "test",
            KeyMode::Live => "live",
        }
    }
}

/// Stripe API configuration
#[derive(Clone)]
pub struct StripeConfig {
    /// `sk_test_...` or `sk_live_...`
    pub secret_key: String,

    /// Publishable key (pk_test_... or pk_live_...), handed to the payment page
    pub publishable_key: String,

    /// Overridden in tests to point at a mock server
    pub api_base_url: String,

    /// Sent as `Stripe-Version`
    pub api_version: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY`
    /// - `STRIPE_PUBLISHABLE_KEY`
    ///
    /// Optional:
    /// - `STRIPE_API_BASE` (default: https://api.stripe.com)
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok();

        let secret_key = env::var("STRIPE_SECRET_KEY").map_err(|_| {
            ShopError::Configuration("STRIPE_SECRET_KEY not set".to_string())
        })?;

        let publishable_key = env::var("STRIPE_PUBLISHABLE_KEY").map_err(|_| {
            ShopError::Configuration("STRIPE_PUBLISHABLE_KEY not set".to_string())
        })?;

        let mut config = Self::new(secret_key, publishable_key);
        if let Ok(base) = env::var("STRIPE_API_BASE") {
            config = config.with_api_base_url(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Config with explicit keys against the public API host
    pub fn new(secret_key: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            publishable_key: publishable_key.into(),
            api_base_url: "https://api.stripe.com".to_string(),
            api_version: "2024-12-18.acacia".to_string(),
        }
    }

    /// Check key formats and that test and live keys are not mixed.
    pub fn validate(&self) -> Result<(), ShopError> {
        let secret = KeyMode::of(&self.secret_key, "sk").ok_or_else(|| {
            ShopError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            )
        })?;
        let publishable = KeyMode::of(&self.publishable_key, "pk").ok_or_else(|| {
            ShopError::Configuration(
                "STRIPE_PUBLISHABLE_KEY must start with pk_test_ or pk_live_".to_string(),
            )
        })?;

        if secret != publishable {
            return Err(ShopError::Configuration(format!(
                "Stripe keys disagree: secret key is {}, publishable key is {}",
                secret.as_str(),
                publishable.as_str()
            )));
        }
        Ok(())
    }

    pub fn mode(&self) -> Option<KeyMode> {
        KeyMode::of(&self.secret_key, "sk")
    }

    pub fn is_test_mode(&self) -> bool {
        self.mode() == Some(KeyMode::Test)
    }

    pub fn is_live_mode(&self) -> bool {
        self.mode() == Some(KeyMode::Live)
    }

    /// `Authorization` header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: point at another API host
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}
