//! # Application Configuration
//!
//! Everything is read from environment variables (a `.env` file is honored).
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 8080)
//! - `BASE_URL` - Public URL of the storefront (default: http://localhost:8080)
//! - `ENVIRONMENT` - development, staging or production (default: development)
//! - `CATALOG_PATH` - Product catalog TOML (default: search `config/products.toml`)
//! - `MEDIA_DIR` - Product images, named `<product id>.<ext>` (default: media/products)
//! - `LOG_FORMAT` - `json` for JSON log lines (default: human-readable). Read
//!   by the binary before anything else, so it is not part of [`AppConfig`].
//!
//! ## SMTP (required in production; elsewhere mail is only logged)
//! - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`,
//!   `SMTP_FROM`

use anyhow::{anyhow, Context};
use std::env;
use std::net::SocketAddr;

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for links in emails
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Explicit catalog file, if any
    pub catalog_path: Option<String>,
    /// Directory holding product images
    pub media_dir: String,
    /// SMTP settings, when mail delivery is configured
    pub mail: Option<MailConfig>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("environment", &self.environment)
            .field("catalog_path", &self.catalog_path)
            .field("media_dir", &self.media_dir)
            .field("mail", &self.mail)
            .finish()
    }
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let environment =
            env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let port = match env::var("PORT") {
            Ok(p) => p.parse().with_context(|| format!("PORT '{}' is not a port number", p))?,
            Err(_) => 8080,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            base_url: env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment,
            catalog_path: env::var("CATALOG_PATH").ok(),
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "media/products".to_string()),
            mail: MailConfig::from_env()?,
        })
    }

    /// Configuration for tests and local tooling: loopback, no SMTP.
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            base_url: "http://localhost".to_string(),
            environment: "test".to_string(),
            catalog_path: None,
            media_dir: "media/products".to_string(),
            mail: None,
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// SMTP configuration
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// From header
    pub from_address: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl MailConfig {
    /// `None` when `SMTP_HOST` is unset; an error when it is set but the
    /// rest is incomplete.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let smtp_host = match env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => host,
            _ => return Ok(None),
        };

        let smtp_port = match env::var("SMTP_PORT") {
            Ok(p) => p
                .parse()
                .with_context(|| format!("SMTP_PORT '{}' is not a port number", p))?,
            Err(_) => 587,
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: env::var("SMTP_USERNAME").context("SMTP_USERNAME not set")?,
            smtp_password: env::var("SMTP_PASSWORD").context("SMTP_PASSWORD not set")?,
            from_address: env::var("SMTP_FROM").context("SMTP_FROM not set")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..AppConfig::for_testing()
        };

        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_bad_host_is_an_error() {
        let config = AppConfig {
            host: "not a host".to_string(),
            ..AppConfig::for_testing()
        };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = AppConfig::for_testing();
        config.mail = Some(MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "shop".to_string(),
            smtp_password: "hunter2".to_string(),
            from_address: "shop@example.com".to_string(),
        });

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!config.is_production());
    }
}
