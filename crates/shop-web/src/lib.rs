//! # shop-web
//!
//! HTTP storefront for eshop-rs.
//!
//! This crate provides:
//! - Axum server with askama-rendered pages
//! - Server-side sessions (tower-sessions) for client accounts
//! - Single-product checkout against the configured payment gateway
//! - Purchase emails with inline product photos
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/` | Home |
//! | GET | `/search?q=` | Search |
//! | GET/POST | `/accounts/login` | Log in |
//! | POST | `/accounts/logout` | Log out |
//! | GET | `/cart` | Cart |
//! | POST | `/cart/add/{id}` | Add to cart |
//! | GET | `/payment/{id}` | Checkout page |
//! | POST | `/payment/{id}/process` | Charge `stripeToken` |
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | List products |
//! | GET | `/api/v1/products/{id}` | Get product |

pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod routes;
pub mod session;
pub mod state;
pub mod templates;

pub use config::{AppConfig, MailConfig};
pub use error::WebError;
pub use routes::create_router;
pub use state::AppState;
