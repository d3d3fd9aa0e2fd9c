//! # shop-core
//!
//! Core types and traits for the eshop storefront.
//!
//! This crate provides:
//! - `Product`, `ProductCatalog` and the shared `Inventory`
//! - `Client` accounts and the `ClientDirectory`
//! - `Cart`/`CartProduct` line items and the `CartBook`
//! - `PaymentGateway` trait for implementing charge providers
//! - `PaymentProcessor` for the single-product checkout flow
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{Inventory, PaymentProcessor, Product, Price, Currency};
//!
//! let inventory = Inventory::default();
//! let product = inventory
//!     .insert(Product::new("Test Product", Price::new(19.99, Currency::USD)).with_count(10))
//!     .await;
//!
//! let processor = PaymentProcessor::new(gateway, inventory.clone());
//! match processor.process_payment(&product, &token, &client).await {
//!     Ok(charge) => println!("paid: {}", charge.id),
//!     Err(e) => println!("refused: {}", e),
//! }
//! ```

pub mod cart;
pub mod checkout;
pub mod client;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod product;

// Re-exports for convenience
pub use cart::{Cart, CartBook, CartProduct};
pub use checkout::{PaymentOutcome, PaymentProcessor};
pub use client::{Client, ClientDirectory, NewClient};
pub use error::{ShopError, ShopResult, OUT_OF_STOCK_MESSAGE};
pub use gateway::{BoxedPaymentGateway, Charge, ChargeRequest, ChargeStatus, PaymentGateway};
pub use inventory::Inventory;
pub use product::{total_stock, Currency, Price, Product, ProductCatalog};
