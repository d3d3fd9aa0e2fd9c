//! # Carts
//!
//! Each client owns at most one cart, created on first use. A cart holds one
//! `CartProduct` row per unit added.

use crate::error::{ShopError, ShopResult};
use crate::product::{Price, Product};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A line in a cart: one unit of one product
#[derive(Debug, Clone, Serialize)]
pub struct CartProduct {
    pub id: u64,
    pub cart_id: u64,
    pub product_id: u64,
    pub added_at: DateTime<Utc>,
}

/// A client's in-progress order
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: u64,
    pub client_id: u64,
    pub products: Vec<CartProduct>,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.products.len()
    }

    pub fn contains(&self, product_id: u64) -> bool {
        self.products.iter().any(|line| line.product_id == product_id)
    }

    /// Pair each line with its product. Lines whose product has left the
    /// catalog are dropped.
    pub fn lines<'a>(&'a self, lookup: &'a HashMap<u64, Product>) -> Vec<(&'a CartProduct, &'a Product)> {
        self.products
            .iter()
            .filter_map(|line| lookup.get(&line.product_id).map(|p| (line, p)))
            .collect()
    }

    /// Totals of the given lines, one per currency, in the order each
    /// currency first appears. Amounts in different currencies are never
    /// added together.
    pub fn totals(lines: &[(&CartProduct, &Product)]) -> Vec<Price> {
        let mut totals: Vec<Price> = Vec::new();
        for (_, product) in lines {
            match totals.iter_mut().find(|t| t.currency == product.price.currency) {
                Some(total) => total.amount += product.price.amount,
                None => totals.push(product.price.clone()),
            }
        }
        totals
    }
}

#[derive(Debug, Default)]
struct Book {
    carts: HashMap<u64, Cart>,
    next_cart_id: u64,
    next_line_id: u64,
}

impl Book {
    fn cart_for(&mut self, client_id: u64) -> &mut Cart {
        let next_cart_id = &mut self.next_cart_id;
        self.carts.entry(client_id).or_insert_with(|| {
            *next_cart_id += 1;
            Cart {
                id: *next_cart_id,
                client_id,
                products: Vec::new(),
                created_at: Utc::now(),
            }
        })
    }
}

/// Shared store of all carts, keyed by client
#[derive(Debug, Clone, Default)]
pub struct CartBook {
    inner: Arc<RwLock<Book>>,
}

impl CartBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The client's cart, created if it does not exist yet.
    pub async fn cart_for(&self, client_id: u64) -> Cart {
        self.inner.write().await.cart_for(client_id).clone()
    }

    /// Add one unit of a product to the client's cart.
    pub async fn add_product(&self, client_id: u64, product_id: u64) -> CartProduct {
        let mut book = self.inner.write().await;
        book.next_line_id += 1;
        let line_id = book.next_line_id;
        let cart = book.cart_for(client_id);
        let line = CartProduct {
            id: line_id,
            cart_id: cart.id,
            product_id,
            added_at: Utc::now(),
        };
        cart.products.push(line.clone());
        line
    }

    /// Remove a specific line from the client's cart.
    pub async fn remove_line(&self, client_id: u64, line_id: u64) -> ShopResult<()> {
        let mut book = self.inner.write().await;
        let cart = book.cart_for(client_id);
        let before = cart.products.len();
        cart.products.retain(|line| line.id != line_id);
        if cart.products.len() == before {
            return Err(ShopError::InvalidRequest(format!(
                "cart line {} not found",
                line_id
            )));
        }
        Ok(())
    }

    /// Remove one line for `product_id`, if the cart has one. Returns whether
    /// a line was removed.
    pub async fn remove_product(&self, client_id: u64, product_id: u64) -> bool {
        let mut book = self.inner.write().await;
        let cart = book.cart_for(client_id);
        match cart.products.iter().position(|line| line.product_id == product_id) {
            Some(index) => {
                cart.products.remove(index);
                true
            }
            None => false,
        }
    }

    /// Empty the client's cart.
    pub async fn clear(&self, client_id: u64) {
        self.inner.write().await.cart_for(client_id).products.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Currency;

    #[tokio::test]
    async fn test_cart_created_once_per_client() {
        let carts = CartBook::new();
        let first = carts.cart_for(1).await;
        let again = carts.cart_for(1).await;
        let other = carts.cart_for(2).await;

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert!(first.is_empty());
    }

    #[tokio::test]
    async fn test_add_and_remove_lines() {
        let carts = CartBook::new();
        let a = carts.add_product(1, 10).await;
        carts.add_product(1, 10).await;
        carts.add_product(1, 11).await;

        let cart = carts.cart_for(1).await;
        assert_eq!(cart.item_count(), 3);
        assert_eq!(a.cart_id, cart.id);

        assert!(carts.remove_product(1, 10).await);
        assert_eq!(carts.cart_for(1).await.item_count(), 2);
        assert!(carts.cart_for(1).await.contains(10));

        assert!(carts.remove_line(1, 999).await.is_err());
        carts.clear(1).await;
        assert!(carts.cart_for(1).await.is_empty());
        assert!(!carts.remove_product(1, 10).await);
    }

    #[tokio::test]
    async fn test_lines_and_total() {
        let carts = CartBook::new();
        carts.add_product(1, 1).await;
        carts.add_product(1, 1).await;
        carts.add_product(1, 99).await;

        let mut lookup = HashMap::new();
        let mut product = Product::new("Test Product", Price::new(10.0, Currency::USD));
        product.id = 1;
        lookup.insert(1, product);

        let cart = carts.cart_for(1).await;
        let lines = cart.lines(&lookup);
        assert_eq!(lines.len(), 2);
        assert_eq!(Cart::totals(&lines), vec![Price::from_cents(2000, Currency::USD)]);
    }

    #[tokio::test]
    async fn test_mixed_currencies_are_totalled_separately() {
        let carts = CartBook::new();
        carts.add_product(1, 1).await;
        carts.add_product(1, 2).await;
        carts.add_product(1, 1).await;

        let mut usd = Product::new("Dollar Product", Price::new(10.0, Currency::USD));
        usd.id = 1;
        let mut jpy = Product::new("Yen Product", Price::new(500.0, Currency::JPY));
        jpy.id = 2;
        let lookup = HashMap::from([(1, usd), (2, jpy)]);

        let cart = carts.cart_for(1).await;
        let totals = Cart::totals(&cart.lines(&lookup));
        assert_eq!(
            totals,
            vec![
                Price::from_cents(2000, Currency::USD),
                Price::from_cents(500, Currency::JPY),
            ]
        );
    }

    #[test]
    fn test_empty_cart_has_no_totals() {
        assert!(Cart::totals(&[]).is_empty());
    }
}
