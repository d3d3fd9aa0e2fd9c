//! # Inventory
//!
//! Shared, lock-guarded access to the product catalog.
//!
//! Stock is only ever taken through [`Inventory::reserve_unit`], which checks
//! and decrements under the write lock, so two checkouts racing for the last
//! unit cannot both get it.

use crate::error::{ShopError, ShopResult};
use crate::product::{Product, ProductCatalog};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    catalog: Arc<RwLock<ProductCatalog>>,
}

impl Inventory {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Add a product and return it with its assigned id.
    pub async fn insert(&self, mut product: Product) -> Product {
        let mut catalog = self.catalog.write().await;
        product.id = catalog.add(product.clone());
        product
    }

    pub async fn get(&self, id: u64) -> Option<Product> {
        self.catalog.read().await.get(id).cloned()
    }

    /// Fetch a product or fail with `ProductNotFound`.
    pub async fn require(&self, id: u64) -> ShopResult<Product> {
        self.get(id)
            .await
            .ok_or(ShopError::ProductNotFound { product_id: id })
    }

    /// Active products in id order.
    pub async fn active_products(&self) -> Vec<Product> {
        let catalog = self.catalog.read().await;
        let mut products: Vec<Product> = catalog.active_products().cloned().collect();
        products.sort_by_key(|p| p.id);
        products
    }

    /// Active products matching `query` on name or description.
    pub async fn search(&self, query: &str) -> Vec<Product> {
        let catalog = self.catalog.read().await;
        let mut products: Vec<Product> = catalog.search(query).cloned().collect();
        products.sort_by_key(|p| p.id);
        products
    }

    pub async fn len(&self) -> usize {
        self.catalog.read().await.products.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Take one unit of stock. Fails with `OutOfStock` at zero.
    pub async fn reserve_unit(&self, id: u64) -> ShopResult<u32> {
        let mut catalog = self.catalog.write().await;
        let product = catalog
            .get_mut(id)
            .ok_or(ShopError::ProductNotFound { product_id: id })?;
        if product.count == 0 {
            return Err(ShopError::OutOfStock);
        }
        product.count -= 1;
        debug!(product_id = id, remaining = product.count, "reserved one unit");
        Ok(product.count)
    }

    /// Return a unit taken by `reserve_unit`.
    pub async fn release_unit(&self, id: u64) -> ShopResult<u32> {
        let mut catalog = self.catalog.write().await;
        let product = catalog
            .get_mut(id)
            .ok_or(ShopError::ProductNotFound { product_id: id })?;
        product.count = product.count.saturating_add(1);
        debug!(product_id = id, remaining = product.count, "released one unit");
        Ok(product.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{Currency, Price};

    async fn inventory_with(count: u32) -> (Inventory, u64) {
        let inventory = Inventory::default();
        let product = inventory
            .insert(Product::new("Widget", Price::new(10.0, Currency::USD)).with_count(count))
            .await;
        (inventory, product.id)
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let (inventory, id) = inventory_with(2).await;

        assert_eq!(inventory.reserve_unit(id).await.unwrap(), 1);
        assert_eq!(inventory.reserve_unit(id).await.unwrap(), 0);
        assert!(matches!(
            inventory.reserve_unit(id).await,
            Err(ShopError::OutOfStock)
        ));

        assert_eq!(inventory.release_unit(id).await.unwrap(), 1);
        assert_eq!(inventory.get(id).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let inventory = Inventory::default();
        assert!(matches!(
            inventory.reserve_unit(42).await,
            Err(ShopError::ProductNotFound { product_id: 42 })
        ));
        assert!(inventory.require(42).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let (inventory, id) = inventory_with(3).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let inventory = inventory.clone();
            handles.push(tokio::spawn(async move { inventory.reserve_unit(id).await }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
        assert_eq!(inventory.get(id).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_search_and_listing_are_id_ordered() {
        let inventory = Inventory::default();
        inventory
            .insert(Product::new("Product 1", Price::new(10.99, Currency::USD)).with_count(5))
            .await;
        inventory
            .insert(
                Product::new("Product with Stock", Price::new(15.99, Currency::USD))
                    .with_count(10),
            )
            .await;

        let names: Vec<String> = inventory
            .active_products()
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Product 1", "Product with Stock"]);
        assert_eq!(inventory.search("stock").await.len(), 1);
    }
}
