//! Typed storefront resources served through the optimizer.
//!
//! [`Catalog`] is what page-level code talks to. Every read goes through
//! [`ApiOptimizer::batch_call`] under a stable cache key, so any number of
//! concurrent consumers of the same listing cost one backend request.
//!
//! | method                    | cache key                   | path                              |
//! |---------------------------|-----------------------------|-----------------------------------|
//! | `products()`              | `products`                  | `/api/products`                   |
//! | `featured_products()`     | `products:featured`         | `/api/products?featured=true`     |
//! | `products_in_category(s)` | `products:category:<s>`     | `/api/products?category=<s>`      |
//! | `product(id)`             | `product:<id>`              | `/api/products/<id>`              |
//! | `categories()`            | `categories`                | `/api/categories`                 |
//!
//! Ids and slugs are used verbatim in cache keys and percent-encoded in paths.

pub mod types;

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::Result;
use crate::client::ApiSource;
use crate::optimizer::{ApiOptimizer, Priority, QueuedCall};

pub use types::{Category, Product};

/// Cache keys used by the catalog.
pub mod keys {
    pub const PRODUCTS: &str = "products";
    pub const FEATURED_PRODUCTS: &str = "products:featured";
    pub const CATEGORIES: &str = "categories";

    /// Matches every product-derived key (listings and single products).
    pub const PRODUCT_PATTERN: &str = "^product";

    pub fn product(id: &str) -> String {
        format!("product:{id}")
    }

    pub fn category_products(slug: &str) -> String {
        format!("products:category:{slug}")
    }
}

mod paths {
    use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

    pub const PRODUCTS: &str = "/api/products";
    pub const FEATURED_PRODUCTS: &str = "/api/products?featured=true";
    pub const CATEGORIES: &str = "/api/categories";

    /// Everything except RFC 3986 unreserved characters.
    const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
        .remove(b'-')
        .remove(b'.')
        .remove(b'_')
        .remove(b'~');

    pub fn product(id: &str) -> String {
        format!("{PRODUCTS}/{}", utf8_percent_encode(id, COMPONENT))
    }

    pub fn category_products(slug: &str) -> String {
        format!("{PRODUCTS}?category={}", utf8_percent_encode(slug, COMPONENT))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn plain_values_pass_through() {
            assert_eq!(product("p1"), "/api/products/p1");
            assert_eq!(
                category_products("riding-boots"),
                "/api/products?category=riding-boots"
            );
        }

        #[test]
        fn reserved_characters_are_encoded() {
            assert_eq!(product("a/b#c"), "/api/products/a%2Fb%23c");
            assert_eq!(
                category_products("tack & feed"),
                "/api/products?category=tack%20%26%20feed"
            );
        }
    }
}

/// Storefront catalog backed by an [`ApiSource`] and an [`ApiOptimizer`].
#[derive(Clone)]
pub struct Catalog {
    source: Arc<dyn ApiSource>,
    optimizer: ApiOptimizer<Value>,
}

impl Catalog {
    pub fn new(source: Arc<dyn ApiSource>, optimizer: ApiOptimizer<Value>) -> Self {
        Self { source, optimizer }
    }

    pub fn optimizer(&self) -> &ApiOptimizer<Value> {
        &self.optimizer
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        let value = self.load(keys::PRODUCTS, paths::PRODUCTS.to_string()).await?;
        types::decode_list(value, "products")
    }

    pub async fn featured_products(&self) -> Result<Vec<Product>> {
        let value = self
            .load(keys::FEATURED_PRODUCTS, paths::FEATURED_PRODUCTS.to_string())
            .await?;
        types::decode_list(value, "products")
    }

    pub async fn products_in_category(&self, slug: &str) -> Result<Vec<Product>> {
        let value = self
            .load(keys::category_products(slug), paths::category_products(slug))
            .await?;
        types::decode_list(value, "products")
    }

    pub async fn product(&self, id: &str) -> Result<Product> {
        let value = self.load(keys::product(id), paths::product(id)).await?;
        types::decode_one(value, "product")
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        let value = self
            .load(keys::CATEGORIES, paths::CATEGORIES.to_string())
            .await?;
        types::decode_list(value, "categories")
    }

    /// Queue the data every page needs: categories first, then the product
    /// listing, then featured products.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context (see [`ApiOptimizer::queue_call`]).
    pub fn preload_critical(&self) {
        info!("preloading critical catalog data");
        self.optimizer.queue_call(
            self.queued(keys::CATEGORIES, paths::CATEGORIES.to_string())
                .priority(Priority::High),
        );
        self.optimizer.queue_call(
            self.queued(keys::PRODUCTS, paths::PRODUCTS.to_string())
                .priority(Priority::Medium),
        );
        self.optimizer.queue_call(
            self.queued(
                keys::FEATURED_PRODUCTS,
                paths::FEATURED_PRODUCTS.to_string(),
            )
            .priority(Priority::Low),
        );
    }

    /// Queue a category listing. It waits until the category list itself is
    /// cached, so an unknown slug is never requested blind.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context (see [`ApiOptimizer::queue_call`]).
    pub fn preload_category(&self, slug: &str) {
        self.optimizer.queue_call(
            self.queued(keys::category_products(slug), paths::category_products(slug))
                .priority(Priority::Low)
                .depends_on(keys::CATEGORIES),
        );
    }

    /// Drop every cached product listing and product. Returns the count.
    pub fn invalidate_products(&self) -> Result<usize> {
        self.optimizer.clear_cache(Some(keys::PRODUCT_PATTERN))
    }

    async fn load(&self, key: impl Into<String>, path: String) -> Result<Value> {
        let source = Arc::clone(&self.source);
        self.optimizer
            .batch_call(key, move || async move { source.fetch(&path).await }, None)
            .await
    }

    fn queued(&self, key: impl Into<String>, path: String) -> QueuedCall<Value> {
        let source = Arc::clone(&self.source);
        QueuedCall::new(key, move || async move { source.fetch(&path).await })
    }
}
