//! Saddlery - request-coalescing response cache for storefront backends
//!
//! A storefront renders many components that want the same resources at
//! the same time: the product listing, the category tree, a product page.
//! This crate keeps those requests from multiplying:
//!
//! - [`ApiOptimizer`] caches responses with a per-entry TTL, collapses
//!   concurrent identical calls into one fetch, and drains a priority queue
//!   of preload calls that may depend on other keys being cached.
//! - [`StorefrontClient`] issues authenticated JSON requests with retry.
//! - [`Catalog`] exposes typed products and categories on top of both.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use saddlery::{ApiOptimizer, Catalog, StorefrontClient};
//!
//! #[tokio::main]
//! async fn main() -> saddlery::Result<()> {
//!     let client = StorefrontClient::new("https://shop.example.com")?.with_token("token");
//!     let catalog = Catalog::new(Arc::new(client), ApiOptimizer::default());
//!
//!     // Both calls share one request to /api/products.
//!     let (a, b) = tokio::join!(catalog.products(), catalog.products());
//!     assert_eq!(a?, b?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod optimizer;
pub mod telemetry;
mod version;

pub use version::{GIT_SHA, PKG_VERSION, version_string};

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, ResponseCache};
pub use catalog::{Catalog, Category, Product};
pub use client::{ApiSource, RetryConfig, StorefrontClient};
pub use config::Config;
pub use error::{Result, SaddleryError};
pub use optimizer::{
    ApiOptimizer, CacheStats, DependencyPolicy, DrainReport, OptimizerConfig, Priority, QueuedCall,
};
