//! Caching subsystem.
//!
//! - [`response::ResponseCache`]: bounded key → response store where every
//!   entry carries its own TTL. Backs the
//!   [`ApiOptimizer`](crate::optimizer::ApiOptimizer) and can be used on its
//!   own.
//! - [`expiry::EntryExpiry`]: the moka expiry policy that makes the
//!   per-entry TTL authoritative on insert and on overwrite.

pub mod expiry;
pub mod response;

pub use expiry::EntryExpiry;
pub use response::{CacheConfig, CacheEntry, ResponseCache};
