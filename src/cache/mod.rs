//! Generation-labelled response cache with offline support.
//!
//! This module provides:
//! - A storage trait keyed by generation label and request identity
//! - A SQLite backend for it
//! - The cache-first and network-first strategies, with background store writes

mod layer;
mod storage;
mod traits;
mod writes;

pub use layer::CacheLayer;
pub use storage::SqliteStorage;
pub use traits::{CacheStorage, Served};

#[cfg(test)]
pub use traits::CacheSource;
