//! Core traits and types for the caching system.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::http::{RequestKey, Response};

/// Trait for generation-labelled cache storage backends.
///
/// Each label names one store; a store maps request keys to responses.
/// Every method is a suspension point for the caller.
#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
  /// Create the store for `label`, or open it if it already exists.
  async fn open(&self, label: &str) -> Result<(), StoreError>;

  /// Delete the store for `label` with all of its entries.
  /// Returns false if no such store existed.
  async fn delete(&self, label: &str) -> Result<bool, StoreError>;

  /// Labels of all existing stores, oldest first.
  async fn labels(&self) -> Result<Vec<String>, StoreError>;

  /// Look up a stored response.
  async fn get(&self, label: &str, key: &RequestKey) -> Result<Option<Response>, StoreError>;

  /// Store a response, replacing any previous one for the same key.
  async fn put(&self, label: &str, key: &RequestKey, response: Response) -> Result<(), StoreError>;

  /// Store several responses in one transaction: either all land or none do.
  async fn put_all(&self, label: &str, entries: Vec<(RequestKey, Response)>)
    -> Result<(), StoreError>;

  /// Number of entries in the store for `label`.
  async fn entry_count(&self, label: &str) -> Result<usize, StoreError>;
}

/// A response handed back to the dispatcher, with where it came from.
#[derive(Debug)]
pub struct Served {
  pub response: Response,
  pub source: CacheSource,
}

impl Served {
  /// Fresh response from the network.
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Network,
    }
  }

  /// Stored response served without touching the network.
  pub fn from_cache(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Cache,
    }
  }

  /// Stored response served because the network failed.
  pub fn offline(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Offline,
    }
  }
}

/// Indicates where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Live network response
  Network,
  /// Cache hit, network not consulted
  Cache,
  /// Network unavailable, serving the stored copy
  Offline,
}

impl std::fmt::Display for CacheSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      CacheSource::Network => "network",
      CacheSource::Cache => "cache",
      CacheSource::Offline => "offline",
    };
    f.write_str(name)
  }
}
