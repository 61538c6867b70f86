//! Cache layer that orchestrates caching logic with network fetching.

use reqwest::StatusCode;
use std::sync::Arc;

use super::traits::{CacheStorage, Served};
use super::writes::BackgroundWrites;
use crate::error::{AgentError, AgentResult};
use crate::http::{Request, RequestKey, Response};
use crate::network::Fetcher;

/// Cache layer that runs the two retrieval strategies against one generation's store.
///
/// Store writes triggered by a response are spawned in the background; the
/// response is returned without waiting for them.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  fetcher: Arc<dyn Fetcher>,
  /// Label of the store all reads and writes go to
  generation: String,
  writes: Arc<BackgroundWrites>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a cache layer for the given generation.
  pub fn new(storage: Arc<S>, fetcher: Arc<dyn Fetcher>, generation: impl Into<String>) -> Self {
    Self {
      storage,
      fetcher,
      generation: generation.into(),
      writes: Arc::new(BackgroundWrites::new()),
    }
  }

  /// Wait for every background write issued so far.
  pub async fn settle(&self) {
    self.writes.settle().await;
  }

  #[cfg(test)]
  pub fn pending_writes(&self) -> usize {
    self.writes.pending()
  }

  /// Fetch with network-first strategy.
  ///
  /// 1. Try the network - on success, store a copy and return the live response
  /// 2. On network failure, return the stored response (offline mode)
  /// 3. With neither, the request is unavailable
  pub async fn network_first(&self, request: &Request) -> AgentResult<Served> {
    match self.fetcher.fetch(request).await {
      Ok(response) => {
        // The store only ever holds successful GET responses
        if request.is_get() && response.is_success() {
          self.store_in_background(request.key(), response.duplicate());
        }
        Ok(Served::from_network(response))
      }
      Err(e) => {
        tracing::debug!(url = %request.url, error = %e, "network failed, falling back to store");
        match self.lookup(request).await {
          Some(cached) => Ok(Served::offline(cached)),
          None => Err(AgentError::Unavailable {
            url: request.url.to_string(),
          }),
        }
      }
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check the store - on a hit, return it without touching the network
  /// 2. On a miss, fetch from the network
  /// 3. Store a copy only of 200 responses to GET requests
  pub async fn cache_first(&self, request: &Request) -> AgentResult<Served> {
    if let Some(cached) = self.lookup(request).await {
      tracing::debug!(url = %request.url, "cache hit");
      return Ok(Served::from_cache(cached));
    }

    let response = self
      .fetcher
      .fetch(request)
      .await
      .map_err(|source| AgentError::Network {
        url: request.url.to_string(),
        source,
      })?;

    if request.is_get() && response.status == StatusCode::OK {
      self.store_in_background(request.key(), response.duplicate());
    } else {
      tracing::debug!(url = %request.url, status = %response.status, method = %request.method, "not storing response");
    }

    Ok(Served::from_network(response))
  }

  /// Store lookup where a read failure counts as a miss.
  async fn lookup(&self, request: &Request) -> Option<Response> {
    match self.storage.get(&self.generation, &request.key()).await {
      Ok(found) => found,
      Err(e) => {
        tracing::warn!(url = %request.url, error = %e, "store lookup failed, treating as miss");
        None
      }
    }
  }

  fn store_in_background(&self, key: RequestKey, copy: Response) {
    let storage = Arc::clone(&self.storage);
    let label = self.generation.clone();
    self.writes.spawn(key.to_string(), async move {
      storage.open(&label).await?;
      storage.put(&label, &key, copy).await
    });
  }
}
