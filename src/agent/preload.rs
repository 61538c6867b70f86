//! All-or-nothing population of a generation's store with the asset manifest.

use futures::future::try_join_all;
use std::sync::Arc;
use url::Url;

use crate::cache::CacheStorage;
use crate::error::{AgentError, AgentResult};
use crate::http::Request;
use crate::network::Fetcher;

/// Fetches the asset manifest and stores it as a single unit.
pub struct AssetPreloader<S: CacheStorage> {
  storage: Arc<S>,
  fetcher: Arc<dyn Fetcher>,
  manifest: Vec<Url>,
}

impl<S: CacheStorage> AssetPreloader<S> {
  pub fn new(storage: Arc<S>, fetcher: Arc<dyn Fetcher>, manifest: Vec<Url>) -> Self {
    Self {
      storage,
      fetcher,
      manifest,
    }
  }

  pub fn manifest(&self) -> &[Url] {
    &self.manifest
  }

  /// Fetch every manifest entry, then write them all in one transaction.
  ///
  /// Any failed fetch or non-2xx response fails the whole preload before
  /// anything is written. Returns the number of entries stored.
  pub async fn preload(&self, label: &str) -> AgentResult<usize> {
    let setup_error = |reason: String| AgentError::Setup {
      label: label.to_string(),
      reason,
    };

    let fetches = self.manifest.iter().map(|url| async move {
      let request = Request::get(url.clone());
      let response = self
        .fetcher
        .fetch(&request)
        .await
        .map_err(|e| format!("fetching {} failed: {}", url, e))?;

      if !response.is_success() {
        return Err(format!("{} answered {}", url, response.status));
      }
      Ok::<_, String>((request.key(), response))
    });

    let entries = try_join_all(fetches).await.map_err(setup_error)?;
    let count = entries.len();

    self
      .storage
      .put_all(label, entries)
      .await
      .map_err(|e| setup_error(format!("storing assets failed: {}", e)))?;

    tracing::info!(%label, count, "cached app assets");
    Ok(count)
  }
}
