//! The caching decision engine.
//!
//! `Agent` ties the lifecycle together:
//! - setup: open the current generation's store and preload the asset manifest
//! - upgrade: delete superseded generations and claim open clients
//! - intercept: route a request to network-first or cache-first

pub mod clients;
mod generation;
mod preload;
mod routing;

use std::sync::Arc;
use url::Url;

use crate::cache::{CacheLayer, CacheStorage, Served};
use crate::error::{AgentError, AgentResult};
use crate::http::Request;
use crate::network::Fetcher;

use clients::ClientRegistry;
use generation::GenerationManager;
use preload::AssetPreloader;
use routing::{RoutingPolicy, Strategy};

pub use clients::StateFile;
pub use generation::UpgradeReport;

/// What the engine needs to know about the deployed build.
#[derive(Debug, Clone)]
pub struct AgentSettings {
  /// Label of the current generation
  pub generation: String,
  /// Resources that must be available offline, in order
  pub manifest: Vec<Url>,
  /// Host whose requests go network-first
  pub remote_data_host: String,
}

/// Result of a completed setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
  pub generation: String,
  pub preloaded: usize,
}

/// Caching engine for one generation.
pub struct Agent<S: CacheStorage> {
  generations: GenerationManager<S>,
  preloader: AssetPreloader<S>,
  routing: RoutingPolicy,
  layer: CacheLayer<S>,
  clients: Arc<dyn ClientRegistry>,
}

impl<S: CacheStorage> Agent<S> {
  pub fn new(
    settings: AgentSettings,
    storage: Arc<S>,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<dyn ClientRegistry>,
  ) -> Self {
    Self {
      generations: GenerationManager::new(Arc::clone(&storage), settings.generation.clone()),
      preloader: AssetPreloader::new(
        Arc::clone(&storage),
        Arc::clone(&fetcher),
        settings.manifest,
      ),
      routing: RoutingPolicy::new(settings.remote_data_host),
      layer: CacheLayer::new(storage, fetcher, settings.generation),
      clients,
    }
  }

  pub fn generation(&self) -> &str {
    self.generations.current()
  }

  /// Install the current generation.
  ///
  /// Fails, leaving no assets from this run behind, if the store cannot be
  /// opened or any manifest entry cannot be fetched and stored. On success the
  /// generation is activated at once rather than waiting for older instances.
  pub async fn on_setup(&self) -> AgentResult<SetupReport> {
    let label = self.generation();
    tracing::info!(%label, assets = self.preloader.manifest().len(), "installing");

    self.generations.open_current().await?;
    let preloaded = self.preloader.preload(label).await?;

    self
      .clients
      .skip_waiting(label)
      .await
      .map_err(|e| AgentError::Setup {
        label: label.to_string(),
        reason: format!("cannot activate: {}", e),
      })?;

    Ok(SetupReport {
      generation: label.to_string(),
      preloaded,
    })
  }

  /// Activate the current generation: drop every other store, then claim clients.
  pub async fn on_upgrade(&self) -> AgentResult<UpgradeReport> {
    let label = self.generation();
    tracing::info!(%label, "activating");

    let report = self.generations.reclaim().await?;

    self
      .clients
      .claim(label)
      .await
      .map_err(|e| AgentError::Upgrade {
        label: label.to_string(),
        reason: format!("cannot claim clients: {}", e),
      })?;

    Ok(report)
  }

  /// Answer an intercepted request.
  pub async fn intercept(&self, request: &Request) -> AgentResult<Served> {
    let strategy = self.routing.classify(request);
    tracing::debug!(url = %request.url, method = %request.method, ?strategy, "intercepted");

    match strategy {
      Strategy::NetworkFirst => self.layer.network_first(request).await,
      Strategy::CacheFirst => self.layer.cache_first(request).await,
    }
  }

  /// Wait for all background work started by earlier intercepts.
  pub async fn settle(&self) {
    self.layer.settle().await;
  }
}
