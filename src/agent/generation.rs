//! Generation bookkeeping: the current store and reclaiming superseded ones.

use futures::future::join_all;
use std::sync::Arc;

use crate::cache::CacheStorage;
use crate::error::{AgentError, AgentResult};

/// Outcome of reclaiming superseded generations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
  /// Labels whose stores were deleted
  pub deleted: Vec<String>,
  /// Labels whose deletion failed, with the error
  pub failed: Vec<(String, String)>,
}

impl UpgradeReport {
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
  }
}

/// Owns the current generation label and the stores of all generations.
pub struct GenerationManager<S: CacheStorage> {
  storage: Arc<S>,
  current: String,
}

impl<S: CacheStorage> GenerationManager<S> {
  pub fn new(storage: Arc<S>, current: impl Into<String>) -> Self {
    Self {
      storage,
      current: current.into(),
    }
  }

  pub fn current(&self) -> &str {
    &self.current
  }

  /// Create the current generation's store, or open it if it already exists.
  pub async fn open_current(&self) -> AgentResult<()> {
    self
      .storage
      .open(&self.current)
      .await
      .map_err(|e| AgentError::Setup {
        label: self.current.clone(),
        reason: format!("cannot open store: {}", e),
      })
  }

  /// Delete every store whose label is not the current one.
  ///
  /// Deletions run concurrently and independently: a failed deletion is
  /// logged and reported, and never stops the others.
  pub async fn reclaim(&self) -> AgentResult<UpgradeReport> {
    let labels = self
      .storage
      .labels()
      .await
      .map_err(|e| AgentError::Upgrade {
        label: self.current.clone(),
        reason: format!("cannot list stores: {}", e),
      })?;

    let superseded: Vec<String> = labels
      .into_iter()
      .filter(|label| *label != self.current)
      .collect();

    let deletions = superseded.into_iter().map(|label| async move {
      tracing::info!(%label, "deleting superseded store");
      let result = self.storage.delete(&label).await;
      (label, result)
    });

    let mut report = UpgradeReport::default();
    for (label, result) in join_all(deletions).await {
      match result {
        Ok(true) => report.deleted.push(label),
        Ok(false) => tracing::debug!(%label, "superseded store already gone"),
        Err(e) => {
          tracing::warn!(%label, error = %e, "failed to delete superseded store");
          report.failed.push((label, e.to_string()));
        }
      }
    }

    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::testing::FaultyStorage;

  async fn storage_with(labels: &[&str]) -> Arc<SqliteStorage> {
    let storage = SqliteStorage::open_in_memory().unwrap();
    for label in labels {
      storage.open(label).await.unwrap();
    }
    Arc::new(storage)
  }

  #[tokio::test]
  async fn test_reclaim_keeps_only_current() {
    let label_sets: [&[&str]; 5] = [
      &[],
      &["v6"],
      &["v4", "v5"],
      &["v4", "v6", "v5"],
      &["v6", "v7", "legacy"],
    ];

    for labels in label_sets {
      let storage = storage_with(labels).await;
      let manager = GenerationManager::new(storage.clone(), "v6");

      let report = manager.reclaim().await.unwrap();
      assert!(report.is_clean());

      let remaining = storage.labels().await.unwrap();
      let expected: Vec<String> = labels
        .iter()
        .filter(|l| **l == "v6")
        .map(|l| l.to_string())
        .collect();
      assert_eq!(remaining, expected, "starting from {:?}", labels);
      assert_eq!(report.deleted.len(), labels.len() - expected.len());
    }
  }

  #[tokio::test]
  async fn test_reclaim_with_nothing_superseded_is_noop() {
    let storage = storage_with(&["v6"]).await;
    let manager = GenerationManager::new(storage, "v6");

    assert_eq!(manager.reclaim().await.unwrap(), UpgradeReport::default());
  }

  #[tokio::test]
  async fn test_failed_deletion_does_not_block_siblings() {
    let storage = FaultyStorage::new().failing_delete("v4");
    for label in ["v3", "v4", "v5", "v6"] {
      storage.open(label).await.unwrap();
    }
    let storage = Arc::new(storage);
    let manager = GenerationManager::new(storage.clone(), "v6");

    let report = manager.reclaim().await.unwrap();

    assert_eq!(report.deleted, vec!["v3", "v5"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "v4");
    assert_eq!(storage.labels().await.unwrap(), vec!["v4", "v6"]);
  }

  #[tokio::test]
  async fn test_store_gone_before_deletion_is_not_reported() {
    let storage = FaultyStorage::new().vanished("v4");
    storage.open("v5").await.unwrap();
    storage.open("v6").await.unwrap();
    let manager = GenerationManager::new(Arc::new(storage), "v6");

    let report = manager.reclaim().await.unwrap();

    assert_eq!(report.deleted, vec!["v5"]);
    assert!(report.is_clean());
  }

  #[tokio::test]
  async fn test_open_current_is_idempotent() {
    let storage = storage_with(&[]).await;
    let manager = GenerationManager::new(storage.clone(), "v6");

    manager.open_current().await.unwrap();
    manager.open_current().await.unwrap();
    assert_eq!(storage.labels().await.unwrap(), vec!["v6"]);
  }
}
