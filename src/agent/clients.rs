//! Client-control notifications: activation and claiming of open pages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StateError;

/// Hands control of client contexts to a generation.
#[async_trait]
pub trait ClientRegistry: Send + Sync + 'static {
  /// Activate `label` now instead of waiting for old instances to go away.
  async fn skip_waiting(&self, label: &str) -> Result<(), StateError>;

  /// Make `label` control every already-open client without a reload.
  async fn claim(&self, label: &str) -> Result<(), StateError>;
}

/// Persisted activation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
  /// Generation whose setup last completed
  pub installed: Option<String>,
  /// Generation currently in control
  pub active: Option<String>,
  pub activated_at: Option<DateTime<Utc>>,
  pub claimed_at: Option<DateTime<Utc>>,
}

/// Client registry backed by a JSON file.
pub struct StateFile {
  path: PathBuf,
  lock: tokio::sync::Mutex<()>,
}

impl StateFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: tokio::sync::Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Read the current state; a missing file is the empty state.
  pub async fn load(&self) -> Result<AgentState, StateError> {
    match tokio::fs::read(&self.path).await {
      Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AgentState::default()),
      Err(e) => Err(e.into()),
    }
  }

  async fn update<F>(&self, f: F) -> Result<(), StateError>
  where
    F: FnOnce(&mut AgentState) + Send,
  {
    let _guard = self.lock.lock().await;
    let mut state = self.load().await?;
    f(&mut state);

    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(&state)?;
    tokio::fs::write(&self.path, json).await?;
    Ok(())
  }
}

#[async_trait]
impl ClientRegistry for StateFile {
  async fn skip_waiting(&self, label: &str) -> Result<(), StateError> {
    let label = label.to_string();
    self
      .update(move |state| {
        state.installed = Some(label.clone());
        state.active = Some(label);
        state.activated_at = Some(Utc::now());
      })
      .await
  }

  async fn claim(&self, label: &str) -> Result<(), StateError> {
    let label = label.to_string();
    self
      .update(move |state| {
        state.active = Some(label);
        state.claimed_at = Some(Utc::now());
      })
      .await
  }
}
