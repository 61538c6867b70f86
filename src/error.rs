//! Error types for the caching engine.
//!
//! The binary converts these into `color_eyre` reports at its boundary.

use thiserror::Error;

/// Result type alias for engine operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Failures surfaced by lifecycle triggers.
#[derive(Error, Debug)]
pub enum AgentError {
  #[error("setup of generation {label} failed: {reason}")]
  Setup { label: String, reason: String },

  #[error("upgrade to generation {label} failed: {reason}")]
  Upgrade { label: String, reason: String },

  #[error("network request to {url} failed: {source}")]
  Network {
    url: String,
    #[source]
    source: NetworkError,
  },

  #[error("{url} is unavailable: network failed and no stored response exists")]
  Unavailable { url: String },
}

/// Failures of the persistent store.
#[derive(Error, Debug)]
pub enum StoreError {
  #[error("sqlite: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("stored headers are not valid JSON: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("store task failed: {0}")]
  Task(#[from] tokio::task::JoinError),

  #[error("store lock poisoned")]
  Poisoned,

  #[error("no store exists for generation {0}")]
  UnknownStore(String),

  #[error("failed to create store directory: {0}")]
  Io(#[from] std::io::Error),
}

/// Failures of a single network attempt.
#[derive(Error, Debug)]
pub enum NetworkError {
  #[error("request failed: {0}")]
  Request(#[source] reqwest::Error),

  #[error("failed to read response body: {0}")]
  Body(#[source] reqwest::Error),

  #[error("request rejected: {0}")]
  Rejected(String),
}

/// Failures persisting client-control state.
#[derive(Error, Debug)]
pub enum StateError {
  #[error("failed to access state file: {0}")]
  Io(#[from] std::io::Error),

  #[error("state file is corrupt: {0}")]
  Json(#[from] serde_json::Error),
}
