//! Detached store writes issued alongside responses.

use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinSet;

use crate::error::StoreError;

/// Tracks fire-and-forget writes so a dispatcher can wait for them to settle.
///
/// Spawning never blocks and the response path never joins a write; failures
/// end up in the log, not with the caller.
#[derive(Default)]
pub struct BackgroundWrites {
  tasks: Mutex<JoinSet<()>>,
}

impl BackgroundWrites {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start `write` on its own task.
  pub fn spawn<F>(&self, what: String, write: F)
  where
    F: Future<Output = Result<(), StoreError>> + Send + 'static,
  {
    let task = async move {
      match write.await {
        Ok(()) => tracing::debug!(%what, "background write stored"),
        Err(e) => tracing::warn!(%what, error = %e, "background write failed"),
      }
    };

    match self.tasks.lock() {
      Ok(mut tasks) => {
        tasks.spawn(task);
      }
      Err(_) => {
        // Untracked, but the write still happens
        tokio::spawn(task);
      }
    }
  }

  /// Number of writes spawned and not yet reaped by [`settle`](Self::settle).
  #[cfg(test)]
  pub fn pending(&self) -> usize {
    self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
  }

  /// Wait until every write spawned so far has finished.
  pub async fn settle(&self) {
    let mut tasks = match self.tasks.lock() {
      Ok(mut tasks) => std::mem::take(&mut *tasks),
      Err(_) => return,
    };

    while let Some(result) = tasks.join_next().await {
      if let Err(e) = result {
        tracing::warn!(error = %e, "background write task aborted");
      }
    }
  }
}
