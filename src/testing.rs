//! Test doubles shared by the engine's unit tests.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

use crate::agent::clients::ClientRegistry;
use crate::cache::{CacheStorage, SqliteStorage};
use crate::error::{NetworkError, StateError, StoreError};
use crate::http::{Request, RequestKey, Response};
use crate::network::Fetcher;

pub fn url(s: &str) -> Url {
  Url::parse(s).unwrap()
}

pub fn ok_response(body: &str) -> Response {
  Response::new(StatusCode::OK, HeaderMap::new(), body.to_string())
}

/// Scripted network: per-URL responses, per-URL failures, or fully offline.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
  routes: Mutex<HashMap<String, (u16, String)>>,
  failing: Mutex<HashSet<String>>,
  offline: AtomicBool,
  calls: AtomicUsize,
}

impl StubFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, url: &str, status: u16, body: &str) -> Self {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), (status, body.to_string()));
    self
  }

  pub fn fail(self, url: &str) -> Self {
    self.failing.lock().unwrap().insert(url.to_string());
    self
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Fetcher for StubFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let url = request.url.as_str();

    if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(url) {
      return Err(NetworkError::Rejected(format!("{} unreachable", url)));
    }

    let (status, body) = self
      .routes
      .lock()
      .unwrap()
      .get(url)
      .cloned()
      .unwrap_or((404, "not found".to_string()));

    Ok(Response::new(
      StatusCode::from_u16(status).unwrap(),
      HeaderMap::new(),
      body,
    ))
  }
}

/// SQLite storage with injectable faults.
pub struct FaultyStorage {
  pub inner: SqliteStorage,
  fail_delete: HashSet<String>,
  vanished: Vec<String>,
  fail_reads: bool,
  fail_writes: bool,
  put_gate: Option<Arc<Notify>>,
  puts: AtomicUsize,
}

impl FaultyStorage {
  pub fn new() -> Self {
    Self {
      inner: SqliteStorage::open_in_memory().unwrap(),
      fail_delete: HashSet::new(),
      vanished: Vec::new(),
      fail_reads: false,
      fail_writes: false,
      put_gate: None,
      puts: AtomicUsize::new(0),
    }
  }

  pub fn failing_delete(mut self, label: &str) -> Self {
    self.fail_delete.insert(label.to_string());
    self
  }

  /// List `label` as a store although it no longer exists.
  pub fn vanished(mut self, label: &str) -> Self {
    self.vanished.push(label.to_string());
    self
  }

  pub fn failing_reads(mut self) -> Self {
    self.fail_reads = true;
    self
  }

  pub fn failing_writes(mut self) -> Self {
    self.fail_writes = true;
    self
  }

  /// Hold every `put` until `gate` is notified.
  pub fn gated_puts(mut self, gate: Arc<Notify>) -> Self {
    self.put_gate = Some(gate);
    self
  }

  /// Completed `put` calls.
  pub fn puts(&self) -> usize {
    self.puts.load(Ordering::SeqCst)
  }

  fn injected(what: &str) -> StoreError {
    StoreError::Io(std::io::Error::other(format!("injected {} failure", what)))
  }
}

#[async_trait]
impl CacheStorage for FaultyStorage {
  async fn open(&self, label: &str) -> Result<(), StoreError> {
    self.inner.open(label).await
  }

  async fn delete(&self, label: &str) -> Result<bool, StoreError> {
    if self.fail_delete.contains(label) {
      return Err(Self::injected("delete"));
    }
    self.inner.delete(label).await
  }

  async fn labels(&self) -> Result<Vec<String>, StoreError> {
    let mut labels = self.vanished.clone();
    labels.extend(self.inner.labels().await?);
    Ok(labels)
  }

  async fn get(&self, label: &str, key: &RequestKey) -> Result<Option<Response>, StoreError> {
    if self.fail_reads {
      return Err(Self::injected("read"));
    }
    self.inner.get(label, key).await
  }

  async fn put(&self, label: &str, key: &RequestKey, response: Response) -> Result<(), StoreError> {
    if let Some(gate) = &self.put_gate {
      gate.notified().await;
    }
    if self.fail_writes {
      return Err(Self::injected("write"));
    }
    self.inner.put(label, key, response).await?;
    self.puts.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn put_all(
    &self,
    label: &str,
    entries: Vec<(RequestKey, Response)>,
  ) -> Result<(), StoreError> {
    if self.fail_writes {
      return Err(Self::injected("write"));
    }
    self.inner.put_all(label, entries).await
  }

  async fn entry_count(&self, label: &str) -> Result<usize, StoreError> {
    self.inner.entry_count(label).await
  }
}

/// Client registry that records calls in order.
#[derive(Default)]
pub struct RecordingClients {
  events: Mutex<Vec<String>>,
}

impl RecordingClients {
  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }
}

#[async_trait]
impl ClientRegistry for RecordingClients {
  async fn skip_waiting(&self, label: &str) -> Result<(), StateError> {
    self
      .events
      .lock()
      .unwrap()
      .push(format!("skip_waiting {}", label));
    Ok(())
  }

  async fn claim(&self, label: &str) -> Result<(), StateError> {
    self.events.lock().unwrap().push(format!("claim {}", label));
    Ok(())
  }
}
