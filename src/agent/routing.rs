//! Per-request strategy selection.

use crate::http::Request;

/// Retrieval strategy for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Try the network, fall back to the store
  NetworkFirst,
  /// Try the store, fall back to the network
  CacheFirst,
}

/// Routes remote-data requests network-first and everything else cache-first.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
  remote_data_host: String,
}

impl RoutingPolicy {
  pub fn new(remote_data_host: impl Into<String>) -> Self {
    Self {
      remote_data_host: remote_data_host.into(),
    }
  }

  /// Pick a strategy from the request URL's host alone.
  pub fn classify(&self, request: &Request) -> Strategy {
    match request.url.host_str() {
      Some(host) if host.eq_ignore_ascii_case(&self.remote_data_host) => Strategy::NetworkFirst,
      _ => Strategy::CacheFirst,
    }
  }
}
