//! Network access for the caching engine.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::NetworkError;
use crate::http::{Request, Response};

/// A single network attempt for a request.
///
/// Any HTTP response, whatever its status, is `Ok`; only transport failures
/// are errors. Implementations never retry.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
  async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Fetcher backed by a reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, NetworkError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(agent) = user_agent {
      builder = builder.user_agent(agent);
    }

    let client = builder.build().map_err(NetworkError::Request)?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
    let scheme = request.url.scheme();
    if scheme != "http" && scheme != "https" {
      return Err(NetworkError::Rejected(format!(
        "unsupported scheme '{}'",
        scheme
      )));
    }

    let mut builder = self
      .client
      .request(request.method.clone(), request.url.clone())
      .headers(request.headers.clone());
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let response = builder.send().await.map_err(NetworkError::Request)?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(NetworkError::Body)?;

    tracing::debug!(url = %request.url, %status, bytes = body.len(), "fetched");
    Ok(Response::new(status, headers, body))
  }
}
