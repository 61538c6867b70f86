//! Request and response values passed between the dispatcher, the network and the store.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::fmt;
use url::Url;

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub headers: HeaderMap,
  pub body: Option<Bytes>,
}

impl Request {
  pub fn new(method: Method, url: Url) -> Self {
    Self {
      method,
      url,
      headers: HeaderMap::new(),
      body: None,
    }
  }

  pub fn get(url: Url) -> Self {
    Self::new(Method::GET, url)
  }

  pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
    self.headers.append(name, value);
    self
  }

  pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
    self.body = Some(body.into());
    self
  }

  pub fn is_get(&self) -> bool {
    self.method == Method::GET
  }

  /// Identity under which this request's response is stored.
  pub fn key(&self) -> RequestKey {
    RequestKey::new(&self.method, &self.url)
  }
}

/// Store key for a request: method plus URL without its fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
  method: String,
  url: String,
}

impl RequestKey {
  pub fn new(method: &Method, url: &Url) -> Self {
    let mut url = url.clone();
    url.set_fragment(None);
    Self {
      method: method.as_str().to_string(),
      url: url.into(),
    }
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }
}

impl fmt::Display for RequestKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.method, self.url)
  }
}

/// A response whose body is read once.
///
/// Not `Clone`: a response headed both to the caller and to the store goes
/// through [`Response::duplicate`], which copies the body buffer.
#[derive(Debug)]
pub struct Response {
  pub status: StatusCode,
  pub headers: HeaderMap,
  body: Bytes,
}

impl Response {
  pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
    Self {
      status,
      headers,
      body: body.into(),
    }
  }

  #[cfg(test)]
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  pub fn into_body(self) -> Bytes {
    self.body
  }

  /// Any 2xx status.
  pub fn is_success(&self) -> bool {
    self.status.is_success()
  }

  /// Copy status, headers and body into an independent response.
  pub fn duplicate(&self) -> Response {
    Response {
      status: self.status,
      headers: self.headers.clone(),
      body: Bytes::copy_from_slice(&self.body),
    }
  }

  /// Header pairs in their original order, for persistence.
  ///
  /// Values are kept as raw bytes since they need not be UTF-8.
  pub fn header_pairs(&self) -> Vec<(String, Vec<u8>)> {
    self
      .headers
      .iter()
      .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
      .collect()
  }

  /// Rebuild a header map from persisted pairs, skipping any that no longer parse.
  pub fn headers_from_pairs(pairs: Vec<(String, Vec<u8>)>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
      if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_bytes(&value),
      ) {
        headers.append(name, value);
      }
    }
    headers
  }
}
