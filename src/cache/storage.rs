//! SQLite implementation of cache storage.

use async_trait::async_trait;
use reqwest::StatusCode;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::traits::CacheStorage;
use crate::error::StoreError;
use crate::http::{RequestKey, Response};

/// SQLite-based cache storage implementation.
///
/// One row in `stores` per generation label; entries cascade with their store.
/// Queries run on the blocking pool so callers only ever await.
#[derive(Clone)]
pub struct SqliteStorage {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
  /// Open (or create) the database file at `path`.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    Self::from_connection(Connection::open(path)?)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
    })
  }

  /// Run `f` against the connection on the blocking pool.
  async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
      f(&mut conn)
    })
    .await?
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- One store per generation label, in creation order (rowid)
CREATE TABLE IF NOT EXISTS stores (
    label TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses keyed by request identity
CREATE TABLE IF NOT EXISTS entries (
    label TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (label, method, url),
    FOREIGN KEY (label) REFERENCES stores(label) ON DELETE CASCADE
);
"#;

#[async_trait]
impl CacheStorage for SqliteStorage {
  async fn open(&self, label: &str) -> Result<(), StoreError> {
    let label = label.to_string();
    self
      .with_conn(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO stores (label) VALUES (?)",
          params![label],
        )?;
        Ok(())
      })
      .await
  }

  async fn delete(&self, label: &str) -> Result<bool, StoreError> {
    let label = label.to_string();
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM entries WHERE label = ?", params![label])?;
        let removed = tx.execute("DELETE FROM stores WHERE label = ?", params![label])?;
        tx.commit()?;
        Ok(removed > 0)
      })
      .await
  }

  async fn labels(&self) -> Result<Vec<String>, StoreError> {
    self
      .with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT label FROM stores ORDER BY rowid")?;
        let labels = stmt
          .query_map([], |row| row.get(0))?
          .collect::<Result<Vec<String>, _>>()?;
        Ok(labels)
      })
      .await
  }

  async fn get(&self, label: &str, key: &RequestKey) -> Result<Option<Response>, StoreError> {
    let label = label.to_string();
    let key = key.clone();
    let row = self
      .with_conn(move |conn| {
        let row: Option<(u16, String, Vec<u8>)> = conn
          .query_row(
            "SELECT status, headers, body FROM entries
             WHERE label = ? AND method = ? AND url = ?",
            params![label, key.method(), key.url()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;
        Ok(row)
      })
      .await?;

    let Some((status, headers, body)) = row else {
      return Ok(None);
    };

    let status = match StatusCode::from_u16(status) {
      Ok(status) => status,
      Err(_) => {
        tracing::warn!(status, "ignoring stored response with invalid status");
        return Ok(None);
      }
    };
    let pairs: Vec<(String, Vec<u8>)> = serde_json::from_str(&headers)?;

    Ok(Some(Response::new(
      status,
      Response::headers_from_pairs(pairs),
      body,
    )))
  }

  async fn put(&self, label: &str, key: &RequestKey, response: Response) -> Result<(), StoreError> {
    let label = label.to_string();
    let row = EntryRow::new(key, response)?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        ensure_store(&tx, &label)?;
        row.insert(&tx, &label)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn put_all(
    &self,
    label: &str,
    entries: Vec<(RequestKey, Response)>,
  ) -> Result<(), StoreError> {
    let label = label.to_string();
    let rows = entries
      .into_iter()
      .map(|(key, response)| EntryRow::new(&key, response))
      .collect::<Result<Vec<_>, _>>()?;

    self
      .with_conn(move |conn| {
        // Dropping the transaction on any error rolls back every row
        let tx = conn.transaction()?;
        ensure_store(&tx, &label)?;
        for row in &rows {
          row.insert(&tx, &label)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn entry_count(&self, label: &str) -> Result<usize, StoreError> {
    let label = label.to_string();
    self
      .with_conn(move |conn| {
        let count: i64 = conn.query_row(
          "SELECT COUNT(*) FROM entries WHERE label = ?",
          params![label],
          |row| row.get(0),
        )?;
        Ok(count as usize)
      })
      .await
  }
}

fn ensure_store(conn: &Connection, label: &str) -> Result<(), StoreError> {
  let exists = conn
    .query_row(
      "SELECT 1 FROM stores WHERE label = ?",
      params![label],
      |_| Ok(()),
    )
    .optional()?
    .is_some();

  if exists {
    Ok(())
  } else {
    Err(StoreError::UnknownStore(label.to_string()))
  }
}

/// A response flattened into column values.
struct EntryRow {
  method: String,
  url: String,
  status: u16,
  headers: String,
  body: Vec<u8>,
}

impl EntryRow {
  fn new(key: &RequestKey, response: Response) -> Result<Self, StoreError> {
    let headers = serde_json::to_string(&response.header_pairs())?;
    Ok(Self {
      method: key.method().to_string(),
      url: key.url().to_string(),
      status: response.status.as_u16(),
      headers,
      body: response.into_body().to_vec(),
    })
  }

  fn insert(&self, conn: &Connection, label: &str) -> Result<(), StoreError> {
    conn.execute(
      "INSERT OR REPLACE INTO entries (label, method, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        label,
        self.method,
        self.url,
        self.status,
        self.headers,
        self.body
      ],
    )?;
    Ok(())
  }
}
