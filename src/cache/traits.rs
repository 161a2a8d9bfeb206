//! Backing-store capability consumed by the store manager.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::http::Response;

/// A stored response together with the time it was written.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}

/// Opaque persistence of named stores mapping request keys to responses.
///
/// Implementations do not interpret store names; naming and versioning are
/// imposed by [`CacheStoreManager`](super::CacheStoreManager).
#[async_trait]
pub trait BackingStore: Send + Sync {
  /// Create the named store if it does not exist.
  async fn open(&self, name: &str) -> Result<()>;

  /// Look up a response by request key.
  async fn match_entry(&self, store: &str, key: &str) -> Result<Option<CachedEntry>>;

  /// Write (or replace) the response for a request key, creating the store if needed.
  async fn put(&self, store: &str, key: &str, url: &str, response: &Response) -> Result<()>;

  /// Delete a store and all its entries. Returns whether it existed.
  async fn delete(&self, name: &str) -> Result<bool>;

  /// Names of every existing store.
  async fn list_names(&self) -> Result<Vec<String>>;

  /// URLs stored in the named store.
  async fn list_urls(&self, store: &str) -> Result<Vec<String>>;
}
