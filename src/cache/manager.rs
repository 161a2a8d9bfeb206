//! Named, versioned store lifecycle on top of a [`BackingStore`].

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::traits::BackingStore;
use crate::config::Config;
use crate::http::{Request, Response};

/// Logical purpose of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreRole {
  /// Application shell and seeded core assets
  Core,
  Images,
  /// Responses from the API origin
  Api,
}

impl StoreRole {
  pub const ALL: [StoreRole; 3] = [StoreRole::Core, StoreRole::Images, StoreRole::Api];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Core => "core",
      Self::Images => "images",
      Self::Api => "api",
    }
  }
}

impl fmt::Display for StoreRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The current store name of every role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
  pub core: String,
  pub images: String,
  pub api: String,
}

impl StoreNames {
  /// Derive names from the configured prefix and per-role generations.
  ///
  /// Core is `{name}-v{generation}`, other roles `{name}-{role}-v{generation}`,
  /// with dots in the generation replaced by dashes.
  pub fn from_config(config: &Config) -> Self {
    let slug = |generation: &str| generation.trim().replace('.', "-");

    Self {
      core: format!("{}-v{}", config.name, slug(config.core_generation())),
      images: format!(
        "{}-{}-v{}",
        config.name,
        StoreRole::Images,
        slug(&config.stores.images)
      ),
      api: format!("{}-{}-v{}", config.name, StoreRole::Api, slug(&config.stores.api)),
    }
  }

  pub fn for_role(&self, role: StoreRole) -> &str {
    match role {
      StoreRole::Core => &self.core,
      StoreRole::Images => &self.images,
      StoreRole::Api => &self.api,
    }
  }

  pub fn contains(&self, name: &str) -> bool {
    StoreRole::ALL.iter().any(|role| self.for_role(*role) == name)
  }
}

/// Owns all store handles and the naming scheme.
///
/// Writes to the same store are serialized through a per-store lock; reads
/// and writes to different stores proceed independently.
pub struct CacheStoreManager {
  backend: Arc<dyn BackingStore>,
  names: StoreNames,
  write_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CacheStoreManager {
  pub fn new(backend: Arc<dyn BackingStore>, names: StoreNames) -> Self {
    Self {
      backend,
      names,
      write_locks: Mutex::new(HashMap::new()),
    }
  }

  pub fn names(&self) -> &StoreNames {
    &self.names
  }

  /// Open (creating if absent) the current store for `role`.
  ///
  /// Returns `None` when the backing storage is unavailable; callers treat
  /// that as a cache miss.
  pub async fn open(&self, role: StoreRole) -> Option<StoreHandle> {
    let name = self.names.for_role(role);

    if let Err(e) = self.backend.open(name).await {
      warn!(store = name, "Store unavailable, treating as cache miss: {}", e);
      return None;
    }

    Some(StoreHandle {
      name: name.to_string(),
      backend: Arc::clone(&self.backend),
      write_lock: self.write_lock(name),
    })
  }

  /// Delete every store that is not the current store of some role.
  ///
  /// Deletions run concurrently; a failed deletion is logged and the rest
  /// still proceed. Returns the names actually deleted.
  pub async fn evict_stale(&self) -> Result<Vec<String>> {
    let existing = self.backend.list_names().await?;
    let stale: Vec<String> = existing
      .into_iter()
      .filter(|name| !self.names.contains(name))
      .collect();

    Ok(self.delete_stores(stale).await)
  }

  /// Unconditionally delete every store. Returns how many were deleted.
  pub async fn delete_all(&self) -> Result<usize> {
    let existing = self.backend.list_names().await?;
    let total = existing.len();
    let deleted = self.delete_stores(existing).await;

    if deleted.len() < total {
      return Err(eyre!(
        "Deleted {} of {} stores; see log for failures",
        deleted.len(),
        total
      ));
    }

    info!(count = total, "Cleared all stores");
    Ok(total)
  }

  /// Names of every store present in the backing storage.
  pub async fn list(&self) -> Result<Vec<String>> {
    self.backend.list_names().await
  }

  /// URLs held by the named store.
  pub async fn entries(&self, name: &str) -> Result<Vec<String>> {
    self.backend.list_urls(name).await
  }

  async fn delete_stores(&self, names: Vec<String>) -> Vec<String> {
    let deletions = names.into_iter().map(|name| async move {
      info!(store = %name, "Deleting store");
      match self.backend.delete(&name).await {
        Ok(_) => Some(name),
        Err(e) => {
          warn!(store = %name, "Failed to delete store: {}", e);
          None
        }
      }
    });

    let deleted: Vec<String> = join_all(deletions).await.into_iter().flatten().collect();

    if let Ok(mut locks) = self.write_locks.lock() {
      for name in &deleted {
        locks.remove(name);
      }
    }

    deleted
  }

  fn write_lock(&self, name: &str) -> Arc<AsyncMutex<()>> {
    match self.write_locks.lock() {
      Ok(mut locks) => Arc::clone(locks.entry(name.to_string()).or_default()),
      Err(_) => Arc::new(AsyncMutex::new(())),
    }
  }
}

/// Borrowed access to one store for the duration of a request.
///
/// Every operation is best-effort: storage errors are logged and reported
/// as a miss or a skipped write, never as a failure of the request.
#[derive(Clone)]
pub struct StoreHandle {
  name: String,
  backend: Arc<dyn BackingStore>,
  write_lock: Arc<AsyncMutex<()>>,
}

impl StoreHandle {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Stored response for the request's identity, if any. Only GET
  /// requests are ever matched.
  pub async fn lookup(&self, request: &Request) -> Option<Response> {
    if !request.is_get() {
      return None;
    }

    match self.backend.match_entry(&self.name, &request.cache_key()).await {
      Ok(Some(entry)) => {
        debug!(store = %self.name, url = %request.url, "Cache hit");
        Some(entry.response)
      }
      Ok(None) => None,
      Err(e) => {
        warn!(store = %self.name, url = %request.url, "Cache lookup failed: {}", e);
        None
      }
    }
  }

  /// Store a successful response, replacing any previous one.
  ///
  /// Only GET requests with 2xx responses are written. Returns whether the
  /// write happened.
  pub async fn put(&self, request: &Request, response: &Response) -> bool {
    if !request.is_get() {
      debug!(store = %self.name, url = %request.url, method = %request.method, "Not caching non-GET request");
      return false;
    }
    if !response.is_ok() {
      debug!(store = %self.name, url = %request.url, status = response.status, "Not caching unsuccessful response");
      return false;
    }

    let _guard = self.write_lock.lock().await;
    match self
      .backend
      .put(&self.name, &request.cache_key(), request.url.as_str(), response)
      .await
    {
      Ok(()) => {
        debug!(store = %self.name, url = %request.url, "Cached response");
        true
      }
      Err(e) => {
        warn!(store = %self.name, url = %request.url, "Cache write failed: {}", e);
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::test_support::FailingStorage;

  fn names(core: &str, images: &str, api: &str) -> StoreNames {
    StoreNames {
      core: core.to_string(),
      images: images.to_string(),
      api: api.to_string(),
    }
  }

  fn request(path: &str) -> Request {
    Request::get(format!("https://app.example.com{}", path).parse().unwrap())
  }

  #[test]
  fn test_names_from_config() {
    let config = Config::from_yaml_str(crate::config::SAMPLE).unwrap();
    let names = StoreNames::from_config(&config);
    assert_eq!(names.core, "clashy-v2-1-1");
    assert_eq!(names.images, "clashy-images-v1");
    assert_eq!(names.api, "clashy-api-v1");
    assert!(names.contains("clashy-api-v1"));
    assert!(!names.contains("clashy-v2-1-0"));
  }

  #[tokio::test]
  async fn test_evict_stale_keeps_current_set() {
    let backend = Arc::new(SqliteStorage::in_memory().unwrap());
    for name in ["roleA-v1", "roleA-v2", "roleB-v1"] {
      backend.open(name).await.unwrap();
    }

    let manager = CacheStoreManager::new(backend.clone(), names("roleA-v2", "roleB-v1", "roleC-v1"));
    let deleted = manager.evict_stale().await.unwrap();

    assert_eq!(deleted, vec!["roleA-v1"]);
    assert_eq!(backend.list_names().await.unwrap(), vec!["roleA-v2", "roleB-v1"]);
  }

  #[tokio::test]
  async fn test_delete_all_is_idempotent() {
    let backend = Arc::new(SqliteStorage::in_memory().unwrap());
    let manager = CacheStoreManager::new(backend.clone(), names("c", "i", "a"));
    for role in StoreRole::ALL {
      manager.open(role).await.unwrap();
    }
    backend.open("legacy").await.unwrap();

    assert_eq!(manager.delete_all().await.unwrap(), 4);
    assert!(manager.list().await.unwrap().is_empty());
    assert_eq!(manager.delete_all().await.unwrap(), 0);
    assert!(manager.list().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_put_skips_unsuccessful_responses() {
    let backend = Arc::new(SqliteStorage::in_memory().unwrap());
    let manager = CacheStoreManager::new(backend, names("c", "i", "a"));
    let store = manager.open(StoreRole::Core).await.unwrap();

    assert!(!store.put(&request("/moved"), &Response::new(302, "")).await);
    assert!(!store.put(&request("/missing"), &Response::new(404, "")).await);
    assert!(store.put(&request("/ok"), &Response::new(200, "ok")).await);

    assert!(store.lookup(&request("/moved")).await.is_none());
    assert!(store.lookup(&request("/missing")).await.is_none());
    assert_eq!(store.lookup(&request("/ok")).await.unwrap().body, b"ok");
  }

  #[tokio::test]
  async fn test_only_get_requests_are_stored() {
    let backend = Arc::new(SqliteStorage::in_memory().unwrap());
    let manager = CacheStoreManager::new(backend.clone(), names("c", "i", "a"));
    let store = manager.open(StoreRole::Core).await.unwrap();
    let submit = Request::new(
      reqwest::Method::POST,
      "https://app.example.com/submit".parse().unwrap(),
    );

    assert!(!store.put(&submit, &Response::new(200, "order #1")).await);
    assert!(store.lookup(&submit).await.is_none());
    assert!(backend.list_urls("c").await.unwrap().is_empty());

    // a GET entry for the same URL is still not served to a POST
    assert!(store.put(&request("/submit"), &Response::new(200, "form")).await);
    assert!(store.lookup(&submit).await.is_none());
  }

  #[tokio::test]
  async fn test_roles_are_isolated() {
    let backend = Arc::new(SqliteStorage::in_memory().unwrap());
    let manager = CacheStoreManager::new(backend, names("c", "i", "a"));
    let core = manager.open(StoreRole::Core).await.unwrap();
    let images = manager.open(StoreRole::Images).await.unwrap();

    core.put(&request("/logo.png"), &Response::new(200, "core")).await;
    assert!(images.lookup(&request("/logo.png")).await.is_none());
  }

  #[tokio::test]
  async fn test_unavailable_storage_is_a_miss() {
    let manager = CacheStoreManager::new(Arc::new(FailingStorage), names("c", "i", "a"));
    assert!(manager.open(StoreRole::Core).await.is_none());
    assert!(manager.evict_stale().await.is_err());
  }

  #[tokio::test]
  async fn test_concurrent_writes_to_same_entry() {
    let backend = Arc::new(SqliteStorage::in_memory().unwrap());
    let manager = CacheStoreManager::new(backend, names("c", "i", "a"));
    let store = manager.open(StoreRole::Core).await.unwrap();

    let writes = (0..8).map(|i| {
      let store = store.clone();
      tokio::spawn(async move {
        store
          .put(&request("/same"), &Response::new(200, format!("body-{}", i)))
          .await
      })
    });
    for result in join_all(writes).await {
      assert!(result.unwrap());
    }

    let stored = store.lookup(&request("/same")).await.unwrap();
    assert!(stored.text().starts_with("body-"));
  }
}
