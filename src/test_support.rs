//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::{BackingStore, CacheStoreManager, CachedEntry, SqliteStorage, StoreNames};
use crate::config::{Config, SAMPLE};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};

/// Fetcher answering per URL with a fixed response or a transport failure.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
  routes: Mutex<HashMap<String, Option<Response>>>,
  calls: Mutex<Vec<Request>>,
}

impl ScriptedFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, url: &str, response: Response) -> Self {
    self.set(url, Some(response));
    self
  }

  pub fn fail(self, url: &str) -> Self {
    self.set(url, None);
    self
  }

  /// Replace the scripted outcome for `url`; `None` fails the fetch.
  pub fn set(&self, url: &str, outcome: Option<Response>) {
    self.routes.lock().unwrap().insert(url.to_string(), outcome);
  }

  pub fn calls_to(&self, url: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.url.as_str() == url)
      .count()
  }

  pub fn calls(&self) -> Vec<Request> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    self.calls.lock().unwrap().push(request.clone());
    let outcome = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
    match outcome {
      Some(Some(response)) => Ok(response),
      Some(None) => Err(eyre!("connection refused: {}", request.url)),
      None => Err(eyre!("no route for {}", request.url)),
    }
  }
}

/// Storage that is never available.
pub(crate) struct FailingStorage;

#[async_trait]
impl BackingStore for FailingStorage {
  async fn open(&self, name: &str) -> Result<()> {
    Err(eyre!("storage unavailable: {}", name))
  }

  async fn match_entry(&self, _store: &str, _key: &str) -> Result<Option<CachedEntry>> {
    Err(eyre!("storage unavailable"))
  }

  async fn put(&self, _store: &str, _key: &str, _url: &str, _response: &Response) -> Result<()> {
    Err(eyre!("storage unavailable"))
  }

  async fn delete(&self, _name: &str) -> Result<bool> {
    Err(eyre!("storage unavailable"))
  }

  async fn list_names(&self) -> Result<Vec<String>> {
    Err(eyre!("storage unavailable"))
  }

  async fn list_urls(&self, _store: &str) -> Result<Vec<String>> {
    Err(eyre!("storage unavailable"))
  }
}

pub(crate) fn sample_config() -> Config {
  Config::from_yaml_str(SAMPLE).unwrap()
}

pub(crate) fn memory_stores(config: &Config) -> Arc<CacheStoreManager> {
  let backend = Arc::new(SqliteStorage::in_memory().unwrap());
  Arc::new(CacheStoreManager::new(backend, StoreNames::from_config(config)))
}

/// Poll `check` until it holds, for up to about a second.
pub(crate) async fn eventually<F, Fut>(check: F) -> bool
where
  F: Fn() -> Fut,
  Fut: Future<Output = bool>,
{
  for _ in 0..100 {
    if check().await {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  check().await
}
