//! Stale-while-revalidate strategy for all other resources.

use std::sync::Arc;
use tracing::{debug, info};

use super::{fallback, Context};
use crate::cache::{StoreHandle, StoreRole};
use crate::fetch::Fetcher;
use crate::http::{Request, Served};

/// Serve a cached copy immediately and refresh it in the background, or
/// fetch synchronously on a miss.
pub async fn handle(cx: Context<'_>, request: &Request) -> Served {
  let store = cx.stores.open(StoreRole::Core).await;

  if let Some(store) = &store {
    if let Some(cached) = store.lookup(request).await {
      spawn_revalidate(store.clone(), Arc::clone(cx.fetcher), request.clone());
      return Served::from_cache(cached);
    }
  }

  match cx.fetcher.fetch(request).await {
    Ok(response) => {
      if let Some(store) = &store {
        store.put(request, &response).await;
      }
      Served::from_network(response)
    }
    Err(e) => {
      info!(url = %request.url, "Resource unavailable offline: {}", e);
      Served::synthesized(fallback::resource_unavailable())
    }
  }
}

/// Detached refresh of a cached entry. Its outcome never reaches the caller.
fn spawn_revalidate(store: StoreHandle, fetcher: Arc<dyn Fetcher>, request: Request) {
  tokio::spawn(async move {
    match fetcher.fetch(&request).await {
      Ok(response) => {
        if store.put(&request, &response).await {
          debug!(url = %request.url, "Revalidated cached resource");
        }
      }
      Err(e) => {
        debug!(url = %request.url, "Background refresh failed: {}", e);
      }
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::{Response, ResponseSource};
  use crate::test_support::{eventually, memory_stores, sample_config, ScriptedFetcher};

  const SCRIPT: &str = "https://app.example.com/app.js";

  fn js(body: &str) -> Response {
    Response::new(200, body).with_header("Content-Type", "text/javascript")
  }

  fn script_request() -> Request {
    Request::get(SCRIPT.parse().unwrap())
  }

  #[tokio::test]
  async fn test_hit_returns_cached_then_refreshes() {
    let config = sample_config();
    let stores = memory_stores(&config);
    let scripted = Arc::new(ScriptedFetcher::new().respond(SCRIPT, js("v2")));
    let fetcher: Arc<dyn Fetcher> = scripted.clone();
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };
    let store = stores.open(StoreRole::Core).await.unwrap();
    store.put(&script_request(), &js("v1")).await;

    let served = handle(cx, &script_request()).await;
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.text(), "v1");

    let refreshed = eventually(|| {
      let store = store.clone();
      async move {
        store
          .lookup(&script_request())
          .await
          .is_some_and(|r| r.text() == "v2")
      }
    })
    .await;
    assert!(refreshed);
    assert_eq!(served.response.text(), "v1");
  }

  #[tokio::test]
  async fn test_failed_refresh_is_swallowed() {
    let config = sample_config();
    let stores = memory_stores(&config);
    let scripted = Arc::new(ScriptedFetcher::new().fail(SCRIPT));
    let fetcher: Arc<dyn Fetcher> = scripted.clone();
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };
    let store = stores.open(StoreRole::Core).await.unwrap();
    store.put(&script_request(), &js("v1")).await;

    let served = handle(cx, &script_request()).await;
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response, js("v1"));

    let probe = Arc::clone(&scripted);
    assert!(eventually(|| {
      let probe = Arc::clone(&probe);
      async move { probe.calls_to(SCRIPT) == 1 }
    })
    .await);
    assert_eq!(store.lookup(&script_request()).await.unwrap(), js("v1"));
  }

  #[tokio::test]
  async fn test_miss_fetches_and_stores() {
    let config = sample_config();
    let stores = memory_stores(&config);
    let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new().respond(SCRIPT, js("fresh")));
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };

    let served = handle(cx, &script_request()).await;
    assert_eq!(served.source, ResponseSource::Network);

    let store = stores.open(StoreRole::Core).await.unwrap();
    assert_eq!(store.lookup(&script_request()).await.unwrap(), js("fresh"));
  }

  #[tokio::test]
  async fn test_post_is_never_cached_or_replayed() {
    const SUBMIT: &str = "https://app.example.com/submit";
    let config = sample_config();
    let stores = memory_stores(&config);
    let scripted = Arc::new(ScriptedFetcher::new().respond(SUBMIT, Response::new(200, "order #1")));
    let fetcher: Arc<dyn Fetcher> = scripted.clone();
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };
    let submit = Request::new(reqwest::Method::POST, SUBMIT.parse().unwrap());

    let first = handle(cx, &submit).await;
    assert_eq!(first.source, ResponseSource::Network);
    assert_eq!(first.response.text(), "order #1");

    scripted.set(SUBMIT, Some(Response::new(200, "order #2")));
    let second = handle(cx, &submit).await;
    assert_eq!(second.source, ResponseSource::Network);
    assert_eq!(second.response.text(), "order #2");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(scripted.calls_to(SUBMIT), 2);
    assert!(stores.entries(&stores.names().core).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_unavailable_when_offline_and_uncached() {
    let config = sample_config();
    let stores = memory_stores(&config);
    let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new().fail(SCRIPT));
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };

    let served = handle(cx, &script_request()).await;
    assert_eq!(served.source, ResponseSource::Synthesized);
    assert_eq!(served.response.status, 503);
    assert_eq!(served.response.text(), "Resource not available offline");
  }
}
