//! Network-first strategy for top-level document loads.
//!
//! Navigation responses are not stored here; the document shell comes from
//! the core store seeded at install time.

use tracing::{info, warn};

use super::{fallback, Context};
use crate::cache::StoreRole;
use crate::http::{Request, Served};

pub async fn handle(cx: Context<'_>, request: &Request) -> Served {
  match cx.fetcher.fetch(request).await {
    Ok(response) => Served::from_network(response),
    Err(e) => {
      warn!(url = %request.url, "Navigation failed: {}", e);

      if let Some(shell) = cached_shell(cx).await {
        return shell;
      }

      info!(url = %request.url, "Serving offline page");
      Served::synthesized(fallback::offline_page(&cx.config.name, &cx.config.version))
    }
  }
}

/// First configured shell path present in the core store.
async fn cached_shell(cx: Context<'_>) -> Option<Served> {
  let store = cx.stores.open(StoreRole::Core).await?;

  for path in &cx.config.shell_paths {
    let url = match cx.config.resolve(path) {
      Ok(url) => url,
      Err(e) => {
        warn!("Skipping shell path: {}", e);
        continue;
      }
    };

    if let Some(cached) = store.lookup(&Request::get(url)).await {
      info!(path = %path, "Serving cached document shell");
      return Some(Served::from_cache(cached));
    }
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::Fetcher;
  use crate::http::{Response, ResponseSource};
  use crate::strategy::fallback::OFFLINE_INDICATOR;
  use crate::test_support::{memory_stores, sample_config, ScriptedFetcher};
  use std::sync::Arc;

  const PAGE: &str = "https://app.example.com/profile/42";

  fn html(body: &str) -> Response {
    Response::new(200, body).with_header("Content-Type", "text/html")
  }

  async fn seed(stores: &crate::cache::CacheStoreManager, url: &str, body: &str) {
    let store = stores.open(StoreRole::Core).await.unwrap();
    store.put(&Request::get(url.parse().unwrap()), &html(body)).await;
  }

  #[tokio::test]
  async fn test_network_response_returned_uncached() {
    let config = sample_config();
    let stores = memory_stores(&config);
    let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new().respond(PAGE, html("live")));
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };
    let request = Request::navigate(PAGE.parse().unwrap());

    let served = handle(cx, &request).await;
    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(served.response.text(), "live");

    let store = stores.open(StoreRole::Core).await.unwrap();
    assert!(store.lookup(&request).await.is_none());
  }

  #[tokio::test]
  async fn test_prefers_index_then_root() {
    let config = sample_config();
    let stores = memory_stores(&config);
    let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new().fail(PAGE));
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };
    let request = Request::navigate(PAGE.parse().unwrap());

    seed(&stores, "https://app.example.com/", "root shell").await;
    let served = handle(cx, &request).await;
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.text(), "root shell");

    seed(&stores, "https://app.example.com/index.html", "index shell").await;
    let served = handle(cx, &request).await;
    assert_eq!(served.response.text(), "index shell");
  }

  #[tokio::test]
  async fn test_offline_page_when_no_shell() {
    let config = sample_config();
    let stores = memory_stores(&config);
    let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new().fail(PAGE));
    let cx = Context {
      config: &config,
      stores: &stores,
      fetcher: &fetcher,
    };

    let served = handle(cx, &Request::navigate(PAGE.parse().unwrap())).await;
    assert_eq!(served.source, ResponseSource::Synthesized);
    let body = served.response.text();
    assert!(body.contains("<html"));
    assert!(body.contains(OFFLINE_INDICATOR));
    assert!(body.contains("addEventListener('online'"));
  }
}
