//! Network-first strategy for the API origin.
//!
//! Only GET responses are stored or replayed; other methods go straight to
//! the network and get the JSON error body when it is unreachable.

use tracing::{info, warn};

use super::{fallback, Context};
use crate::cache::StoreRole;
use crate::http::{Request, Served};

pub async fn handle(cx: Context<'_>, request: &Request) -> Served {
  match cx.fetcher.fetch(request).await {
    Ok(response) => {
      if request.is_get() && response.is_ok() {
        if let Some(store) = cx.stores.open(StoreRole::Api).await {
          store.put(request, &response).await;
        }
      }
      Served::from_network(response)
    }
    Err(e) => {
      warn!(url = %request.url, method = %request.method, "API request failed: {}", e);

      if request.is_get() {
        if let Some(store) = cx.stores.open(StoreRole::Api).await {
          if let Some(cached) = store.lookup(request).await {
            info!(url = %request.url, "Serving cached API response");
            return Served::from_cache(cached);
          }
        }
      }

      Served::synthesized(fallback::api_unavailable())
    }
  }
}
