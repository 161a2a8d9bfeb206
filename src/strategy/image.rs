//! Cache-first strategy for images, with a generated placeholder as last resort.

use tracing::info;

use super::{fallback, Context};
use crate::cache::StoreRole;
use crate::http::{Request, Served};

pub async fn handle(cx: Context<'_>, request: &Request) -> Served {
  let store = cx.stores.open(StoreRole::Images).await;

  if let Some(store) = &store {
    if let Some(cached) = store.lookup(request).await {
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
      info!(url = %request.url, "Serving placeholder image: {}", e);
      Served::synthesized(fallback::placeholder_image(&cx.config.name))
    }
  }
}
