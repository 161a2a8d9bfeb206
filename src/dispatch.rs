//! Request classification and routing to a strategy.

use std::sync::Arc;
use tracing::debug;
use url::Origin;

use crate::cache::CacheStoreManager;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::http::{Destination, Request, Served};
use crate::strategy::{self, Context};

/// The strategy selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Not intercepted; the host's default transport handles it
  PassThrough,
  Image,
  Api,
  Navigation,
  Resource,
}

/// Select a route. First match wins:
/// non-http(s) scheme, image destination, API origin, navigation, anything else.
pub fn classify(request: &Request, api_origin: &Origin) -> Route {
  if !request.is_http() {
    Route::PassThrough
  } else if request.destination == Destination::Image {
    Route::Image
  } else if request.url.origin() == *api_origin {
    Route::Api
  } else if request.is_navigation() {
    Route::Navigation
  } else {
    Route::Resource
  }
}

/// Outcome of intercepting a request.
#[derive(Debug)]
pub enum Intercept {
  PassThrough,
  Respond(Served),
}

impl Intercept {
  pub fn served(&self) -> Option<&Served> {
    match self {
      Self::Respond(served) => Some(served),
      Self::PassThrough => None,
    }
  }
}

pub struct Dispatcher {
  config: Arc<Config>,
  stores: Arc<CacheStoreManager>,
  fetcher: Arc<dyn Fetcher>,
  api_origin: Origin,
}

impl Dispatcher {
  pub fn new(config: Arc<Config>, stores: Arc<CacheStoreManager>, fetcher: Arc<dyn Fetcher>) -> Self {
    let api_origin = config.api_origin();
    Self {
      config,
      stores,
      fetcher,
      api_origin,
    }
  }

  pub fn route(&self, request: &Request) -> Route {
    classify(request, &self.api_origin)
  }

  /// Handle one intercepted request. Always yields a response unless the
  /// request is passed through.
  pub async fn handle(&self, request: &Request) -> Intercept {
    let route = self.route(request);

    if request.is_get() {
      debug!(url = %request.url, ?route, "Intercepted request");
    }

    let cx = Context {
      config: &self.config,
      stores: &self.stores,
      fetcher: &self.fetcher,
    };

    let served = match route {
      Route::PassThrough => return Intercept::PassThrough,
      Route::Image => strategy::image::handle(cx, request).await,
      Route::Api => strategy::api::handle(cx, request).await,
      Route::Navigation => strategy::navigation::handle(cx, request).await,
      Route::Resource => strategy::resource::handle(cx, request).await,
    };

    Intercept::Respond(served)
  }
}
