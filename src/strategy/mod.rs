//! Caching strategies, one per request class.
//!
//! Every strategy tries a primary source, then a secondary one, then a
//! synthesized response. Store writes are best-effort and never fail the
//! request.

pub mod api;
pub mod fallback;
pub mod image;
pub mod navigation;
pub mod resource;

use std::sync::Arc;

use crate::cache::CacheStoreManager;
use crate::config::Config;
use crate::fetch::Fetcher;

/// Collaborators borrowed by a strategy for the duration of one request.
#[derive(Clone, Copy)]
pub struct Context<'a> {
  pub config: &'a Config,
  pub stores: &'a CacheStoreManager,
  pub fetcher: &'a Arc<dyn Fetcher>,
}
