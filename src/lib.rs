//! Offline-first caching layer.
//!
//! `offgrid` sits between a client application and the network. Every
//! intercepted request is classified and handed to one caching strategy:
//!
//! - images: cache first, then network, then a generated placeholder
//! - API origin: network first, then cached GET responses, then a JSON error
//! - navigations: network first, then the cached document shell, then an offline page
//! - everything else: stale-while-revalidate
//!
//! Stores are named after the configured version tag. Installing a version
//! seeds its core store; activating it deletes every other generation and
//! notifies connected clients. A control channel lets the application clear
//! stores, re-seed them, force activation and query the version.

pub mod cache;
pub mod clients;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use dispatch::{Dispatcher, Intercept, Route};
pub use http::{Request, Response, ResponseSource, Served};
pub use worker::Worker;
