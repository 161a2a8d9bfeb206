//! Named, versioned response stores.
//!
//! This module provides the store side of the caching engine:
//! - A backing-store capability (`BackingStore`) with a SQLite implementation
//! - Version-derived store names, one current store per role
//! - Eviction of stale generations and wholesale invalidation
//! - Best-effort handles: storage failures read as cache misses

mod manager;
mod storage;
mod traits;

pub use manager::{CacheStoreManager, StoreHandle, StoreNames, StoreRole};
pub use storage::SqliteStorage;
pub use traits::{BackingStore, CachedEntry};
