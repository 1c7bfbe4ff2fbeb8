//! Named response caches and their generation lifecycle.
//!
//! Two generations exist at a time: a long-lived static asset cache populated
//! once at install, and a short-lived API response cache with a fixed TTL.
//! Entries are JSON files under `<cache-root>/<generation>/`, keyed by the
//! request's cache key. Stale generations from a previous deployment are
//! deleted at activation.

pub mod manager;
pub mod store;

pub use manager::{CacheStoreManager, CleanupReport};
pub use store::{CacheStore, CachedResponse};
