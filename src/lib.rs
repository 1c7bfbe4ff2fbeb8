//! rollcache - offline-first worker core for an attendance-tracking client.
//!
//! This crate is the network intermediary that keeps the client usable while
//! connectivity is intermittent:
//!
//! - a long-lived static asset cache populated all-or-nothing at install and
//!   cleaned up by generation at activation ([`cache`])
//! - a network-first policy for API reads with a 5-minute response cache and
//!   deferred-plus-lazy TTL eviction ([`worker`])
//! - a durable queue of attendance submissions made while offline, replayed
//!   sequentially on the host's connectivity-restoration trigger ([`records`],
//!   [`sync`])
//! - a push notification relay with action-based deep linking ([`push`])
//!
//! The host environment supplies the event triggers (install, activate,
//! fetch, sync, push, notification click) and calls the matching handler on
//! [`worker::Worker`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rollcache::records::FileRecordStore;
//! use rollcache::{HttpGateway, Worker, WorkerConfig};
//!
//! # async fn host() -> anyhow::Result<()> {
//! let config = WorkerConfig::load()?;
//! let gateway = Arc::new(HttpGateway::new("https://attendance.example.edu")?);
//! let records = Arc::new(FileRecordStore::open(WorkerConfig::queue_dir()?)?);
//!
//! let worker = Worker::new(config, WorkerConfig::cache_root()?, gateway, records)?;
//! worker.install().await?;
//! worker.activate();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod net;
pub mod push;
pub mod records;
pub mod sync;
pub mod worker;

pub use config::WorkerConfig;
pub use net::{FetchError, Gateway, HttpGateway, Request, Response};
pub use worker::{RequestClass, Worker};

use std::io;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}
