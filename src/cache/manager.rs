use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::net::{Gateway, Request};

use super::CacheStore;

/// Lifecycle owner for the named cache generations.
///
/// The generation names come from [`WorkerConfig`], so a deployment bump is a
/// single configuration change and activation knows exactly which two names
/// survive.
#[derive(Debug, Clone)]
pub struct CacheStoreManager {
    root: PathBuf,
    static_name: String,
    api_name: String,
}

impl CacheStoreManager {
    pub fn new(root: PathBuf, config: &WorkerConfig) -> Self {
        Self {
            root,
            static_name: config.static_cache_name.clone(),
            api_name: config.api_cache_name.clone(),
        }
    }

    pub fn static_store(&self) -> Result<CacheStore> {
        CacheStore::open(&self.root, &self.static_name)
    }

    pub fn api_store(&self) -> Result<CacheStore> {
        CacheStore::open(&self.root, &self.api_name)
    }

    /// Populate the static asset cache from the manifest, all-or-nothing.
    /// A partially-cached shell is worse than no shell, so every asset is
    /// fetched before anything is written, and any failure aborts the step.
    pub async fn install(&self, gateway: &dyn Gateway, manifest: &[String]) -> Result<()> {
        let store = self.static_store()?;

        let mut fetched = Vec::with_capacity(manifest.len());
        for path in manifest {
            let request = Request::get(path.clone());
            let response = gateway
                .send(&request)
                .await
                .with_context(|| format!("Failed to fetch shell asset {}", path))?;
            if !response.is_success() {
                anyhow::bail!("Shell asset {} returned status {}", path, response.status);
            }
            fetched.push((request, response));
        }

        for (request, response) in &fetched {
            if let Err(e) = store.put(request, response) {
                // A half-written shell is worse than none; drop what landed.
                if let Err(clear_err) = store.clear() {
                    warn!(error = %clear_err, "Failed to clear partially installed shell");
                }
                return Err(e);
            }
        }

        info!(cache = %self.static_name, assets = manifest.len(), "Shell assets cached");
        Ok(())
    }

    /// Delete every cache generation whose name is not current. Cleanup is
    /// best-effort per generation; outcomes are aggregated for the caller
    /// instead of silently discarded.
    pub fn activate(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Nothing installed yet; nothing to clean.
                return report;
            }
            Err(e) => {
                report
                    .failed
                    .push((self.root.display().to_string(), e.to_string()));
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report
                        .failed
                        .push((self.root.display().to_string(), e.to_string()));
                    continue;
                }
            };
            if !entry.path().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if name == self.static_name || name == self.api_name {
                debug!(cache = %name, "Current generation, keeping");
                continue;
            }

            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => report.removed.push(name),
                Err(e) => report.failed.push((name, e.to_string())),
            }
        }

        report
    }
}

/// Aggregated outcome of activation cleanup, one entry per stale generation.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn log(&self) {
        for name in &self.removed {
            info!(cache = %name, "Removed stale cache generation");
        }
        for (name, error) in &self.failed {
            warn!(cache = %name, error = %error, "Failed to remove stale cache generation");
        }
    }
}
