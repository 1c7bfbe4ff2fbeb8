use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::net::{Request, Response};

/// A cached response snapshot with its insertion timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub request: Request,
    pub response: Response,
    pub inserted_at: DateTime<Utc>,
}

impl CachedResponse {
    fn new(request: &Request, response: &Response) -> Self {
        Self {
            request: request.clone(),
            response: response.clone(),
            inserted_at: Utc::now(),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.inserted_at
    }

    pub fn is_older_than(&self, max_age: Duration) -> bool {
        let max_age =
            chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::max_value());
        self.age() > max_age
    }
}

/// One named cache generation rooted at `<root>/<name>/`.
///
/// Entry age is validated lazily on lookup, so an eviction timer lost to
/// process teardown never lets an entry outlive its TTL on the read path.
#[derive(Debug, Clone)]
pub struct CacheStore {
    name: String,
    dir: PathBuf,
}

impl CacheStore {
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory for {}", name))?;
        Ok(Self {
            name: name.to_string(),
            dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn put(&self, request: &Request, response: &Response) -> Result<()> {
        let entry = CachedResponse::new(request, response);
        let contents = serde_json::to_string_pretty(&entry)?;
        std::fs::write(self.entry_path(&request.cache_key()), contents)
            .with_context(|| format!("Failed to write cache entry for {}", request.url))?;
        Ok(())
    }

    /// Look up the exact request. With `max_age` set, an entry older than the
    /// window is treated as absent and removed on the spot.
    pub fn lookup(
        &self,
        request: &Request,
        max_age: Option<Duration>,
    ) -> Result<Option<CachedResponse>> {
        let key = request.cache_key();
        let path = self.entry_path(&key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache entry for {}", request.url))?;
        let entry: CachedResponse = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache entry for {}", request.url))?;

        if let Some(max_age) = max_age {
            if entry.is_older_than(max_age) {
                debug!(cache = %self.name, url = %request.url, "Entry past TTL, removing");
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!(cache = %self.name, error = %e, "Failed to remove expired entry");
                }
                return Ok(None);
            }
        }

        Ok(Some(entry))
    }

    pub fn remove(&self, request: &Request) -> Result<bool> {
        let path = self.entry_path(&request.cache_key());
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove cache entry for {}", request.url))?;
        Ok(true)
    }

    /// Remove the entry only if it is actually past the window. A deferred
    /// eviction timer racing a fresh overwrite of the same key must not evict
    /// the fresh entry.
    pub fn remove_if_expired(&self, request: &Request, max_age: Duration) -> Result<bool> {
        let path = self.entry_path(&request.cache_key());
        if !path.exists() {
            return Ok(false);
        }

        let contents = std::fs::read_to_string(&path)?;
        let entry: CachedResponse = serde_json::from_str(&contents)?;
        if !entry.is_older_than(max_age) {
            return Ok(false);
        }

        std::fs::remove_file(&path)?;
        Ok(true)
    }

    /// Remove every entry in this generation.
    pub fn clear(&self) -> Result<()> {
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to clear cache entry {}", path.display()))?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            if dir_entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
