//! Worker configuration.
//!
//! The two cache generation names, the static asset manifest, the API
//! namespace, and the sync/notification knobs all live here as one injected
//! value, so bumping a cache generation is a single controlled change rather
//! than a scattered literal.
//!
//! Configuration is stored at `~/.config/rollcache/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "rollcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Static asset cache generation. Changing the manifest requires bumping
    /// this name so activation purges the old set.
    pub static_cache_name: String,
    /// API response cache generation.
    pub api_cache_name: String,
    /// Shell assets populated at install time, all-or-nothing.
    pub static_manifest: Vec<String>,
    /// Requests whose path falls under this prefix are dynamic.
    pub api_prefix: String,
    /// TTL for cached API responses, in seconds.
    pub api_ttl_secs: u64,
    /// Sync tag the coordinator is registered against.
    pub sync_tag: String,
    /// Endpoint queued attendance records are replayed to.
    pub replay_endpoint: String,
    /// Notification action id that deep-links into attendance marking.
    pub notification_action: String,
    /// Route for the recognized notification action.
    pub notification_route: String,
    /// Route for plain or unrecognized notification activation.
    pub default_route: String,
    /// Icon used when a push payload carries none.
    pub default_icon: String,
    /// Badge shown alongside notifications.
    pub badge_icon: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            static_cache_name: "attendance-static-v1".to_string(),
            api_cache_name: "attendance-api-v1".to_string(),
            static_manifest: vec![
                "/".to_string(),
                "/manifest.json".to_string(),
                "/favicon.svg".to_string(),
                "/icons/icon-192x192.png".to_string(),
                "/icons/icon-512x512.png".to_string(),
            ],
            api_prefix: "/api/".to_string(),
            api_ttl_secs: 300,
            sync_tag: "background-attendance".to_string(),
            replay_endpoint: "/api/attendance/qr".to_string(),
            notification_action: "mark-attendance".to_string(),
            notification_route: "/mark-attendance".to_string(),
            default_route: "/".to_string(),
            default_icon: "/icons/icon-192x192.png".to_string(),
            badge_icon: "/icons/icon-72x72.png".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn api_ttl(&self) -> Duration {
        Duration::from_secs(self.api_ttl_secs)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root directory holding the named cache generations. Contains nothing
    /// but generation directories; activation cleanup deletes unknown names.
    pub fn cache_root() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("caches"))
    }

    /// Directory holding queued offline records, deliberately outside the
    /// cache root so activation cleanup can never touch it.
    pub fn queue_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("outbox"))
    }
}
