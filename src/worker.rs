//! The worker event surface: one handler per host event.
//!
//! The host's scheduler is single-threaded and cooperative; handlers await
//! network and disk I/O and may interleave with each other, but the API
//! response cache and the record queue are disjoint state, so no handler
//! needs a lock.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::cache::{CacheStore, CacheStoreManager, CleanupReport};
use crate::config::WorkerConfig;
use crate::net::{FetchError, Gateway, Request, Response};
use crate::push::{NotificationSink, PushRelay};
use crate::records::RecordStore;
use crate::sync::{SyncCoordinator, SyncReport};

/// Retrieval policy class for an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// API namespace: network-first with cache fallback.
    Dynamic,
    /// Everything else: cache-first with network fallback.
    Static,
}

pub struct Worker {
    config: WorkerConfig,
    gateway: Arc<dyn Gateway>,
    manager: CacheStoreManager,
    static_cache: CacheStore,
    api_cache: CacheStore,
    coordinator: SyncCoordinator,
    relay: PushRelay,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        cache_root: PathBuf,
        gateway: Arc<dyn Gateway>,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        let manager = CacheStoreManager::new(cache_root, &config);
        let static_cache = manager.static_store()?;
        let api_cache = manager.api_store()?;
        let coordinator =
            SyncCoordinator::new(gateway.clone(), records, config.replay_endpoint.clone());
        let relay = PushRelay::new(&config);

        Ok(Self {
            config,
            gateway,
            manager,
            static_cache,
            api_cache,
            coordinator,
            relay,
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Install: populate the static asset cache, all-or-nothing. A failure
    /// here leaves the previous worker generation serving.
    pub async fn install(&self) -> Result<()> {
        self.manager
            .install(self.gateway.as_ref(), &self.config.static_manifest)
            .await
    }

    /// Activate: purge cache generations from prior deployments.
    pub fn activate(&self) -> CleanupReport {
        let report = self.manager.activate();
        report.log();
        report
    }

    pub fn classify(&self, request: &Request) -> RequestClass {
        if request.path().starts_with(&self.config.api_prefix) {
            RequestClass::Dynamic
        } else {
            RequestClass::Static
        }
    }

    /// Route one outgoing request through its retrieval policy.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, FetchError> {
        match self.classify(request) {
            RequestClass::Dynamic => self.fetch_dynamic(request).await,
            RequestClass::Static => self.fetch_static(request).await,
        }
    }

    /// Network-first. Successful safe reads are cached with a deferred
    /// eviction; a network failure falls back to a fresh cached entry, and if
    /// none exists the original error propagates unchanged.
    async fn fetch_dynamic(&self, request: &Request) -> Result<Response, FetchError> {
        match self.gateway.send(request).await {
            Ok(response) => {
                if request.is_get() && response.is_success() {
                    match self.api_cache.put(request, &response) {
                        Ok(()) => self.schedule_eviction(request.clone()),
                        Err(e) => {
                            // Caching is an optimization; the live response
                            // still goes to the caller.
                            warn!(url = %request.url, error = %e, "Failed to cache API response");
                        }
                    }
                }
                Ok(response)
            }
            Err(err) => {
                debug!(url = %request.url, error = %err, "Network failed, consulting API cache");
                match self.api_cache.lookup(request, Some(self.config.api_ttl())) {
                    Ok(Some(hit)) => Ok(hit.response),
                    Ok(None) => Err(err),
                    Err(e) => {
                        warn!(url = %request.url, error = %e, "API cache lookup failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Cache-first. The static set is fixed at install time, so a miss goes
    /// to the network without populating the cache.
    async fn fetch_static(&self, request: &Request) -> Result<Response, FetchError> {
        match self.static_cache.lookup(request, None) {
            Ok(Some(hit)) => return Ok(hit.response),
            Ok(None) => {}
            Err(e) => {
                warn!(url = %request.url, error = %e, "Static cache lookup failed");
            }
        }
        self.gateway.send(request).await
    }

    /// One-shot deferred eviction for the exact key just written. Safe to
    /// miss: lookup validates entry age too, so a timer lost to process
    /// teardown leaves read behavior unchanged.
    fn schedule_eviction(&self, request: Request) {
        let store = self.api_cache.clone();
        let ttl = self.config.api_ttl();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            match store.remove_if_expired(&request, ttl) {
                Ok(true) => debug!(url = %request.url, "Evicted API cache entry past TTL"),
                Ok(false) => {}
                Err(e) => debug!(url = %request.url, error = %e, "Deferred eviction failed"),
            }
        });
    }

    /// Connectivity-restoration trigger. Always resolves; a partial failure
    /// is visible in the report, never raised, so the host owns retry timing.
    pub async fn handle_sync(&self, tag: &str) -> SyncReport {
        if tag != self.config.sync_tag {
            debug!(tag, "Ignoring unknown sync tag");
            return SyncReport::default();
        }
        match self.coordinator.run().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Sync pass could not read the record queue");
                SyncReport::default()
            }
        }
    }

    /// Inbound push payload. No payload, or one that does not parse, is a
    /// deliberate no-op.
    pub async fn handle_push(
        &self,
        sink: &dyn NotificationSink,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        self.relay.deliver(sink, payload).await
    }

    /// User activated the notification. The host closes the notification,
    /// then navigates to the returned route: the recognized action id goes to
    /// the attendance deep link, everything else to the default surface.
    pub fn handle_notification_click(&self, action: Option<&str>) -> String {
        match action {
            Some(id) if id == self.config.notification_action => {
                self.config.notification_route.clone()
            }
            _ => self.config.default_route.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testing::FakeGateway;
    use crate::records::{FileRecordStore, QueuedRecord};
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        gateway: Arc<FakeGateway>,
        records: Arc<FileRecordStore>,
        worker: Worker,
    }

    fn fixture(config: WorkerConfig) -> Fixture {
        let root = TempDir::new().unwrap();
        let gateway = Arc::new(FakeGateway::new());
        let records =
            Arc::new(FileRecordStore::open(root.path().join("outbox")).unwrap());
        let worker = Worker::new(
            config,
            root.path().join("caches"),
            gateway.clone(),
            records.clone(),
        )
        .unwrap();
        Fixture {
            root,
            gateway,
            records,
            worker,
        }
    }

    fn default_fixture() -> Fixture {
        fixture(WorkerConfig::default())
    }

    fn serve_manifest(f: &Fixture) {
        for path in &f.worker.config().static_manifest {
            f.gateway.respond_ok(path, format!("asset:{}", path).as_bytes());
        }
    }

    #[test]
    fn test_classification() {
        let f = default_fixture();
        assert_eq!(
            f.worker.classify(&Request::get("/api/sessions")),
            RequestClass::Dynamic
        );
        assert_eq!(
            f.worker.classify(&Request::get("/api/attendance/qr?s=1")),
            RequestClass::Dynamic
        );
        assert_eq!(
            f.worker.classify(&Request::get("https://example.edu/api/courses")),
            RequestClass::Dynamic
        );
        assert_eq!(
            f.worker.classify(&Request::get("/manifest.json")),
            RequestClass::Static
        );
        assert_eq!(f.worker.classify(&Request::get("/")), RequestClass::Static);
    }

    #[tokio::test]
    async fn test_static_paths_serve_from_cache_without_network() {
        let f = default_fixture();
        serve_manifest(&f);
        f.worker.install().await.unwrap();
        let installed_calls = f.gateway.call_count();

        for path in &f.worker.config().static_manifest {
            let response = f.worker.handle_fetch(&Request::get(path.clone())).await.unwrap();
            assert_eq!(response.body, format!("asset:{}", path).as_bytes());
        }
        assert_eq!(f.gateway.call_count(), installed_calls);
    }

    #[tokio::test]
    async fn test_static_miss_falls_through_to_network_without_caching() {
        let f = default_fixture();
        f.gateway.respond_ok("/uncached.css", b"body{}");

        let response = f.worker.handle_fetch(&Request::get("/uncached.css")).await.unwrap();
        assert_eq!(response.body, b"body{}");
        assert_eq!(f.gateway.calls_to("/uncached.css"), 1);

        // Still a miss next time: the static set is fixed at install time.
        f.worker.handle_fetch(&Request::get("/uncached.css")).await.unwrap();
        assert_eq!(f.gateway.calls_to("/uncached.css"), 2);
    }

    #[tokio::test]
    async fn test_dynamic_get_falls_back_to_cache_byte_for_byte() {
        let f = default_fixture();
        let body = br#"{"sessions":[{"id":1},{"id":2}]}"#;
        f.gateway.respond_ok("/api/sessions", body);

        let request = Request::get("/api/sessions").bearer("tok");
        let live = f.worker.handle_fetch(&request).await.unwrap();
        assert_eq!(live.body, body);

        f.gateway.fail("/api/sessions");
        let cached = f.worker.handle_fetch(&request).await.unwrap();
        assert_eq!(cached, live);
    }

    #[tokio::test]
    async fn test_dynamic_failure_without_cache_propagates_unchanged() {
        let f = default_fixture();
        f.gateway.fail("/api/sessions");

        let err = f
            .worker
            .handle_fetch(&Request::get("/api/sessions"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Offline));
    }

    #[tokio::test]
    async fn test_non_get_dynamic_responses_are_never_cached() {
        let f = default_fixture();
        f.gateway.respond_ok("/api/attendance/qr", b"{\"ok\":true}");

        let request = Request::post("/api/attendance/qr", b"{}".to_vec());
        f.worker.handle_fetch(&request).await.unwrap();

        // Same POST during an outage: nothing cached, error propagates.
        f.gateway.fail("/api/attendance/qr");
        let err = f.worker.handle_fetch(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::Offline));
    }

    #[tokio::test]
    async fn test_error_status_responses_are_not_cached() {
        let f = default_fixture();
        f.gateway.respond(
            "/api/sessions",
            Response {
                status: 500,
                headers: vec![],
                body: b"boom".to_vec(),
            },
        );

        let request = Request::get("/api/sessions");
        let response = f.worker.handle_fetch(&request).await.unwrap();
        assert_eq!(response.status, 500);

        f.gateway.fail("/api/sessions");
        assert!(f.worker.handle_fetch(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_deferred_eviction_fires_after_ttl() {
        let mut config = WorkerConfig::default();
        config.api_ttl_secs = 1;
        let f = fixture(config);
        f.gateway.respond_ok("/api/sessions", b"{}");

        let request = Request::get("/api/sessions");
        f.worker.handle_fetch(&request).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1400)).await;

        // Gone from the store itself, not just filtered at read time.
        let store = f.worker.manager.api_store().unwrap();
        assert!(store.lookup(&request, None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_is_not_served_even_if_the_timer_was_lost() {
        let f = default_fixture();
        let body = b"fresh-at-the-time";
        f.gateway.respond_ok("/api/sessions", body);

        let request = Request::get("/api/sessions");
        f.worker.handle_fetch(&request).await.unwrap();

        // Backdate the entry on disk, as if it were inserted long ago and
        // the eviction timer never fired (process teardown).
        let store = f.worker.manager.api_store().unwrap();
        let mut entry = store.lookup(&request, None).unwrap().unwrap();
        entry.inserted_at = chrono::Utc::now() - chrono::Duration::minutes(10);
        let raw = serde_json::to_string_pretty(&entry).unwrap();
        std::fs::write(
            f.root
                .path()
                .join("caches")
                .join(&f.worker.config().api_cache_name)
                .join(format!("{}.json", request.cache_key())),
            raw,
        )
        .unwrap();

        f.gateway.fail("/api/sessions");
        let err = f.worker.handle_fetch(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::Offline));
    }

    #[tokio::test]
    async fn test_activation_cleanup_scenario() {
        let mut config = WorkerConfig::default();
        config.static_cache_name = "static-v2".to_string();
        config.api_cache_name = "api-v2".to_string();
        let f = fixture(config);

        let caches = f.root.path().join("caches");
        std::fs::create_dir_all(caches.join("static-v1")).unwrap();
        std::fs::create_dir_all(caches.join("api-v1")).unwrap();

        let report = f.worker.activate();
        assert!(report.is_clean());

        let mut remaining: Vec<String> = std::fs::read_dir(&caches)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["api-v2".to_string(), "static-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_trigger_replays_queue() {
        let f = default_fixture();
        f.gateway.respond_ok("/api/attendance/qr", b"{}");
        f.records
            .enqueue(&QueuedRecord::new("tok", serde_json::json!({"qr": "abc"})))
            .unwrap();

        let report = f.worker.handle_sync("background-attendance").await;
        assert_eq!(report.replayed, 1);
        assert!(f.records.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_sync_tag_is_ignored() {
        let f = default_fixture();
        f.records
            .enqueue(&QueuedRecord::new("tok", serde_json::json!({"qr": "abc"})))
            .unwrap();

        let report = f.worker.handle_sync("some-other-tag").await;
        assert_eq!(report, SyncReport::default());
        assert_eq!(f.gateway.call_count(), 0);
        assert_eq!(f.records.list().unwrap().len(), 1);
    }

    #[test]
    fn test_notification_click_routing() {
        let f = default_fixture();
        assert_eq!(
            f.worker.handle_notification_click(Some("mark-attendance")),
            "/mark-attendance"
        );
        assert_eq!(f.worker.handle_notification_click(Some("dismiss")), "/");
        assert_eq!(f.worker.handle_notification_click(None), "/");
    }

    #[tokio::test]
    async fn test_push_then_click_deep_links_to_attendance() {
        use crate::push::{Notification, NotificationSink};
        use std::sync::Mutex;

        #[derive(Default)]
        struct RecordingSink {
            shown: Mutex<Vec<Notification>>,
        }

        #[async_trait::async_trait]
        impl NotificationSink for RecordingSink {
            async fn show(&self, notification: &Notification) -> Result<()> {
                self.shown.lock().unwrap().push(notification.clone());
                Ok(())
            }
        }

        let f = default_fixture();
        let sink = RecordingSink::default();
        let payload = br#"{"title":"Session Started","body":"CS101 is live","actions":[{"action":"mark-attendance"}]}"#;

        f.worker.handle_push(&sink, Some(payload)).await.unwrap();

        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Session Started");

        let action = shown[0].actions[0].action.clone();
        assert_eq!(
            f.worker.handle_notification_click(Some(&action)),
            "/mark-attendance"
        );
    }
}
