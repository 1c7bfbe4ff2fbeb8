//! Background sync: replay queued offline submissions once connectivity
//! returns.
//!
//! The host fires the sync trigger; the coordinator drains the record store
//! strictly sequentially, deleting each record only after the network accepts
//! it. One bad record never blocks the rest of the batch, and a partial
//! failure is reported, not raised, so the host does not mistake it for a
//! reason to retry immediately.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::net::{FetchError, Gateway, Request};
use crate::records::{QueuedRecord, RecordStore};

pub struct SyncCoordinator {
    gateway: Arc<dyn Gateway>,
    records: Arc<dyn RecordStore>,
    endpoint: String,
}

/// Outcome of one sync pass. `remaining > 0` tells the host another trigger
/// is still needed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub replayed: usize,
    pub remaining: usize,
}

impl SyncReport {
    pub fn is_drained(&self) -> bool {
        self.remaining == 0
    }
}

impl SyncCoordinator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        records: Arc<dyn RecordStore>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            records,
            endpoint: endpoint.into(),
        }
    }

    /// Run one replay pass. Per-record failures are logged and counted, never
    /// propagated; `Err` only means the record store itself could not be read.
    pub async fn run(&self) -> Result<SyncReport> {
        let queued = self
            .records
            .list()
            .context("Failed to list queued records")?;
        if queued.is_empty() {
            debug!("No queued records, sync pass is a no-op");
            return Ok(SyncReport::default());
        }

        let mut report = SyncReport {
            attempted: queued.len(),
            ..SyncReport::default()
        };

        // Strictly sequential: replays must not race each other or overwhelm
        // a freshly-restored connection.
        for record in &queued {
            match self.replay(record).await {
                Ok(()) => match self.records.delete(record.id) {
                    Ok(_) => {
                        debug!(id = %record.id, "Replayed and removed offline record");
                        report.replayed += 1;
                    }
                    Err(e) => {
                        // Replay landed but the record is still queued; it
                        // will be replayed again on the next trigger.
                        warn!(id = %record.id, error = %e, "Replayed record could not be removed");
                        report.remaining += 1;
                    }
                },
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Replay failed, record stays queued");
                    report.remaining += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            replayed = report.replayed,
            remaining = report.remaining,
            "Sync pass complete"
        );
        Ok(report)
    }

    async fn replay(&self, record: &QueuedRecord) -> Result<()> {
        let body = serde_json::to_vec(&record.payload)?;
        let request = Request::post(self.endpoint.clone(), body)
            .header("content-type", "application/json")
            .bearer(&record.token);

        let response = self.gateway.send(&request).await?;
        if response.is_success() {
            Ok(())
        } else {
            let body = String::from_utf8_lossy(&response.body);
            Err(FetchError::from_status(response.status, &body).into())
        }
    }
}
