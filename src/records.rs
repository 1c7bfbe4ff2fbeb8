//! Durable queue of attendance submissions made while offline.
//!
//! A record is created when a write fails for lack of connectivity, is never
//! mutated, and is deleted only after its replay succeeds. The store contract
//! is a trait so hosts can wire in their own durable storage; the file-backed
//! implementation here is the reference: one JSON file per record, which is
//! crash-durable across process restarts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// One queued write: the payload plus the bearer token that was current when
/// the user acted. The token is snapshotted so replay authenticates as the
/// session that made the submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedRecord {
    pub id: Uuid,
    pub token: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl QueuedRecord {
    pub fn new(token: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Read/write contract for the durable record store.
pub trait RecordStore: Send + Sync {
    fn enqueue(&self, record: &QueuedRecord) -> Result<()>;
    /// All queued records in creation order.
    fn list(&self) -> Result<Vec<QueuedRecord>>;
    /// Returns whether a record with that id existed.
    fn delete(&self, id: Uuid) -> Result<bool>;
}

/// File-backed record store: `<dir>/<id>.json` per record.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).context("Failed to create record queue directory")?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl RecordStore for FileRecordStore {
    fn enqueue(&self, record: &QueuedRecord) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(self.record_path(record.id), contents)
            .with_context(|| format!("Failed to persist queued record {}", record.id))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<QueuedRecord>> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir).context("Failed to read record queue")? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            // One bad record must not block replay of the others, whether it
            // fails to read or fails to parse.
            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable queued record");
                    continue;
                }
            };
            match serde_json::from_str::<QueuedRecord>(&contents) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unparsable queued record");
                }
            }
        }

        // Deterministic replay order.
        records.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(records)
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to delete queued record {}", id))?;
        Ok(true)
    }
}
