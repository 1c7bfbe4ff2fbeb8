//! Push notification relay: turn an inbound push payload into a visible
//! notification.
//!
//! An absent or malformed payload is a deliberate no-op, not an error. The
//! display step goes through an async sink the host implements, and is
//! awaited so the host keeps the worker alive until the notification shows.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WorkerConfig;

/// Vibration pattern for surfaced notifications (ms on/off/on).
const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// One actionable choice on a notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationAction {
    pub action: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Inbound push payload shape.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

/// Ephemeral descriptor handed to the sink; exists only for the duration of
/// surfacing to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: Option<serde_json::Value>,
    pub actions: Vec<NotificationAction>,
}

/// Host-side display surface.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PushRelay {
    default_icon: String,
    badge_icon: String,
}

impl PushRelay {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            default_icon: config.default_icon.clone(),
            badge_icon: config.badge_icon.clone(),
        }
    }

    /// Parse an inbound payload. `None` out means nothing to surface.
    pub fn parse(payload: Option<&[u8]>) -> Option<PushPayload> {
        let data = payload?;
        if data.is_empty() {
            return None;
        }
        match serde_json::from_slice(data) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed push payload");
                None
            }
        }
    }

    pub fn build(&self, payload: PushPayload) -> Notification {
        Notification {
            title: payload.title,
            body: payload.body,
            icon: payload.icon.unwrap_or_else(|| self.default_icon.clone()),
            badge: self.badge_icon.clone(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: payload.data,
            actions: payload.actions,
        }
    }

    /// Surface the payload if it parses; otherwise do nothing.
    pub async fn deliver(&self, sink: &dyn NotificationSink, payload: Option<&[u8]>) -> Result<()> {
        let Some(parsed) = Self::parse(payload) else {
            return Ok(());
        };
        let notification = self.build(parsed);
        sink.show(&notification).await
    }
}
