//! Notification Delivery Abstraction
//!
//! Fan-out to chat channels, webhooks and the like lives in the host. The core
//! only builds the message and hands it over; delivery is best-effort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SystemAlert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub priority: NotificationPriority,
}

impl Notification {
    /// A normal-priority system alert, the shape every task completion uses.
    pub fn system_alert(
        title: impl Into<String>,
        body: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: NotificationKind::SystemAlert,
            title: title.into(),
            body: body.into(),
            timestamp,
            priority: NotificationPriority::Normal,
        }
    }
}

/// Notification sink trait
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<()>;
}
