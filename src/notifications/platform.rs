use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

/// Notification permission as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// When a local notification should fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTrigger {
    After(Duration),
    At(DateTime<Utc>),
}

/// Notification scheduled on the device itself, without the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
    /// `None` fires immediately
    #[serde(default)]
    pub trigger: Option<NotificationTrigger>,
}

/// Push notification failures. None of these interrupt the user flow.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PushError {
    #[error("Notification permission not granted")]
    PermissionDenied,
    #[error("Push notifications not available: {0}")]
    NotApplicable(String),
    #[error("Notification platform error: {0}")]
    Platform(String),
}

/// Device notification service
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Push tokens are only issued to physical devices
    fn is_physical_device(&self) -> bool;

    async fn permission_status(&self) -> Result<PermissionStatus, PushError>;

    async fn request_permission(&self) -> Result<PermissionStatus, PushError>;

    /// Set up the default delivery channel on platforms that need one
    async fn prepare_channel(&self) -> Result<(), PushError> {
        Ok(())
    }

    /// Issue a push token for this device
    async fn issue_token(&self, project_id: Option<&str>) -> Result<String, PushError>;

    /// Schedule a local notification, returning its identifier
    async fn schedule_local(&self, notification: LocalNotification) -> Result<String, PushError>;

    async fn cancel_all(&self) -> Result<(), PushError>;

    async fn badge_count(&self) -> Result<u32, PushError>;

    async fn set_badge_count(&self, count: u32) -> Result<(), PushError>;
}

/// Platform for hosts without a push service, such as the command line
///
/// It reports itself as a non-physical device, so no token is ever issued.
/// Local notifications are only kept in memory.
#[derive(Debug, Default)]
pub struct HeadlessPlatform {
    scheduled: DashMap<String, LocalNotification>,
    badge: AtomicU32,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }
}

#[async_trait]
impl PushPlatform for HeadlessPlatform {
    fn is_physical_device(&self) -> bool {
        false
    }

    async fn permission_status(&self) -> Result<PermissionStatus, PushError> {
        Ok(PermissionStatus::Undetermined)
    }

    async fn request_permission(&self) -> Result<PermissionStatus, PushError> {
        Ok(PermissionStatus::Denied)
    }

    async fn issue_token(&self, _project_id: Option<&str>) -> Result<String, PushError> {
        Err(PushError::NotApplicable(
            "headless host has no push service".to_string(),
        ))
    }

    async fn schedule_local(&self, notification: LocalNotification) -> Result<String, PushError> {
        let id = uuid::Uuid::new_v4().to_string();
        debug!("Scheduling local notification {}: {}", id, notification.title);
        self.scheduled.insert(id.clone(), notification);
        Ok(id)
    }

    async fn cancel_all(&self) -> Result<(), PushError> {
        self.scheduled.clear();
        Ok(())
    }

    async fn badge_count(&self) -> Result<u32, PushError> {
        Ok(self.badge.load(Ordering::SeqCst))
    }

    async fn set_badge_count(&self, count: u32) -> Result<(), PushError> {
        self.badge.store(count, Ordering::SeqCst);
        Ok(())
    }
}
