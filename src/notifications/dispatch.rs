//! Classification and routing of incoming notifications.
//!
//! The backend tags each notification with a `type` and/or a `screen`
//! field. Either one is enough to pick the category; anything that matches
//! no category is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data attached to a delivered notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A notification as handed over by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingNotification {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub data: NotificationData,
    pub received_at: DateTime<Utc>,
}

/// Events from the platform's two delivery channels
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// Arrived while the app was in the foreground
    Received(IncomingNotification),
    /// The user tapped or otherwise responded to it
    Responded(IncomingNotification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    SubscriptionExpiring,
    PaymentReminder,
    NewOffer,
}

/// In-app destination a notification leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Subscriptions,
    Payments,
    Offers,
}

/// Routing decision handed to the navigation layer
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRoute {
    pub category: NotificationCategory,
    pub destination: Destination,
    /// Record the notification refers to, when the backend sent one
    pub target_id: Option<serde_json::Value>,
}

impl NotificationCategory {
    /// Pick the category of a payload. `type` is checked before `screen`
    /// within each category, categories in declaration order.
    pub fn classify(data: &NotificationData) -> Option<Self> {
        let kind = data.kind.as_deref();
        let screen = data.screen.as_deref();

        [
            NotificationCategory::SubscriptionExpiring,
            NotificationCategory::PaymentReminder,
            NotificationCategory::NewOffer,
        ]
        .into_iter()
        .find(|category| {
            kind == Some(category.type_tag()) || screen == Some(category.destination().screen_name())
        })
    }

    /// Value of the `type` field for this category
    pub fn type_tag(&self) -> &'static str {
        match self {
            NotificationCategory::SubscriptionExpiring => "subscription_expiring",
            NotificationCategory::PaymentReminder => "payment_reminder",
            NotificationCategory::NewOffer => "new_offer",
        }
    }

    pub fn destination(&self) -> Destination {
        match self {
            NotificationCategory::SubscriptionExpiring => Destination::Subscriptions,
            NotificationCategory::PaymentReminder => Destination::Payments,
            NotificationCategory::NewOffer => Destination::Offers,
        }
    }
}

impl Destination {
    /// Value of the `screen` field naming this destination
    pub fn screen_name(&self) -> &'static str {
        match self {
            Destination::Subscriptions => "Subscriptions",
            Destination::Payments => "Payments",
            Destination::Offers => "Offers",
        }
    }
}

/// Route a payload, `None` for unrecognised ones
pub fn route(data: &NotificationData) -> Option<NotificationRoute> {
    let category = NotificationCategory::classify(data)?;
    Some(NotificationRoute {
        category,
        destination: category.destination(),
        target_id: data.id.clone(),
    })
}
