//! Web-push models
//!
//! Subscriptions arrive in the browser's `PushSubscription.toJSON()` shape
//! (`{ endpoint, keys: { p256dh, auth } }`); each broadcast is recorded as a
//! `PushNotification` with its delivery counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored browser push subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: i64,
    /// Push service endpoint URL (unique)
    pub endpoint: String,
    /// Client public key
    pub p256dh: String,
    /// Client auth secret
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Subscription payload posted by the browser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeInput {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// Notification content broadcast to every subscriber
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Page opened when the notification is clicked
    #[serde(default)]
    pub url: Option<String>,
}

/// Outcome counts of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub total: i64,
    pub delivered: i64,
    /// Subscriptions the provider reported as gone; removed afterwards
    pub expired: i64,
    pub failed: i64,
}

/// Recorded broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub id: i64,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub report: DeliveryReport,
    pub created_at: DateTime<Utc>,
}
