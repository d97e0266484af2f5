//! Web-push notifications
//!
//! Browser subscriptions are stored as-is; a broadcast fans out to every
//! subscription through a [`PushDelivery`] backend with bounded concurrency.
//! Subscriptions the provider reports as gone are dropped afterwards.
//!
//! Message encryption and VAPID signing are the gateway's job: the
//! [`HttpPushDelivery`] backend posts the subscription and plain payload as
//! JSON to `push.gateway_url`.

use crate::config::PushConfig;
use crate::db::repositories::PushRepository;
use crate::models::{
    DeliveryReport, PushMessage, PushNotification, PushSubscription, SubscribeInput, SubscriptionKeys,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for `history`
const MAX_HISTORY: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum PushServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Push delivery is not configured")]
    NotConfigured,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What the push provider said about one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The subscription no longer exists at the provider
    Expired,
}

/// Push delivery backend
#[async_trait]
pub trait PushDelivery: Send + Sync {
    /// Deliver one message to one subscription. Transport and provider
    /// failures are errors.
    async fn deliver(&self, subscription: &PushSubscription, message: &PushMessage) -> Result<DeliveryOutcome>;
}

// ============================================================================
// HTTP gateway backend
// ============================================================================

#[derive(Serialize)]
struct GatewaySubscription<'a> {
    endpoint: &'a str,
    keys: GatewayKeys<'a>,
}

#[derive(Serialize)]
struct GatewayKeys<'a> {
    p256dh: &'a str,
    auth: &'a str,
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    subscription: GatewaySubscription<'a>,
    payload: &'a PushMessage,
    ttl: u64,
}

/// Delivers through an HTTP push gateway
pub struct HttpPushDelivery {
    client: reqwest::Client,
    gateway_url: String,
    api_key: Option<String>,
    ttl_seconds: u64,
}

impl HttpPushDelivery {
    /// Build from config; `None` when no gateway is configured.
    pub fn from_config(config: &PushConfig) -> Result<Option<Self>> {
        let Some(gateway_url) = config.gateway_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Some(Self {
            client,
            gateway_url: gateway_url.to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            ttl_seconds: config.ttl_seconds,
        }))
    }
}

#[async_trait]
impl PushDelivery for HttpPushDelivery {
    async fn deliver(&self, subscription: &PushSubscription, message: &PushMessage) -> Result<DeliveryOutcome> {
        let request = GatewayRequest {
            subscription: GatewaySubscription {
                endpoint: &subscription.endpoint,
                keys: GatewayKeys {
                    p256dh: &subscription.p256dh,
                    auth: &subscription.auth,
                },
            },
            payload: message,
            ttl: self.ttl_seconds,
        };

        let mut builder = self.client.post(&self.gateway_url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.context("Failed to reach push gateway")?;
        let status = response.status();

        if status.is_success() {
            return Ok(DeliveryOutcome::Delivered);
        }
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(DeliveryOutcome::Expired);
        }

        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Push gateway returned {}: {}", status, body)
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct PushService {
    repo: Arc<dyn PushRepository>,
    delivery: Option<Arc<dyn PushDelivery>>,
    concurrency: usize,
}

impl PushService {
    pub fn new(repo: Arc<dyn PushRepository>, delivery: Option<Arc<dyn PushDelivery>>, concurrency: usize) -> Self {
        Self {
            repo,
            delivery,
            concurrency: concurrency.max(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.delivery.is_some()
    }

    /// Store a browser subscription, replacing the keys of a known endpoint.
    pub async fn subscribe(&self, input: SubscribeInput) -> Result<PushSubscription, PushServiceError> {
        let input = SubscribeInput {
            endpoint: input.endpoint.trim().to_string(),
            keys: SubscriptionKeys {
                p256dh: input.keys.p256dh.trim().to_string(),
                auth: input.keys.auth.trim().to_string(),
            },
        };

        if !input.endpoint.starts_with("https://") && !input.endpoint.starts_with("http://") {
            return Err(PushServiceError::ValidationError(
                "Subscription endpoint must be an http(s) URL".to_string(),
            ));
        }
        if input.keys.p256dh.is_empty() || input.keys.auth.is_empty() {
            return Err(PushServiceError::ValidationError(
                "Subscription keys are required".to_string(),
            ));
        }

        let subscription = self
            .repo
            .upsert_subscription(&input)
            .await
            .context("Failed to save push subscription")?;
        tracing::debug!(id = subscription.id, "Push subscription saved");
        Ok(subscription)
    }

    /// Remove a subscription. Unknown endpoints are not an error.
    pub async fn unsubscribe(&self, endpoint: &str) -> Result<bool, PushServiceError> {
        let removed = self
            .repo
            .delete_subscription(endpoint.trim())
            .await
            .context("Failed to delete push subscription")?;
        Ok(removed)
    }

    /// Broadcast a message to every subscription and record the outcome.
    pub async fn send(&self, message: PushMessage) -> Result<PushNotification, PushServiceError> {
        let delivery = self.delivery.clone().ok_or(PushServiceError::NotConfigured)?;

        let message = PushMessage {
            title: message.title.trim().to_string(),
            body: message.body.trim().to_string(),
            url: message.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
        };
        if message.title.is_empty() || message.body.is_empty() {
            return Err(PushServiceError::ValidationError(
                "Notification title and body are required".to_string(),
            ));
        }

        let subscriptions = self
            .repo
            .list_subscriptions()
            .await
            .context("Failed to load push subscriptions")?;

        let outcomes: Vec<(i64, Result<DeliveryOutcome>)> = stream::iter(subscriptions)
            .map(|subscription| {
                let delivery = delivery.clone();
                let message = &message;
                async move {
                    let outcome = delivery.deliver(&subscription, message).await;
                    (subscription.id, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = DeliveryReport {
            total: outcomes.len() as i64,
            ..Default::default()
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(DeliveryOutcome::Delivered) => report.delivered += 1,
                Ok(DeliveryOutcome::Expired) => {
                    report.expired += 1;
                    if let Err(e) = self.repo.delete_subscription_by_id(id).await {
                        tracing::warn!(subscription = id, "Failed to drop expired subscription: {}", e);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(subscription = id, "Push delivery failed: {:#}", e);
                }
            }
        }

        let notification = self
            .repo
            .record_notification(&message, &report)
            .await
            .context("Failed to record push notification")?;

        tracing::info!(
            id = notification.id,
            total = report.total,
            delivered = report.delivered,
            expired = report.expired,
            failed = report.failed,
            "Push notification sent"
        );
        Ok(notification)
    }

    /// Most recent broadcasts first
    pub async fn history(&self, limit: i64) -> Result<Vec<PushNotification>, PushServiceError> {
        let limit = limit.clamp(1, MAX_HISTORY);
        Ok(self
            .repo
            .list_notifications(limit)
            .await
            .context("Failed to list push notifications")?)
    }

    pub async fn count_subscriptions(&self) -> Result<i64, PushServiceError> {
        Ok(self
            .repo
            .count_subscriptions()
            .await
            .context("Failed to count push subscriptions")?)
    }

    pub async fn count_notifications(&self) -> Result<i64, PushServiceError> {
        Ok(self
            .repo
            .count_notifications()
            .await
            .context("Failed to count push notifications")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxPushRepository;
    use crate::db::{create_test_pool, migrations};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Delivery backend scripted per endpoint; unknown endpoints succeed.
    struct MockPushDelivery {
        scripted: HashMap<String, Option<DeliveryOutcome>>,
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl MockPushDelivery {
        fn new() -> Self {
            Self {
                scripted: HashMap::new(),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// `None` makes the endpoint fail.
        fn script(mut self, endpoint: &str, outcome: Option<DeliveryOutcome>) -> Self {
            self.scripted.insert(endpoint.to_string(), outcome);
            self
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushDelivery for MockPushDelivery {
        async fn deliver(&self, subscription: &PushSubscription, message: &PushMessage) -> Result<DeliveryOutcome> {
            self.sent
                .lock()
                .unwrap()
                .push((subscription.endpoint.clone(), message.title.clone()));
            match self.scripted.get(&subscription.endpoint) {
                Some(Some(outcome)) => Ok(*outcome),
                Some(None) => anyhow::bail!("provider unavailable"),
                None => Ok(DeliveryOutcome::Delivered),
            }
        }
    }

    async fn setup_repo() -> Arc<dyn PushRepository> {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxPushRepository::boxed(pool)
    }

    fn subscription(endpoint: &str) -> SubscribeInput {
        SubscribeInput {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "BPk3".to_string(),
                auth: "c2VjcmV0".to_string(),
            },
        }
    }

    fn message() -> PushMessage {
        PushMessage {
            title: "Breaking".to_string(),
            body: "Budget passes".to_string(),
            url: Some("https://news.example.com/budget".to_string()),
        }
    }

    #[tokio::test]
    async fn test_subscribe_validation_and_upsert() {
        let service = PushService::new(setup_repo().await, None, 4);

        assert!(matches!(
            service.subscribe(subscription("not-a-url")).await,
            Err(PushServiceError::ValidationError(_))
        ));
        let mut keyless = subscription("https://push.example.com/a");
        keyless.keys.auth = " ".into();
        assert!(matches!(
            service.subscribe(keyless).await,
            Err(PushServiceError::ValidationError(_))
        ));

        let first = service.subscribe(subscription("https://push.example.com/a")).await.unwrap();
        let mut rekeyed = subscription("https://push.example.com/a");
        rekeyed.keys.p256dh = "NEWKEY".into();
        let second = service.subscribe(rekeyed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.p256dh, "NEWKEY");
        assert_eq!(service.count_subscriptions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let service = PushService::new(setup_repo().await, None, 4);
        service.subscribe(subscription("https://push.example.com/a")).await.unwrap();

        assert!(service.unsubscribe("https://push.example.com/a").await.unwrap());
        assert!(!service.unsubscribe("https://push.example.com/a").await.unwrap());
        assert_eq!(service.count_subscriptions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_without_gateway() {
        let service = PushService::new(setup_repo().await, None, 4);
        assert!(!service.is_configured());
        assert!(matches!(
            service.send(message()).await,
            Err(PushServiceError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_send_tallies_outcomes_and_drops_expired() {
        let repo = setup_repo().await;
        let mock = Arc::new(
            MockPushDelivery::new()
                .script("https://push.example.com/gone", Some(DeliveryOutcome::Expired))
                .script("https://push.example.com/down", None),
        );
        let service = PushService::new(repo, Some(mock.clone()), 2);

        for endpoint in ["ok-1", "ok-2", "gone", "down"] {
            service
                .subscribe(subscription(&format!("https://push.example.com/{}", endpoint)))
                .await
                .unwrap();
        }

        let notification = service.send(message()).await.unwrap();
        assert_eq!(
            notification.report,
            DeliveryReport {
                total: 4,
                delivered: 2,
                expired: 1,
                failed: 1
            }
        );
        assert_eq!(mock.sent().len(), 4);
        assert!(mock.sent().iter().all(|(_, title)| title == "Breaking"));

        // The expired subscription is gone, the failing one stays.
        assert_eq!(service.count_subscriptions().await.unwrap(), 3);

        let history = service.history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].report.delivered, 2);
        assert_eq!(service.count_notifications().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_send_validates_message() {
        let service = PushService::new(setup_repo().await, Some(Arc::new(MockPushDelivery::new())), 4);
        let blank = PushMessage {
            title: " ".into(),
            body: "x".into(),
            url: None,
        };
        assert!(matches!(
            service.send(blank).await,
            Err(PushServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_send_with_no_subscribers_records_empty_report() {
        let service = PushService::new(setup_repo().await, Some(Arc::new(MockPushDelivery::new())), 4);
        let notification = service.send(message()).await.unwrap();
        assert_eq!(notification.report, DeliveryReport::default());
    }

    #[test]
    fn test_http_delivery_requires_gateway() {
        assert!(HttpPushDelivery::from_config(&PushConfig::default()).unwrap().is_none());

        let config = PushConfig {
            gateway_url: Some("   ".into()),
            ..Default::default()
        };
        assert!(HttpPushDelivery::from_config(&config).unwrap().is_none());
    }

    /// Local gateway answering by the last path segment of the endpoint.
    async fn spawn_gateway() -> String {
        use axum::{http::StatusCode, routing::post, Json, Router};

        async fn handle(Json(body): Json<serde_json::Value>) -> StatusCode {
            let endpoint = body["subscription"]["endpoint"].as_str().unwrap_or_default();
            assert_eq!(body["payload"]["title"], "Breaking");
            assert_eq!(body["ttl"], 60);
            match endpoint.rsplit('/').next() {
                Some("gone") => StatusCode::GONE,
                Some("missing") => StatusCode::NOT_FOUND,
                Some("broken") => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::CREATED,
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/send", post(handle));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/send", addr)
    }

    #[tokio::test]
    async fn test_http_delivery_maps_status_codes() {
        let config = PushConfig {
            gateway_url: Some(spawn_gateway().await),
            api_key: Some("key".into()),
            ttl_seconds: 60,
            ..Default::default()
        };
        let delivery = HttpPushDelivery::from_config(&config).unwrap().unwrap();

        let sub = |endpoint: &str| PushSubscription {
            id: 1,
            endpoint: format!("https://push.example.com/{}", endpoint),
            p256dh: "k".into(),
            auth: "a".into(),
            created_at: chrono::Utc::now(),
        };

        assert_eq!(
            delivery.deliver(&sub("ok"), &message()).await.unwrap(),
            DeliveryOutcome::Delivered
        );
        assert_eq!(
            delivery.deliver(&sub("gone"), &message()).await.unwrap(),
            DeliveryOutcome::Expired
        );
        assert_eq!(
            delivery.deliver(&sub("missing"), &message()).await.unwrap(),
            DeliveryOutcome::Expired
        );
        assert!(delivery.deliver(&sub("broken"), &message()).await.is_err());
    }
}
