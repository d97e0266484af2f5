//! Push repository
//!
//! Browser push subscriptions (unique per endpoint) and the log of sent
//! notifications with their delivery counts.

use super::timestamp;
use crate::config::DatabaseDriver;
use crate::db::{pool, DynDatabasePool};
use crate::models::{DeliveryReport, PushMessage, PushNotification, PushSubscription, SubscribeInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PushRepository: Send + Sync {
    /// Insert a subscription, or refresh the keys of an existing endpoint
    async fn upsert_subscription(&self, input: &SubscribeInput) -> Result<PushSubscription>;

    /// Returns false if no subscription had this endpoint
    async fn delete_subscription(&self, endpoint: &str) -> Result<bool>;

    async fn delete_subscription_by_id(&self, id: i64) -> Result<bool>;

    async fn list_subscriptions(&self) -> Result<Vec<PushSubscription>>;

    async fn count_subscriptions(&self) -> Result<i64>;

    /// Record a broadcast and its outcome
    async fn record_notification(&self, message: &PushMessage, report: &DeliveryReport) -> Result<PushNotification>;

    /// Most recent broadcasts first
    async fn list_notifications(&self, limit: i64) -> Result<Vec<PushNotification>>;

    async fn count_notifications(&self) -> Result<i64>;
}

pub struct SqlxPushRepository {
    pool: DynDatabasePool,
}

impl SqlxPushRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PushRepository> {
        Arc::new(Self::new(pool))
    }

    async fn scalar(&self, sql: &str) -> Result<i64> {
        let value = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(pool::sqlite(&self.pool)?)
                    .await?
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(pool::mysql(&self.pool)?)
                    .await?
            }
        };
        Ok(value)
    }

    async fn delete_where(&self, sql: &str, key: DeleteKey<'_>) -> Result<bool> {
        let affected = match (self.pool.driver(), key) {
            (DatabaseDriver::Sqlite, DeleteKey::Endpoint(endpoint)) => sqlx::query(sql)
                .bind(endpoint)
                .execute(pool::sqlite(&self.pool)?)
                .await?
                .rows_affected(),
            (DatabaseDriver::Sqlite, DeleteKey::Id(id)) => sqlx::query(sql)
                .bind(id)
                .execute(pool::sqlite(&self.pool)?)
                .await?
                .rows_affected(),
            (DatabaseDriver::Mysql, DeleteKey::Endpoint(endpoint)) => sqlx::query(sql)
                .bind(endpoint)
                .execute(pool::mysql(&self.pool)?)
                .await?
                .rows_affected(),
            (DatabaseDriver::Mysql, DeleteKey::Id(id)) => sqlx::query(sql)
                .bind(id)
                .execute(pool::mysql(&self.pool)?)
                .await?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

#[derive(Clone, Copy)]
enum DeleteKey<'a> {
    Endpoint(&'a str),
    Id(i64),
}

#[async_trait]
impl PushRepository for SqlxPushRepository {
    async fn upsert_subscription(&self, input: &SubscribeInput) -> Result<PushSubscription> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => upsert_subscription_sqlite(pool::sqlite(&self.pool)?, input).await,
            DatabaseDriver::Mysql => upsert_subscription_mysql(pool::mysql(&self.pool)?, input).await,
        }
    }

    async fn delete_subscription(&self, endpoint: &str) -> Result<bool> {
        self.delete_where(
            "DELETE FROM push_subscriptions WHERE endpoint = ?",
            DeleteKey::Endpoint(endpoint),
        )
        .await
        .context("Failed to delete push subscription")
    }

    async fn delete_subscription_by_id(&self, id: i64) -> Result<bool> {
        self.delete_where("DELETE FROM push_subscriptions WHERE id = ?", DeleteKey::Id(id))
            .await
            .context("Failed to delete push subscription")
    }

    async fn list_subscriptions(&self) -> Result<Vec<PushSubscription>> {
        let sql = "SELECT id, endpoint, p256dh, auth, created_at FROM push_subscriptions ORDER BY id";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool::sqlite(&self.pool)?)
                    .await
                    .context("Failed to list push subscriptions")?;
                rows.iter().map(row_to_subscription_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool::mysql(&self.pool)?)
                    .await
                    .context("Failed to list push subscriptions")?;
                rows.iter().map(row_to_subscription_mysql).collect()
            }
        }
    }

    async fn count_subscriptions(&self) -> Result<i64> {
        self.scalar("SELECT COUNT(*) FROM push_subscriptions")
            .await
            .context("Failed to count push subscriptions")
    }

    async fn record_notification(&self, message: &PushMessage, report: &DeliveryReport) -> Result<PushNotification> {
        let now = timestamp::now();
        let sql = "INSERT INTO push_notifications (title, body, url, total, delivered, expired, failed, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&message.title)
                .bind(&message.body)
                .bind(&message.url)
                .bind(report.total)
                .bind(report.delivered)
                .bind(report.expired)
                .bind(report.failed)
                .bind(now)
                .execute(pool::sqlite(&self.pool)?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&message.title)
                .bind(&message.body)
                .bind(&message.url)
                .bind(report.total)
                .bind(report.delivered)
                .bind(report.expired)
                .bind(report.failed)
                .bind(now)
                .execute(pool::mysql(&self.pool)?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to record push notification")?;

        Ok(PushNotification {
            id,
            title: message.title.clone(),
            body: message.body.clone(),
            url: message.url.clone(),
            report: *report,
            created_at: now,
        })
    }

    async fn list_notifications(&self, limit: i64) -> Result<Vec<PushNotification>> {
        let sql = "SELECT id, title, body, url, total, delivered, expired, failed, created_at FROM push_notifications ORDER BY created_at DESC, id DESC LIMIT ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .bind(limit)
                    .fetch_all(pool::sqlite(&self.pool)?)
                    .await
                    .context("Failed to list push notifications")?;
                rows.iter().map(row_to_notification_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .bind(limit)
                    .fetch_all(pool::mysql(&self.pool)?)
                    .await
                    .context("Failed to list push notifications")?;
                rows.iter().map(row_to_notification_mysql).collect()
            }
        }
    }

    async fn count_notifications(&self) -> Result<i64> {
        self.scalar("SELECT COUNT(*) FROM push_notifications")
            .await
            .context("Failed to count push notifications")
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_subscription_sqlite(pool: &SqlitePool, input: &SubscribeInput) -> Result<PushSubscription> {
    sqlx::query(
        r#"INSERT INTO push_subscriptions (endpoint, p256dh, auth, created_at) VALUES (?, ?, ?, ?)
           ON CONFLICT(endpoint) DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth"#,
    )
    .bind(&input.endpoint)
    .bind(&input.keys.p256dh)
    .bind(&input.keys.auth)
    .bind(timestamp::now())
    .execute(pool)
    .await
    .context("Failed to save push subscription")?;

    let row = sqlx::query("SELECT id, endpoint, p256dh, auth, created_at FROM push_subscriptions WHERE endpoint = ?")
        .bind(&input.endpoint)
        .fetch_one(pool)
        .await
        .context("Failed to reload push subscription")?;
    row_to_subscription_sqlite(&row)
}

fn row_to_subscription_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PushSubscription> {
    Ok(PushSubscription {
        id: row.try_get("id")?,
        endpoint: row.try_get("endpoint")?,
        p256dh: row.try_get("p256dh")?,
        auth: row.try_get("auth")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PushNotification> {
    Ok(PushNotification {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        url: row.try_get("url")?,
        report: DeliveryReport {
            total: row.try_get("total")?,
            delivered: row.try_get("delivered")?,
            expired: row.try_get("expired")?,
            failed: row.try_get("failed")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_subscription_mysql(pool: &MySqlPool, input: &SubscribeInput) -> Result<PushSubscription> {
    sqlx::query(
        r#"INSERT INTO push_subscriptions (endpoint, p256dh, auth, created_at) VALUES (?, ?, ?, ?)
           ON DUPLICATE KEY UPDATE p256dh = VALUES(p256dh), auth = VALUES(auth)"#,
    )
    .bind(&input.endpoint)
    .bind(&input.keys.p256dh)
    .bind(&input.keys.auth)
    .bind(timestamp::now())
    .execute(pool)
    .await
    .context("Failed to save push subscription")?;

    let row = sqlx::query("SELECT id, endpoint, p256dh, auth, created_at FROM push_subscriptions WHERE endpoint = ?")
        .bind(&input.endpoint)
        .fetch_one(pool)
        .await
        .context("Failed to reload push subscription")?;
    row_to_subscription_mysql(&row)
}

fn row_to_subscription_mysql(row: &sqlx::mysql::MySqlRow) -> Result<PushSubscription> {
    Ok(PushSubscription {
        id: row.try_get("id")?,
        endpoint: row.try_get("endpoint")?,
        p256dh: row.try_get("p256dh")?,
        auth: row.try_get("auth")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Result<PushNotification> {
    Ok(PushNotification {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        url: row.try_get("url")?,
        report: DeliveryReport {
            total: row.try_get("total")?,
            delivered: row.try_get("delivered")?,
            expired: row.try_get("expired")?,
            failed: row.try_get("failed")?,
        },
        created_at: row.try_get("created_at")?,
    })
}
