//! Web-push API endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{PushMessage, PushNotification, SubscribeInput};

fn default_history_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<PushNotification>,
}

/// POST /api/v1/push/subscriptions - Browser `PushSubscription.toJSON()` body
pub async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeInput>,
) -> Result<(StatusCode, Json<SubscribeResponse>), ApiError> {
    let subscription = state.push_service.subscribe(body).await?;
    Ok((StatusCode::CREATED, Json(SubscribeResponse { id: subscription.id })))
}

/// DELETE /api/v1/push/subscriptions
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(body): Json<UnsubscribeRequest>,
) -> Result<StatusCode, ApiError> {
    state.push_service.unsubscribe(&body.endpoint).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/push/send
pub async fn send_notification(
    State(state): State<AppState>,
    Json(body): Json<PushMessage>,
) -> Result<Json<PushNotification>, ApiError> {
    let notification = state.push_service.send(body).await?;
    Ok(Json(notification))
}

/// GET /api/v1/admin/push/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let notifications = state.push_service.history(query.limit).await?;
    Ok(Json(NotificationListResponse { notifications }))
}
