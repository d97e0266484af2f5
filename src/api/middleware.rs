//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and service error mapping
//! - Staff token authentication

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::{AuthConfig, Config};
use crate::db::repositories::{SqlxArticleRepository, SqlxPushRepository, SqlxWebStoryRepository};
use crate::db::DynDatabasePool;
use crate::services::{
    ArticleService, ArticleServiceError, HttpPushDelivery, PromotionEngine, PromotionError, PushDelivery,
    PushService, PushServiceError, StatsService, WebStoryService, WebStoryServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthConfig>,
    pub article_service: Arc<ArticleService>,
    pub promotion_engine: Arc<PromotionEngine>,
    pub story_service: Arc<WebStoryService>,
    pub push_service: Arc<PushService>,
    pub stats_service: Arc<StatsService>,
}

impl AppState {
    /// Wire repositories and services. Push delivery comes from `push.gateway_url`.
    pub fn build(pool: DynDatabasePool, cache: Arc<Cache>, config: &Config) -> anyhow::Result<Self> {
        let delivery = HttpPushDelivery::from_config(&config.push)?
            .map(|d| Arc::new(d) as Arc<dyn PushDelivery>);
        Ok(Self::with_push_delivery(pool, cache, config, delivery))
    }

    /// Same as [`AppState::build`] with an explicit delivery backend.
    pub fn with_push_delivery(
        pool: DynDatabasePool,
        cache: Arc<Cache>,
        config: &Config,
        delivery: Option<Arc<dyn PushDelivery>>,
    ) -> Self {
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let story_repo = SqlxWebStoryRepository::boxed(pool.clone());
        let push_repo = SqlxPushRepository::boxed(pool);

        let article_service = Arc::new(ArticleService::with_cache_ttl(
            article_repo.clone(),
            cache.clone(),
            cache.default_ttl(),
        ));
        let promotion_engine = Arc::new(PromotionEngine::new(article_repo.clone(), cache.clone()));
        let story_service = Arc::new(WebStoryService::new(story_repo.clone(), cache));
        let push_service = Arc::new(PushService::new(
            push_repo.clone(),
            delivery,
            config.push.concurrency,
        ));
        let stats_service = Arc::new(StatsService::new(article_repo, story_repo, push_repo));

        Self {
            auth: Arc::new(config.auth.clone()),
            article_service,
            promotion_engine,
            story_service,
            push_service,
            stats_service,
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("SERVICE_UNAVAILABLE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" | "LIMIT_EXCEEDED" => StatusCode::CONFLICT,
            "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self.error.message);
        }
        (self.status(), Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::internal_error(format!("{:#}", e))
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(e: ArticleServiceError) -> Self {
        match e {
            ArticleServiceError::NotFound(key) => ApiError::not_found(format!("Article not found: {}", key)),
            ArticleServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ArticleServiceError::DuplicateSlug(slug) => ApiError::with_details(
                "CONFLICT",
                format!("Article slug already exists: {}", slug),
                serde_json::json!({"field": "slug", "value": slug}),
            ),
            ArticleServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<PromotionError> for ApiError {
    fn from(e: PromotionError) -> Self {
        match e {
            PromotionError::NotFound(id) => ApiError::not_found(format!("Article not found: {}", id)),
            PromotionError::Conflict(reason) => ApiError::with_details(
                "CONFLICT",
                reason.clone(),
                serde_json::json!({"reason": reason}),
            ),
            PromotionError::LimitExceeded { flag, max } => {
                let message = PromotionError::LimitExceeded { flag, max }.to_string();
                ApiError::with_details(
                    "LIMIT_EXCEEDED",
                    message,
                    serde_json::json!({"flag": flag.to_string(), "max": max}),
                )
            }
            PromotionError::InvalidArgument(msg) => ApiError::validation_error(msg),
            PromotionError::Internal(e) => e.into(),
        }
    }
}

impl From<WebStoryServiceError> for ApiError {
    fn from(e: WebStoryServiceError) -> Self {
        match e {
            WebStoryServiceError::NotFound(key) => ApiError::not_found(format!("Web story not found: {}", key)),
            WebStoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            WebStoryServiceError::DuplicateSlug(slug) => ApiError::with_details(
                "CONFLICT",
                format!("Web story slug already exists: {}", slug),
                serde_json::json!({"field": "slug", "value": slug}),
            ),
            WebStoryServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<PushServiceError> for ApiError {
    fn from(e: PushServiceError) -> Self {
        match e {
            PushServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PushServiceError::NotConfigured => ApiError::service_unavailable("Push delivery is not configured"),
            PushServiceError::InternalError(e) => e.into(),
        }
    }
}

/// Extract the staff token from `Authorization: Bearer` or the `session` cookie
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = request.headers().get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Staff authentication middleware
pub async fn require_staff(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    if !state.auth.is_staff_token(&token) {
        tracing::debug!(path = %request.uri().path(), "Rejected staff request");
        return Err(ApiError::unauthorized("Invalid staff token"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PromotionFlag;
    use axum::body::Body;

    fn create_request_with_auth(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn create_request_with_cookie(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::COOKIE, format!("theme=dark; session={}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let request = create_request_with_auth("desk-token");
        assert_eq!(extract_session_token(&request), Some("desk-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let request = create_request_with_cookie("desk-cookie");
        assert_eq!(extract_session_token(&request), Some("desk-cookie".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer bearer-token")
            .header(header::COOKIE, "session=cookie-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(&request), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert!(extract_session_token(&request).is_none());

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Basic invalid")
            .body(Body::empty())
            .unwrap();
        assert!(extract_session_token(&request).is_none());
    }

    #[test]
    fn test_promotion_errors_map_to_distinct_codes() {
        let limit: ApiError = PromotionError::LimitExceeded {
            flag: PromotionFlag::Featured,
            max: 7,
        }
        .into();
        assert_eq!(limit.error.code, "LIMIT_EXCEEDED");
        assert_eq!(limit.status(), StatusCode::CONFLICT);
        assert_eq!(limit.error.message, "cannot feature more than 7 articles");
        assert_eq!(limit.error.details, Some(serde_json::json!({"flag": "featured", "max": 7})));

        let conflict: ApiError = PromotionError::Conflict("is latest headline".into()).into();
        assert_eq!(conflict.error.code, "CONFLICT");
        assert_eq!(conflict.error.message, "is latest headline");
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let invalid: ApiError = PromotionError::InvalidArgument("topic required".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = PromotionError::NotFound(3).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_push_not_configured_is_unavailable() {
        let error: ApiError = PushServiceError::NotConfigured.into();
        assert_eq!(error.error.code, "SERVICE_UNAVAILABLE");
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_error_keeps_context_chain() {
        let error: ApiError = anyhow::anyhow!("disk full").context("Failed to save").into();
        assert_eq!(error.error.code, "INTERNAL_ERROR");
        assert_eq!(error.error.message, "Failed to save: disk full");
    }
}
