//! Staff API endpoints
//!
//! Everything under /api/v1/admin requires a staff token (see
//! [`crate::api::middleware::require_staff`]).

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::api::{articles, push, stories};
use crate::services::DashboardStats;

/// Build the staff router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(dashboard_stats))
        .route(
            "/articles",
            get(articles::admin_list_articles).post(articles::create_article),
        )
        .route(
            "/articles/{id}",
            get(articles::get_article_by_id)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        .route("/articles/{id}/featured", put(articles::set_featured))
        .route("/articles/{id}/trending", put(articles::set_trending))
        .route("/articles/{id}/seo", get(articles::article_seo))
        .route("/seo/analyze", post(articles::analyze_draft))
        .route("/stories", post(stories::create_story))
        .route(
            "/stories/{id}",
            put(stories::update_story).delete(stories::delete_story),
        )
        .route("/push/send", post(push::send_notification))
        .route("/push/notifications", get(push::list_notifications))
}

/// GET /api/v1/admin/stats
pub async fn dashboard_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let stats = state.stats_service.dashboard().await?;
    Ok(Json(stats))
}
