//! Web story API endpoints
//!
//! - GET /api/v1/stories - Paged listing
//! - GET /api/v1/stories/{slug} - Single story
//! - POST /api/v1/admin/stories - Create (staff)
//! - PUT /api/v1/admin/stories/{id} - Update (staff)
//! - DELETE /api/v1/admin/stories/{id} - Delete (staff)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::api::common::{PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateWebStoryInput, UpdateWebStoryInput, WebStory};

/// GET /api/v1/stories
pub async fn list_stories(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<WebStory>>, ApiError> {
    let result = state.story_service.list(&query.params()).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/stories/{slug}
pub async fn get_story(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<WebStory>, ApiError> {
    let story = state
        .story_service
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Web story not found: {}", slug)))?;
    Ok(Json(story))
}

/// POST /api/v1/admin/stories
pub async fn create_story(
    State(state): State<AppState>,
    Json(body): Json<CreateWebStoryInput>,
) -> Result<(StatusCode, Json<WebStory>), ApiError> {
    let story = state.story_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(story)))
}

/// PUT /api/v1/admin/stories/{id}
pub async fn update_story(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateWebStoryInput>,
) -> Result<Json<WebStory>, ApiError> {
    let story = state.story_service.update(id, body).await?;
    Ok(Json(story))
}

/// DELETE /api/v1/admin/stories/{id}
pub async fn delete_story(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.story_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
