//! Article API endpoints
//!
//! Public:
//! - GET /api/v1/articles - Paged listing, optional `category`
//! - GET /api/v1/articles/featured - Featured rail
//! - GET /api/v1/articles/trending - Trending rail
//! - GET /api/v1/articles/latest - Latest headlines
//! - GET /api/v1/articles/search?q= - Title/summary search
//! - GET /api/v1/articles/{slug} - Single article
//! - POST /api/v1/articles/{id}/view - Count a view (numeric id)
//!
//! Staff (under /api/v1/admin):
//! - GET /articles, POST /articles, GET|PUT|DELETE /articles/{id}
//! - PUT /articles/{id}/featured, PUT /articles/{id}/trending
//! - GET /articles/{id}/seo, POST /seo/analyze

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Article, CreateArticleInput, ListParams, UpdateArticleInput};
use crate::services::{analyze_seo, SeoInput, SeoReport};

/// Query parameters for listing articles
#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub category: Option<String>,
}

/// Query parameters for search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Response for unpaged article rails
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleListResponse {
    pub articles: Vec<Article>,
}

/// Request body for the featured toggle
#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub featured: bool,
}

/// Request body for the trending toggle
#[derive(Debug, Deserialize)]
pub struct TrendingRequest {
    pub trending: bool,
    #[serde(default)]
    pub topic: Option<String>,
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /api/v1/articles
pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<PageResponse<Article>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let result = state
        .article_service
        .list(&params, query.category.as_deref())
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/articles/featured
pub async fn list_featured(State(state): State<AppState>) -> Result<Json<ArticleListResponse>, ApiError> {
    let articles = state.article_service.list_featured().await?;
    Ok(Json(ArticleListResponse { articles }))
}

/// GET /api/v1/articles/trending
pub async fn list_trending(State(state): State<AppState>) -> Result<Json<ArticleListResponse>, ApiError> {
    let articles = state.article_service.list_trending().await?;
    Ok(Json(ArticleListResponse { articles }))
}

/// GET /api/v1/articles/latest
pub async fn latest_headlines(State(state): State<AppState>) -> Result<Json<ArticleListResponse>, ApiError> {
    let articles = state.article_service.latest_headlines().await?;
    Ok(Json(ArticleListResponse { articles }))
}

/// GET /api/v1/articles/search?q=
pub async fn search_articles(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PageResponse<Article>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let result = state.article_service.search(&query.q, &params).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/articles/{slug}
pub async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Article>, ApiError> {
    let article = state
        .article_service
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Article not found: {}", slug)))?;
    Ok(Json(article))
}

/// POST /api/v1/articles/{id}/view
pub async fn record_view(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.article_service.record_view(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Staff handlers
// ============================================================================

/// GET /api/v1/admin/articles
pub async fn admin_list_articles(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Article>>, ApiError> {
    let result = state.article_service.list(&query.params(), None).await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/admin/articles
pub async fn create_article(
    State(state): State<AppState>,
    Json(body): Json<CreateArticleInput>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let article = state.article_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// GET /api/v1/admin/articles/{id}
pub async fn get_article_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    let article = state
        .article_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Article not found: {}", id)))?;
    Ok(Json(article))
}

/// PUT /api/v1/admin/articles/{id}
///
/// Promotion flags in the body are ignored; use the featured/trending endpoints.
pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateArticleInput>,
) -> Result<Json<Article>, ApiError> {
    let article = state.article_service.update(id, body).await?;
    Ok(Json(article))
}

/// DELETE /api/v1/admin/articles/{id}
pub async fn delete_article(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.article_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/admin/articles/{id}/featured
pub async fn set_featured(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<FeatureRequest>,
) -> Result<Json<Article>, ApiError> {
    let article = state.promotion_engine.request_feature(id, body.featured).await?;
    Ok(Json(article))
}

/// PUT /api/v1/admin/articles/{id}/trending
pub async fn set_trending(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TrendingRequest>,
) -> Result<Json<Article>, ApiError> {
    let article = state
        .promotion_engine
        .request_trending(id, body.trending, body.topic.as_deref())
        .await?;
    Ok(Json(article))
}

/// GET /api/v1/admin/articles/{id}/seo
pub async fn article_seo(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<SeoReport>, ApiError> {
    let article = state
        .article_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Article not found: {}", id)))?;
    let report = analyze_seo(&SeoInput::from(&article))?;
    Ok(Json(report))
}

/// POST /api/v1/admin/seo/analyze - Score an unsaved draft
pub async fn analyze_draft(Json(body): Json<SeoInput>) -> Result<Json<SeoReport>, ApiError> {
    Ok(Json(analyze_seo(&body)?))
}
