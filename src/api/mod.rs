//! API layer - HTTP handlers and routing
//!
//! Public endpoints serve the article rails, web stories and push
//! subscriptions. Everything under `/admin` is staff-only.

pub mod admin;
pub mod articles;
pub mod common;
pub mod middleware;
pub mod push;
pub mod stories;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = admin::router().route_layer(axum_middleware::from_fn_with_state(
        state,
        middleware::require_staff,
    ));

    Router::new()
        .route("/articles", get(articles::list_articles))
        .route("/articles/featured", get(articles::list_featured))
        .route("/articles/trending", get(articles::list_trending))
        .route("/articles/latest", get(articles::latest_headlines))
        .route("/articles/search", get(articles::search_articles))
        .route("/articles/{slug}", get(articles::get_article))
        // Same segment name as above; the handler reads it as a numeric id
        .route("/articles/{slug}/view", post(articles::record_view))
        .route("/stories", get(stories::list_stories))
        .route("/stories/{slug}", get(stories::get_story))
        .route(
            "/push/subscriptions",
            post(push::subscribe).delete(push::unsubscribe),
        )
        .nest("/admin", admin_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if cors_origin == "*" {
        return cors.allow_origin(Any);
    }

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!("Invalid CORS origin {:?}: {}, allowing any origin", cors_origin, e);
            cors.allow_origin(Any)
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let mut config = Config::default();
        config.auth.staff_tokens = vec!["desk-token".to_string()];
        let cache = create_cache(&config.cache).await.unwrap();
        AppState::build(pool, cache, &config).unwrap()
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/articles")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_with_configured_origin() {
        let app = build_router(test_state().await, "https://news.example.com");
        let response = app.oneshot(preflight("https://news.example.com")).await.unwrap();

        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://news.example.com"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_cors_wildcard_and_invalid_origin() {
        for configured in ["*", "bad\norigin"] {
            let app = build_router(test_state().await, configured);
            let response = app.oneshot(preflight("https://elsewhere.example.com")).await.unwrap();
            assert_eq!(
                response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
                "*"
            );
            assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        }
    }

    #[tokio::test]
    async fn test_admin_routes_are_guarded() {
        let app = build_router(test_state().await, "*");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/v1/admin/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/admin/stats")
                    .header(header::COOKIE, "session=desk-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
