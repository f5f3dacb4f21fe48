pub mod actions;
pub mod auth;
pub mod authz;
pub mod cache;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

#[cfg(test)]
pub mod testing;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::SecurityConfig;
use crate::handlers::{management, protected, public};
use crate::state::AppState;

/// Full HTTP surface over the given state
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/actions", get(protected::actions::list))
        .route("/api/actions/:name", post(protected::actions::run))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::jwt_auth_middleware,
        ));

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/c/:token", get(public::resolve_link))
        .route("/api/v1/management/me", get(management::me))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::AppConfig;
    use crate::database::MemoryStore;

    fn state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), AppConfig::development()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let res = app(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn action_routes_need_a_session() {
        let res = app(state())
            .oneshot(Request::get("/api/actions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signed_in_users_see_the_action_names() {
        let state = state();
        let token = auth::generate_jwt(&state.config.security, Uuid::new_v4(), None).unwrap();

        let res = app(state)
            .oneshot(
                Request::get("/api/actions")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let names = json["data"].as_array().unwrap();
        assert!(names.iter().any(|n| n == "importContacts"));
    }
}
