//! HTTP and WebSocket surface
//!
//! One router: the WebSocket signaling endpoint plus health and stats
//! routes, with request tracing and permissive CORS (browsers connect from
//! arbitrary origins during development; deployments front this with their
//! own policy).

pub mod error;
pub mod health;
pub mod messages;
pub mod stats;
pub mod websocket;

pub use error::{AppError, AppResult};

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use huddle_core::SignalingCoordinator;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SignalingCoordinator>,
}

/// Build the HTTP router
pub fn create_router(coordinator: Arc<SignalingCoordinator>) -> Router {
    let state = AppState { coordinator };

    Router::new()
        .merge(health::create_health_router())
        .route("/api/ws", get(websocket::websocket_handler))
        .route("/api/stats", get(stats::get_stats))
        .route("/api/rooms/{room_id}", get(stats::get_room_snapshot))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use huddle_core::test_helpers::test_coordinator;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_route() {
        let router = create_router(test_coordinator());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_route() {
        let coordinator = test_coordinator();
        coordinator.create_room().await.expect("room");

        let router = create_router(coordinator);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let stats: serde_json::Value =
            serde_json::from_slice(&body).expect("stats should be JSON");
        assert_eq!(stats["active_rooms"], 1);
    }

    #[tokio::test]
    async fn test_room_snapshot_not_found() {
        let router = create_router(test_coordinator());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/rooms/missing")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let error: serde_json::Value =
            serde_json::from_slice(&body).expect("error should be JSON");
        assert_eq!(error["kind"], "room_not_found");
    }
}
