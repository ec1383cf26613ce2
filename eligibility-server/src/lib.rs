//! Eligibility verification daemon
//!
//! Hosts the verification engine: the recurring sweep runs in the
//! background and connected dashboards receive alerts over `/ws/alerts`.

pub mod config;
pub mod handlers;

pub use config::ServerConfig;

use std::sync::Arc;

use axum::{routing::get, Router};
use insurance_service::InsuranceService;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InsuranceService>,
    /// Channel capacity for each alert socket
    pub observer_buffer: usize,
}

impl AppState {
    pub fn new(service: Arc<InsuranceService>, observer_buffer: usize) -> Self {
        Self { service, observer_buffer }
    }
}

/// Create the router with health and alert socket routes
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ws/alerts", get(handlers::ws::alerts_socket))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use events_bus::BroadcastHub;
    use insurance_service::{EngineConfig, InMemoryVerificationStore};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let service = InsuranceService::new(
            Arc::new(InMemoryVerificationStore::new()),
            BroadcastHub::new(),
            EngineConfig::default(),
        );
        AppState::new(Arc::new(service), 16)
    }

    #[tokio::test]
    async fn test_health_reports_scheduler_state() {
        let app = create_app(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["scheduler"], "stopped");
        assert_eq!(value["observers"], 0);
    }

    #[tokio::test]
    async fn test_alert_socket_requires_upgrade() {
        let app = create_app(test_state());

        let response = app
            .oneshot(Request::builder().uri("/ws/alerts").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_app(test_state());

        let response = app
            .oneshot(Request::builder().uri("/api/v1/alerts").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
