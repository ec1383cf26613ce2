use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use insurance_service::SchedulerState;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scheduler: SchedulerState,
    pub observers: usize,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        scheduler: state.service.scheduler().state(),
        observers: state.service.hub().observer_count().await,
        timestamp: Utc::now(),
    })
}
