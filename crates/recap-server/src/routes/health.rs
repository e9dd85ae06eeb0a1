use axum::{extract::State, response::Json as JsonResponse};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

#[derive(Serialize)]
pub(crate) struct HealthCheckResponse {
    pub status: String,
    pub status_code: u16,
    pub uptime_seconds: i64,
    pub jobs_total: i64,
    pub jobs_active: usize,
    pub message: String,
}

pub(crate) async fn health_check(State(state): State<Arc<AppState>>) -> JsonResponse<HealthCheckResponse> {
    let uptime_seconds = (Utc::now() - state.app_start_time).num_seconds();
    let jobs_active = state.pipeline.active_jobs().await;

    match state.db.count_meetings().await {
        Ok(jobs_total) => JsonResponse(HealthCheckResponse {
            status: "healthy".to_string(),
            status_code: 200,
            uptime_seconds,
            jobs_total,
            jobs_active,
            message: "all systems are functioning normally".to_string(),
        }),
        Err(e) => JsonResponse(HealthCheckResponse {
            status: "degraded".to_string(),
            status_code: 500,
            uptime_seconds,
            jobs_total: -1,
            jobs_active,
            message: format!("database unreachable: {}", e),
        }),
    }
}
