//! Readiness checks against the service's real dependencies

use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};

/// Readiness check: the database answers and the media root is a writable directory.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
        (
            "database",
            Box::pin(async {
                database::postgres::check_health(&state.db)
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
        (
            "media",
            Box::pin(async {
                let metadata = tokio::fs::metadata(state.media.root())
                    .await
                    .map_err(|e| format!("Media root unavailable: {}", e))?;
                if !metadata.is_dir() {
                    return Err("Media root is not a directory".to_string());
                }
                if metadata.permissions().readonly() {
                    return Err("Media root is read-only".to_string());
                }
                Ok::<(), String>(())
            }),
        ),
    ];

    match run_health_checks(checks).await {
        Ok((status, json)) => (status, json).into_response(),
        Err((status, json)) => (status, json).into_response(),
    }
}
