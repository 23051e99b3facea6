use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::{HealthDependencyStatus, HealthResponse};
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (ledger, block_number) = match state.ledger.block_number().await {
        Ok(block_number) => (
            HealthDependencyStatus {
                status: "ok",
                detail: None,
            },
            Some(block_number),
        ),
        Err(error) => (
            HealthDependencyStatus {
                status: "error",
                detail: Some(format!("ledger check failed: {error}")),
            },
            None,
        ),
    };

    let ready = ledger.status == "ok";
    let http_status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status: if ready { "ok" } else { "degraded" },
            ready,
            ledger,
            block_number,
        }),
    )
}
