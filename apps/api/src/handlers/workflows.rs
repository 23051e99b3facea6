use axum::Json;
use axum::extract::State;
use rolegate_application::WorkflowRequest;
use rolegate_core::AppError;
use rolegate_domain::WorkflowResult;

use crate::dto::BatchWorkflowRequest;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn run_workflow_handler(
    State(state): State<AppState>,
    Json(payload): Json<WorkflowRequest>,
) -> ApiResult<Json<WorkflowResult>> {
    Ok(Json(state.orchestrator.run(payload).await?))
}

pub async fn run_workflow_batch_handler(
    State(state): State<AppState>,
    Json(payload): Json<BatchWorkflowRequest>,
) -> ApiResult<Json<Vec<WorkflowResult>>> {
    if payload.runs.is_empty() {
        return Err(AppError::Validation("batch must contain at least one run".to_owned()).into());
    }

    Ok(Json(state.orchestrator.run_batch(payload.runs).await?))
}
