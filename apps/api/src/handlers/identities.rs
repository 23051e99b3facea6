use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use rolegate_domain::IdentityView;

use crate::dto::{
    FundIdentitiesRequest, FundIdentitiesResponse, GenerateIdentitiesRequest,
    GeneratedIdentityResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn generate_identities_handler(
    State(state): State<AppState>,
    Json(payload): Json<GenerateIdentitiesRequest>,
) -> ApiResult<(StatusCode, Json<Vec<GeneratedIdentityResponse>>)> {
    let identities = state
        .identity_service
        .generate(payload.names, payload.kind)
        .await?
        .iter()
        .map(|identity| GeneratedIdentityResponse::from_identity(identity, payload.reveal_keys))
        .collect();

    Ok((StatusCode::CREATED, Json(identities)))
}

pub async fn list_identities_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<IdentityView>>> {
    Ok(Json(state.identity_service.list().await?))
}

pub async fn fund_identities_handler(
    State(state): State<AppState>,
    Json(payload): Json<FundIdentitiesRequest>,
) -> ApiResult<Json<FundIdentitiesResponse>> {
    let policy = state.policy.with_overrides(&payload.overrides()?);
    let identities = state.identity_service.all().await?;

    let reports = state
        .provisioner
        .fund_identities(&identities, &policy, state.addresses.governance_token)
        .await?;

    Ok(Json(FundIdentitiesResponse::from(reports)))
}
