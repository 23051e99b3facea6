use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use rolegate_core::Address;
use rolegate_domain::{
    AccountBalances, CommunityInfo, OperatorStatus, RoleConsistencyReport, RoleId, StateSnapshot,
};

use crate::dto::BalancesQuery;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn state_snapshot_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<StateSnapshot>> {
    Ok(Json(state.state_query_service.snapshot().await?))
}

pub async fn reset_state_handler(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.state_query_service.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn community_info_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<CommunityInfo>> {
    let address = address.parse::<Address>()?;
    Ok(Json(state.state_query_service.community_info(address).await?))
}

pub async fn operator_status_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<OperatorStatus>> {
    let address = address.parse::<Address>()?;
    Ok(Json(state.state_query_service.operator_status(address).await?))
}

pub async fn balances_handler(
    State(state): State<AppState>,
    Query(query): Query<BalancesQuery>,
) -> ApiResult<Json<Vec<AccountBalances>>> {
    let addresses = query.addresses()?;
    Ok(Json(state.state_query_service.balances(&addresses).await?))
}

pub async fn role_consistency_handler(
    State(state): State<AppState>,
    Path((role, address)): Path<(String, String)>,
) -> ApiResult<Json<RoleConsistencyReport>> {
    let role = RoleId::parse(&role)?;
    let address = address.parse::<Address>()?;
    Ok(Json(
        state
            .state_query_service
            .role_consistency(role, address)
            .await?,
    ))
}
