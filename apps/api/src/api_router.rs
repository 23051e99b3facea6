use axum::Router;
use axum::routing::{get, post};
use rolegate_core::AppError;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

mod cors;

use cors::build_cors_layer;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let api_routes = Router::new()
        .route(
            "/api/identities",
            get(handlers::identities::list_identities_handler)
                .post(handlers::identities::generate_identities_handler),
        )
        .route(
            "/api/identities/fund",
            post(handlers::identities::fund_identities_handler),
        )
        .route(
            "/api/workflows/run",
            post(handlers::workflows::run_workflow_handler),
        )
        .route(
            "/api/workflows/batch",
            post(handlers::workflows::run_workflow_batch_handler),
        )
        .route(
            "/api/state",
            get(handlers::queries::state_snapshot_handler)
                .delete(handlers::queries::reset_state_handler),
        )
        .route(
            "/api/communities/{address}",
            get(handlers::queries::community_info_handler),
        )
        .route(
            "/api/operators/{address}",
            get(handlers::queries::operator_status_handler),
        )
        .route("/api/balances", get(handlers::queries::balances_handler))
        .route(
            "/api/roles/{role}/consistency/{address}",
            get(handlers::queries::role_consistency_handler),
        );

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
