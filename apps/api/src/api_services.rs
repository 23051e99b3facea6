use std::sync::Arc;

use rolegate_application::{
    IdentityService, KeyGenerator, LedgerReader, PreconditionResolver, Provisioner,
    SerializedSubmitter, StateQueryService, TransactionSubmitter, WorkflowOrchestrator,
    WorkflowStateStore,
};
use rolegate_core::AppError;
use rolegate_infrastructure::{
    ChainConfig, JsonFileWorkflowStateStore, JsonRpcLedgerClient, K256KeyGenerator,
};
use tracing::{info, warn};

use crate::state::AppState;

pub async fn build_app_state(config: &ChainConfig) -> Result<AppState, AppError> {
    let client = Arc::new(JsonRpcLedgerClient::new(
        config.http_client()?,
        config.rpc_url.clone(),
        config.json_rpc_settings(),
    ));
    match client.remote_chain_id().await {
        Ok(remote) if remote != config.chain_id => {
            return Err(AppError::Validation(format!(
                "RPC endpoint reports chain {remote}, expected CHAIN_ID {}",
                config.chain_id
            )));
        }
        Ok(_) => {}
        Err(error) => warn!(error = %error, "could not verify chain id at startup"),
    }

    let ledger: Arc<dyn LedgerReader> = client.clone();
    let submitter: Arc<dyn TransactionSubmitter> = Arc::new(SerializedSubmitter::new(client));
    let store: Arc<dyn WorkflowStateStore> =
        Arc::new(JsonFileWorkflowStateStore::new(config.state_file.clone()));
    let keys: Arc<dyn KeyGenerator> = Arc::new(K256KeyGenerator::new());
    let retry = config.retry_policy();

    let funding_identity = config.funding_identity(keys.as_ref())?;
    info!(
        funder = %funding_identity.address(),
        state_file = %config.state_file.display(),
        "composing services"
    );

    let mut identity_service = IdentityService::new(store.clone(), keys, ledger.clone());
    if let Some(factory) = config.addresses.account_factory {
        identity_service = identity_service.with_account_factory(factory);
    }

    let resolver = PreconditionResolver::new(ledger.clone(), config.addresses, config.policy)
        .with_retry_policy(retry);
    let provisioner = Provisioner::new(
        ledger.clone(),
        submitter.clone(),
        store.clone(),
        Arc::new(funding_identity),
    )
    .with_retry_policy(retry);
    let orchestrator = WorkflowOrchestrator::new(
        store.clone(),
        ledger.clone(),
        submitter,
        resolver,
        provisioner.clone(),
        config.addresses,
    )
    .with_step_retry(retry);
    let state_query_service =
        StateQueryService::new(ledger.clone(), store, config.addresses).with_retry_policy(retry);

    Ok(AppState {
        identity_service,
        provisioner,
        orchestrator,
        state_query_service,
        ledger,
        addresses: config.addresses,
        policy: config.policy,
    })
}
