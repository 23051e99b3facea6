use rolegate_application::{
    IdentityService, LedgerReader, Provisioner, ProtocolAddresses, StateQueryService,
    WorkflowOrchestrator,
};
use rolegate_domain::ProvisioningPolicy;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub identity_service: IdentityService,
    pub provisioner: Provisioner,
    pub orchestrator: WorkflowOrchestrator,
    pub state_query_service: StateQueryService,
    pub ledger: Arc<dyn LedgerReader>,
    pub addresses: ProtocolAddresses,
    pub policy: ProvisioningPolicy,
}
