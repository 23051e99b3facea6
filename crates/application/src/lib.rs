//! Application services and ports.

#![forbid(unsafe_code)]

mod identity_service;
mod ledger_ports;
mod precondition_resolver;
mod protocol_settings;
mod provisioner;
mod retry;
mod serialized_submitter;
mod state_ports;
mod state_query_service;
#[cfg(test)]
mod test_support;
mod transaction_executor;
mod workflow_orchestrator;

pub use identity_service::IdentityService;
pub use ledger_ports::{GeneratedKey, KeyGenerator, LedgerReader, Receipt, TransactionSubmitter};
pub use precondition_resolver::PreconditionResolver;
pub use protocol_settings::ProtocolAddresses;
pub use provisioner::{FundingReport, ProvisioningOutcome, Provisioner};
pub use retry::RetryPolicy;
pub use serialized_submitter::SerializedSubmitter;
pub use state_ports::WorkflowStateStore;
pub use state_query_service::StateQueryService;
pub use workflow_orchestrator::{WorkflowOrchestrator, WorkflowRequest};
