//! Domain entities and invariants.

#![forbid(unsafe_code)]

/// Contract ABI encoding and decoding.
pub mod abi;
pub mod protocol;

mod identity;
mod read_model;
mod record;
mod requirement;
mod revert;
mod role;
mod workflow;

pub use identity::{Identity, IdentityFlavor, IdentityKind, IdentityView, SigningKeyHex};
pub use protocol::ContractCall;
pub use read_model::{
    AccountBalances, CommunityInfo, OperatorCapability, OperatorStatus, RoleConsistencyReport,
};
pub use record::{CommunityMarker, StateSnapshot, TransactionRecord, WorkflowState};
pub use requirement::{PolicyOverrides, ProvisioningPolicy, Resource, ResourceRequirement};
pub use revert::{RevertCatalog, RevertReason};
pub use role::{RoleConfig, RoleId};
pub use workflow::{
    CommunityProfile, DEFAULT_OPERATOR_STAKE, Resolution, StepReport, StepStatus, TerminalIdentifiers, WorkflowFailure,
    WorkflowResult, WorkflowRunStatus, WorkflowStep, WorkflowTarget,
};
