//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod chain_config;
mod in_memory_workflow_state_store;
mod json_file_workflow_state_store;
mod json_rpc_ledger_client;
mod k256_key_generator;
mod legacy_transaction;

pub use chain_config::{ChainConfig, format_token_amount, parse_token_amount};
pub use in_memory_workflow_state_store::InMemoryWorkflowStateStore;
pub use json_file_workflow_state_store::JsonFileWorkflowStateStore;
pub use json_rpc_ledger_client::{JsonRpcLedgerClient, JsonRpcSettings};
pub use k256_key_generator::K256KeyGenerator;
