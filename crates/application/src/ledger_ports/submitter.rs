use async_trait::async_trait;
use rolegate_core::{AppResult, TxHash};
use rolegate_domain::{ContractCall, Identity};
use serde::{Deserialize, Serialize};

/// Finalized transaction outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block that included the transaction.
    pub block_number: u64,
    /// False when execution reverted.
    pub success: bool,
}

/// Port for signing, broadcasting and awaiting state-changing calls.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Signs `call` with the identity's key and broadcasts it.
    ///
    /// Submissions from one signer are serialized so nonces never collide.
    async fn submit(&self, identity: &Identity, call: &ContractCall) -> AppResult<TxHash>;

    /// Waits until the transaction is finalized or the deadline passes.
    async fn await_finalization(&self, tx_hash: TxHash) -> AppResult<Receipt>;
}
