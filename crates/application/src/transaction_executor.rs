use std::sync::Arc;

use rolegate_core::{AppError, AppResult, TxHash};
use rolegate_domain::{ContractCall, Identity, TransactionRecord};
use tracing::{info, warn};

use crate::ledger_ports::{Receipt, TransactionSubmitter};
use crate::state_ports::WorkflowStateStore;

/// Outcome of one submit-and-wait cycle.
pub(crate) struct Execution {
    /// Hash of the broadcast transaction, absent when broadcasting failed.
    pub tx_hash: Option<TxHash>,
    /// Finalized receipt or the failure.
    pub outcome: AppResult<Receipt>,
}

/// Submits calls, waits for finalization and journals every broadcast transaction.
#[derive(Clone)]
pub(crate) struct TransactionExecutor {
    submitter: Arc<dyn TransactionSubmitter>,
    store: Arc<dyn WorkflowStateStore>,
}

impl TransactionExecutor {
    pub(crate) fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        store: Arc<dyn WorkflowStateStore>,
    ) -> Self {
        Self { submitter, store }
    }

    pub(crate) async fn execute(
        &self,
        signer: &Identity,
        call: &ContractCall,
        label: &str,
        owner_name: &str,
    ) -> Execution {
        let tx_hash = match self.submitter.submit(signer, call).await {
            Ok(tx_hash) => tx_hash,
            Err(error) => {
                return Execution {
                    tx_hash: None,
                    outcome: Err(error),
                };
            }
        };
        info!(signer = signer.name(), tx = %tx_hash, label, "transaction broadcast");

        let outcome = match self.submitter.await_finalization(tx_hash).await {
            Ok(receipt) if !receipt.success => Err(AppError::ExecutionReverted(format!(
                "transaction {tx_hash} reverted in block {}",
                receipt.block_number
            ))),
            other => other,
        };

        let record = TransactionRecord::now(
            label,
            tx_hash,
            Some(owner_name.to_owned()),
            outcome.is_ok(),
        );
        if let Err(error) = self.store.append(record).await {
            warn!(tx = %tx_hash, error = %error, "failed to journal transaction");
        }

        Execution {
            tx_hash: Some(tx_hash),
            outcome,
        }
    }
}
