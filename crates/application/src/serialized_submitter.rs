use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rolegate_core::{Address, AppResult, TxHash};
use rolegate_domain::{ContractCall, Identity};
use tokio::sync::Mutex;

use crate::ledger_ports::{Receipt, TransactionSubmitter};

/// Serializes submissions per signing address.
///
/// The lock spans the wrapped submitter's whole `submit`, so its nonce read and
/// broadcast never interleave with another submission from the same signer.
/// Different signers proceed in parallel and finalization waits are not locked.
pub struct SerializedSubmitter {
    inner: Arc<dyn TransactionSubmitter>,
    signer_locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl SerializedSubmitter {
    /// Wraps a submitter.
    #[must_use]
    pub fn new(inner: Arc<dyn TransactionSubmitter>) -> Self {
        Self {
            inner,
            signer_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn signer_lock(&self, signer: Address) -> Arc<Mutex<()>> {
        self.signer_locks
            .lock()
            .await
            .entry(signer)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl TransactionSubmitter for SerializedSubmitter {
    async fn submit(&self, identity: &Identity, call: &ContractCall) -> AppResult<TxHash> {
        let lock = self.signer_lock(identity.signer_address()).await;
        let _guard = lock.lock().await;
        self.inner.submit(identity, call).await
    }

    async fn await_finalization(&self, tx_hash: TxHash) -> AppResult<Receipt> {
        self.inner.await_finalization(tx_hash).await
    }
}
