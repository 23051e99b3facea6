use async_trait::async_trait;
use rolegate_application::WorkflowStateStore;
use rolegate_core::AppResult;
use rolegate_domain::{CommunityMarker, Identity, TransactionRecord, WorkflowState};
use tokio::sync::RwLock;

/// Workflow state kept in process memory; lost on exit.
#[derive(Default)]
pub struct InMemoryWorkflowStateStore {
    state: RwLock<WorkflowState>,
}

impl InMemoryWorkflowStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStateStore for InMemoryWorkflowStateStore {
    async fn load(&self) -> AppResult<Vec<Identity>> {
        Ok(self.state.read().await.identities.clone())
    }

    async fn save(&self, identities: Vec<Identity>) -> AppResult<()> {
        self.state.write().await.identities = identities;
        Ok(())
    }

    async fn append(&self, record: TransactionRecord) -> AppResult<()> {
        self.state.write().await.transactions.push(record);
        Ok(())
    }

    async fn record_community(&self, marker: CommunityMarker) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.community_address = Some(marker.community_address);
        state.community_token = marker.community_token;
        Ok(())
    }

    async fn snapshot(&self) -> AppResult<WorkflowState> {
        Ok(self.state.read().await.clone())
    }

    async fn reset(&self) -> AppResult<()> {
        *self.state.write().await = WorkflowState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rolegate_application::WorkflowStateStore;
    use rolegate_core::{Address, TxHash};
    use rolegate_domain::{CommunityMarker, TransactionRecord};

    use super::InMemoryWorkflowStateStore;

    #[tokio::test]
    async fn community_marker_replaces_previous_one() {
        let store = InMemoryWorkflowStateStore::new();
        let first = CommunityMarker {
            community_address: Address::from_bytes([1; 20]),
            community_token: Some(Address::from_bytes([2; 20])),
        };
        let second = CommunityMarker {
            community_address: Address::from_bytes([3; 20]),
            community_token: None,
        };

        assert!(store.record_community(first).await.is_ok());
        assert!(store.record_community(second).await.is_ok());

        let state = store.snapshot().await.unwrap_or_default();
        assert_eq!(state.community_address, Some(second.community_address));
        assert_eq!(state.community_token, None);
    }

    #[tokio::test]
    async fn history_keeps_append_order() {
        let store = InMemoryWorkflowStateStore::new();
        for index in 1..=3_u8 {
            let record =
                TransactionRecord::now("transfer", TxHash::from_bytes([index; 32]), None, true);
            assert!(store.append(record).await.is_ok());
        }

        let ids = store
            .snapshot()
            .await
            .unwrap_or_default()
            .transactions
            .into_iter()
            .map(|record| record.id.as_bytes()[0])
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
