use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::{CommunityMarker, Identity, TransactionRecord, WorkflowState};

/// Durable store for identities and transaction history.
#[async_trait]
pub trait WorkflowStateStore: Send + Sync {
    /// Loads all stored identities.
    async fn load(&self) -> AppResult<Vec<Identity>>;

    /// Replaces the stored identities.
    async fn save(&self, identities: Vec<Identity>) -> AppResult<()>;

    /// Appends a transaction record.
    async fn append(&self, record: TransactionRecord) -> AppResult<()>;

    /// Remembers the most recently launched community.
    async fn record_community(&self, marker: CommunityMarker) -> AppResult<()>;

    /// Returns everything stored.
    async fn snapshot(&self) -> AppResult<WorkflowState>;

    /// Deletes everything stored.
    async fn reset(&self) -> AppResult<()>;
}
