use chrono::{DateTime, Utc};
use rolegate_core::{Address, TxHash};
use serde::{Deserialize, Serialize};

use crate::identity::{Identity, IdentityView};

/// Append-only history entry for one submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Step or operation label.
    pub label: String,
    /// Transaction hash.
    pub id: TxHash,
    /// Time the outcome was observed.
    pub timestamp: DateTime<Utc>,
    /// Identity the transaction was submitted for.
    #[serde(default)]
    pub identity: Option<String>,
    /// False when the transaction reverted or was not confirmed.
    #[serde(default = "default_succeeded")]
    pub succeeded: bool,
}

fn default_succeeded() -> bool {
    true
}

impl TransactionRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn now(label: impl Into<String>, id: TxHash, identity: Option<String>, succeeded: bool) -> Self {
        Self {
            label: label.into(),
            id,
            timestamp: Utc::now(),
            identity,
            succeeded,
        }
    }
}

/// Launched community remembered between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMarker {
    /// Community administrator address.
    pub community_address: Address,
    /// Community points token, when discovered.
    pub community_token: Option<Address>,
}

/// Everything the workflow state store persists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Stored identities.
    #[serde(default)]
    pub identities: Vec<Identity>,
    /// Transaction history, oldest first.
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    /// Last launched community.
    #[serde(default)]
    pub community_address: Option<Address>,
    /// Points token of the last launched community.
    #[serde(default)]
    pub community_token: Option<Address>,
}

impl WorkflowState {
    /// Returns the key-free projection of the state.
    #[must_use]
    pub fn public_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            identities: self.identities.iter().map(Identity::public_view).collect(),
            transactions: self.transactions.clone(),
            community_address: self.community_address,
            community_token: self.community_token,
        }
    }
}

/// State projection safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Stored identities without keys.
    pub identities: Vec<IdentityView>,
    /// Transaction history, oldest first.
    pub transactions: Vec<TransactionRecord>,
    /// Last launched community.
    pub community_address: Option<Address>,
    /// Points token of the last launched community.
    pub community_token: Option<Address>,
}
