use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use rolegate_application::WorkflowStateStore;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{CommunityMarker, Identity, TransactionRecord, WorkflowState};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Workflow state persisted as one JSON document.
///
/// Writes go to a sibling temp file that is renamed over the target, so readers
/// never see a half-written document. A missing or unreadable file loads as empty;
/// an unreadable file is moved to `<name>.corrupt` before the next write replaces it.
pub struct JsonFileWorkflowStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileWorkflowStateStore {
    /// Creates a store backed by `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_state(&self) -> AppResult<WorkflowState> {
        Ok(self.read_document().await?.unwrap_or_default())
    }

    /// Reads the document; `None` means the file exists but does not decode.
    async fn read_document(&self) -> AppResult<Option<WorkflowState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "state file missing, starting empty");
                return Ok(Some(WorkflowState::default()));
            }
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to read state file '{}': {error}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(state) => Ok(Some(state)),
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "state file is corrupt, starting empty"
                );
                Ok(None)
            }
        }
    }

    async fn set_aside_corrupt(&self) -> AppResult<()> {
        let corrupt_path = self.path.with_extension("json.corrupt");
        tokio::fs::rename(&self.path, &corrupt_path)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to move corrupt state file to '{}': {error}",
                    corrupt_path.display()
                ))
            })?;
        warn!(
            path = %self.path.display(),
            moved_to = %corrupt_path.display(),
            "kept unreadable state file aside"
        );
        Ok(())
    }

    async fn write_state(&self, state: &WorkflowState) -> AppResult<()> {
        let document = serde_json::to_vec_pretty(state)
            .map_err(|error| AppError::Internal(format!("failed to encode state: {error}")))?;
        let temp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&temp_path, document).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to write state file '{}': {error}",
                temp_path.display()
            ))
        })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to replace state file '{}': {error}",
                    self.path.display()
                ))
            })
    }

    async fn update<F>(&self, change: F) -> AppResult<()>
    where
        F: FnOnce(&mut WorkflowState) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut state = match self.read_document().await? {
            Some(state) => state,
            None => {
                self.set_aside_corrupt().await?;
                WorkflowState::default()
            }
        };
        change(&mut state);
        self.write_state(&state).await
    }
}

#[async_trait]
impl WorkflowStateStore for JsonFileWorkflowStateStore {
    async fn load(&self) -> AppResult<Vec<Identity>> {
        Ok(self.read_state().await?.identities)
    }

    async fn save(&self, identities: Vec<Identity>) -> AppResult<()> {
        self.update(|state| state.identities = identities).await
    }

    async fn append(&self, record: TransactionRecord) -> AppResult<()> {
        self.update(|state| state.transactions.push(record)).await
    }

    async fn record_community(&self, marker: CommunityMarker) -> AppResult<()> {
        self.update(|state| {
            state.community_address = Some(marker.community_address);
            state.community_token = marker.community_token;
        })
        .await
    }

    async fn snapshot(&self) -> AppResult<WorkflowState> {
        self.read_state().await
    }

    async fn reset(&self) -> AppResult<()> {
        self.update(|state| *state = WorkflowState::default()).await
    }
}
