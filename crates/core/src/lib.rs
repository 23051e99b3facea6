//! Shared primitives for all Rust crates in Rolegate.

#![forbid(unsafe_code)]

/// Ledger value primitives shared across services.
pub mod chain;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chain::{Address, Amount, TxHash};

/// Result type used across Rolegate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
///
/// Ledger-facing variants split failures by how a caller may react to them:
/// `TransientRead` and `Submission` may be retried, everything else may not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network failure or timeout while reading ledger state.
    #[error("transient read error: {0}")]
    TransientRead(String),

    /// Read-only query was rejected by the contract.
    #[error("contract revert: {0}")]
    ContractRevert(String),

    /// Signing or broadcast failed before the call reached a block.
    #[error("submission error: {0}")]
    Submission(String),

    /// Call was included but reverted, or would revert deterministically.
    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    /// Finalization wait exceeded its deadline; outcome is unknown.
    #[error("timed out: {0}")]
    TimedOut(String),

    /// The funding identity cannot cover a top-up.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether repeating the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientRead(_) | Self::Submission(_))
    }

    /// Returns a stable snake-case error code.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::TransientRead(_) => "transient_read",
            Self::ContractRevert(_) => "contract_revert",
            Self::Submission(_) => "submission",
            Self::ExecutionReverted(_) => "execution_reverted",
            Self::TimedOut(_) => "timed_out",
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::Internal(_) => "internal",
        }
    }
}
