use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::abi::keccak256;

/// Registry role identifier: keccak-256 of the role name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId([u8; 32]);

impl RoleId {
    /// Community administrator role.
    pub const COMMUNITY: &'static str = "COMMUNITY";
    /// End-user membership role.
    pub const ENDUSER: &'static str = "ENDUSER";
    /// Shared super-paymaster operator role.
    pub const PAYMASTER_SUPER: &'static str = "PAYMASTER_SUPER";
    /// Self-hosted paymaster operator role.
    pub const PAYMASTER_AOA: &'static str = "PAYMASTER_AOA";

    /// Derives a role id from its registry name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(keccak256(name.as_bytes()))
    }

    /// Creates a role id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Resolves a role by well-known name or raw 32-byte hex id.
    pub fn parse(value: &str) -> AppResult<Self> {
        let upper = value.trim().to_ascii_uppercase();
        match upper.as_str() {
            Self::COMMUNITY | Self::ENDUSER | Self::PAYMASTER_SUPER | Self::PAYMASTER_AOA => {
                Ok(Self::from_name(upper.as_str()))
            }
            _ => value.parse(),
        }
    }

    /// Returns the raw role id bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for RoleId {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        let digits = value.trim().trim_start_matches("0x");
        let bytes = hex::decode(digits)
            .map_err(|error| AppError::Validation(format!("invalid role id '{value}': {error}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            AppError::Validation(format!("invalid role id '{value}': expected 32 bytes"))
        })?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for RoleId {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        value.parse()
    }
}

impl From<RoleId> for String {
    fn from(value: RoleId) -> Self {
        value.to_string()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "0x{}", hex::encode(self.0))
    }
}

/// Registry configuration tuple for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Tokens burned when the role is granted.
    pub entry_burn: rolegate_core::Amount,
    /// Tokens burned when the role is exited.
    pub exit_burn: rolegate_core::Amount,
    /// Stake lock duration in seconds.
    pub lock_duration: u128,
    /// Whether the registry accepts registrations for the role.
    pub is_active: bool,
}
