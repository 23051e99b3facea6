use rolegate_core::{Address, Amount, AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A fungible resource an identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "token", rename_all = "snake_case")]
pub enum Resource {
    /// The ledger's native currency, used for gas.
    Native,
    /// An ERC-20 token at the given address.
    Token(Address),
}

impl std::fmt::Display for Resource {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => formatter.write_str("native"),
            Self::Token(token) => write!(formatter, "token {token}"),
        }
    }
}

/// Balance an identity must hold before a workflow can proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ResourceRequirementFields")]
pub struct ResourceRequirement {
    resource: Resource,
    minimum_balance: Amount,
    target_balance: Amount,
}

#[derive(Deserialize)]
struct ResourceRequirementFields {
    resource: Resource,
    minimum_balance: Amount,
    target_balance: Amount,
}

impl TryFrom<ResourceRequirementFields> for ResourceRequirement {
    type Error = AppError;

    fn try_from(value: ResourceRequirementFields) -> AppResult<Self> {
        Self::new(value.resource, value.minimum_balance, value.target_balance)
    }
}

impl ResourceRequirement {
    /// Creates a requirement; the target must not be below the minimum.
    pub fn new(resource: Resource, minimum_balance: Amount, target_balance: Amount) -> AppResult<Self> {
        if target_balance < minimum_balance {
            return Err(AppError::Validation(format!(
                "target balance {target_balance} for {resource} is below minimum {minimum_balance}"
            )));
        }

        Ok(Self {
            resource,
            minimum_balance,
            target_balance,
        })
    }

    /// Returns the resource.
    #[must_use]
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Returns the balance below which a top-up happens.
    #[must_use]
    pub fn minimum_balance(&self) -> Amount {
        self.minimum_balance
    }

    /// Returns the balance a top-up restores.
    #[must_use]
    pub fn target_balance(&self) -> Amount {
        self.target_balance
    }

    /// Returns true when `current` already meets the minimum.
    #[must_use]
    pub fn is_met_by(&self, current: Amount) -> bool {
        current >= self.minimum_balance
    }

    /// Returns how much a top-up from `current` adds.
    #[must_use]
    pub fn shortfall(&self, current: Amount) -> Amount {
        self.target_balance.saturating_sub(current)
    }
}

/// Minimum and target balances applied when funding identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPolicy {
    /// Native balance below which gas is topped up.
    pub native_minimum: Amount,
    /// Native balance restored by a top-up.
    pub native_target: Amount,
    /// Governance token balance below which tokens are topped up.
    pub token_minimum: Amount,
    /// Governance token balance restored by a top-up.
    pub token_target: Amount,
}

impl ProvisioningPolicy {
    /// Native gas requirement.
    pub fn native_requirement(&self) -> AppResult<ResourceRequirement> {
        ResourceRequirement::new(Resource::Native, self.native_minimum, self.native_target)
    }

    /// Token requirement raised so the balance always covers `stake`.
    pub fn token_requirement(&self, token: Address, stake: Amount) -> AppResult<ResourceRequirement> {
        let minimum = self.token_minimum.max(stake);
        let target = self.token_target.max(minimum);
        ResourceRequirement::new(Resource::Token(token), minimum, target)
    }

    /// Applies optional per-run overrides.
    #[must_use]
    pub fn with_overrides(self, overrides: &PolicyOverrides) -> Self {
        Self {
            native_minimum: overrides.native_minimum.unwrap_or(self.native_minimum),
            native_target: overrides.native_target.unwrap_or(self.native_target),
            token_minimum: overrides.token_minimum.unwrap_or(self.token_minimum),
            token_target: overrides.token_target.unwrap_or(self.token_target),
        }
    }
}

/// Optional per-run balance overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyOverrides {
    /// Native minimum override.
    pub native_minimum: Option<Amount>,
    /// Native target override.
    pub native_target: Option<Amount>,
    /// Token minimum override.
    pub token_minimum: Option<Amount>,
    /// Token target override.
    pub token_target: Option<Amount>,
    /// Stake override for targets that stake.
    pub stake: Option<Amount>,
}
