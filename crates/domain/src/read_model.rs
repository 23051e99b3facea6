use rolegate_core::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::role::RoleId;

/// Community registration as seen on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityInfo {
    /// Community administrator address.
    pub address: Address,
    /// Whether the address holds the community role.
    pub has_role: bool,
    /// Points token deployed for the community.
    pub token_address: Option<Address>,
    /// Registered community name.
    pub name: Option<String>,
    /// Registered description.
    pub description: Option<String>,
}

/// Paymaster roles an operator holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCapability {
    /// No paymaster role.
    None,
    /// Shared super-paymaster role only.
    SuperPaymaster,
    /// Self-hosted paymaster role only.
    PaymasterV4,
    /// Both paymaster roles.
    Hybrid,
}

impl OperatorCapability {
    /// Derives the capability from the two role checks.
    #[must_use]
    pub fn from_roles(super_paymaster: bool, paymaster_v4: bool) -> Self {
        match (super_paymaster, paymaster_v4) {
            (true, true) => Self::Hybrid,
            (true, false) => Self::SuperPaymaster,
            (false, true) => Self::PaymasterV4,
            (false, false) => Self::None,
        }
    }
}

/// Operator capability report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorStatus {
    /// Operator address.
    pub address: Address,
    /// Paymaster roles held.
    pub capability: OperatorCapability,
}

/// Balances of one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    /// Queried address.
    pub address: Address,
    /// Native balance.
    pub native: Amount,
    /// Governance token balance.
    pub governance_token: Amount,
    /// Community points token balance, when a points token is configured.
    pub points_token: Option<Amount>,
}

/// Agreement between `hasRole` and the registry's member list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConsistencyReport {
    /// Checked role.
    pub role: RoleId,
    /// Checked address.
    pub address: Address,
    /// `hasRole` answer.
    pub has_role: bool,
    /// Whether the address appears in `getRoleMembers`.
    pub listed_as_member: bool,
    /// True when both views agree.
    pub consistent: bool,
}

impl RoleConsistencyReport {
    /// Builds a report from the two registry views.
    #[must_use]
    pub fn new(role: RoleId, address: Address, has_role: bool, listed_as_member: bool) -> Self {
        Self {
            role,
            address,
            has_role,
            listed_as_member,
            consistent: has_role == listed_as_member,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OperatorCapability;

    #[test]
    fn capability_covers_every_role_combination() {
        assert_eq!(
            OperatorCapability::from_roles(true, true),
            OperatorCapability::Hybrid
        );
        assert_eq!(
            OperatorCapability::from_roles(true, false),
            OperatorCapability::SuperPaymaster
        );
        assert_eq!(
            OperatorCapability::from_roles(false, true),
            OperatorCapability::PaymasterV4
        );
        assert_eq!(
            OperatorCapability::from_roles(false, false),
            OperatorCapability::None
        );
    }
}
