use rolegate_core::Address;

/// Deployed contract addresses the workflows talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolAddresses {
    /// Role registry.
    pub registry: Address,
    /// Governance token staked for roles.
    pub governance_token: Address,
    /// Staking contract that pulls approved stakes.
    pub staking: Address,
    /// Smart-account factory for contract-backed identities.
    pub account_factory: Option<Address>,
    /// Community points-token factory.
    pub points_factory: Option<Address>,
    /// Membership soul-bound token.
    pub sbt: Option<Address>,
    /// Community points token reported in balance queries.
    pub points_token: Option<Address>,
}
