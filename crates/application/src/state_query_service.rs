use std::sync::Arc;

use rolegate_core::{Address, AppResult};
use rolegate_domain::abi::{AbiType, decode};
use rolegate_domain::protocol::{points_factory, registry};
use rolegate_domain::{
    AccountBalances, CommunityInfo, OperatorCapability, OperatorStatus, RoleConfig,
    RoleConsistencyReport, RoleId, StateSnapshot,
};
use tracing::warn;

use crate::ledger_ports::LedgerReader;
use crate::protocol_settings::ProtocolAddresses;
use crate::retry::RetryPolicy;
use crate::state_ports::WorkflowStateStore;

/// Read-only queries over ledger state and the workflow store.
///
/// Every answer is recomputed from fresh reads.
#[derive(Clone)]
pub struct StateQueryService {
    ledger: Arc<dyn LedgerReader>,
    store: Arc<dyn WorkflowStateStore>,
    addresses: ProtocolAddresses,
    retry: RetryPolicy,
}

impl StateQueryService {
    /// Creates a query service.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        store: Arc<dyn WorkflowStateStore>,
        addresses: ProtocolAddresses,
    ) -> Self {
        Self {
            ledger,
            store,
            addresses,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy used for reads.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the stored state without key material.
    pub async fn snapshot(&self) -> AppResult<StateSnapshot> {
        Ok(self.store.snapshot().await?.public_snapshot())
    }

    /// Clears the store.
    pub async fn reset(&self) -> AppResult<()> {
        warn!("resetting workflow state");
        self.store.reset().await
    }

    /// Describes the community registered at `address`.
    pub async fn community_info(&self, address: Address) -> AppResult<CommunityInfo> {
        let community_role = RoleId::from_name(RoleId::COMMUNITY);
        let (has_role, token_address, metadata) = tokio::try_join!(
            self.has_role(community_role, address),
            async {
                match self.addresses.points_factory {
                    Some(factory) => {
                        let data = self
                            .read(factory, points_factory::get_token_address(address))
                            .await?;
                        points_factory::decode_token(&data)
                    }
                    None => Ok(None),
                }
            },
            async {
                let data = self
                    .read(
                        self.addresses.registry,
                        registry::role_metadata(community_role, address),
                    )
                    .await?;
                registry::decode_bytes(&data)
            },
        )?;

        let (name, description) = decode_community_profile(&metadata);
        Ok(CommunityInfo {
            address,
            has_role,
            token_address,
            name,
            description,
        })
    }

    /// Determines which paymaster roles `address` holds.
    pub async fn operator_status(&self, address: Address) -> AppResult<OperatorStatus> {
        let (super_paymaster, paymaster_v4) = tokio::try_join!(
            self.has_role(RoleId::from_name(RoleId::PAYMASTER_SUPER), address),
            self.has_role(RoleId::from_name(RoleId::PAYMASTER_AOA), address),
        )?;

        Ok(OperatorStatus {
            address,
            capability: OperatorCapability::from_roles(super_paymaster, paymaster_v4),
        })
    }

    /// Reads native, governance and points balances for each address.
    pub async fn balances(&self, addresses: &[Address]) -> AppResult<Vec<AccountBalances>> {
        let mut balances = Vec::with_capacity(addresses.len());

        for address in addresses.iter().copied() {
            let (native, governance_token, points_token) = tokio::try_join!(
                self.retry
                    .run("native balance", || self.ledger.native_balance(address)),
                self.retry.run("token balance", || {
                    self.ledger
                        .token_balance(self.addresses.governance_token, address)
                }),
                async {
                    match self.addresses.points_token {
                        Some(token) => self
                            .retry
                            .run("points balance", || self.ledger.token_balance(token, address))
                            .await
                            .map(Some),
                        None => Ok(None),
                    }
                },
            )?;

            balances.push(AccountBalances {
                address,
                native,
                governance_token,
                points_token,
            });
        }

        Ok(balances)
    }

    /// Compares `hasRole` with the registry member list for one address.
    ///
    /// A divergence is reported and logged, never repaired.
    pub async fn role_consistency(
        &self,
        role: RoleId,
        address: Address,
    ) -> AppResult<RoleConsistencyReport> {
        let (has_role, members) = tokio::try_join!(self.has_role(role, address), async {
            let data = self
                .read(self.addresses.registry, registry::get_role_members(role))
                .await?;
            registry::decode_members(&data)
        })?;

        let report = RoleConsistencyReport::new(role, address, has_role, members.contains(&address));
        if !report.consistent {
            warn!(
                role = %role,
                address = %address,
                has_role,
                listed_as_member = report.listed_as_member,
                "registry role views disagree"
            );
        }

        Ok(report)
    }

    /// Reads the registry configuration of `role`.
    pub async fn role_config(&self, role: RoleId) -> AppResult<RoleConfig> {
        let data = self
            .read(self.addresses.registry, registry::get_role_config(role))
            .await?;
        registry::decode_role_config(&data)
    }

    async fn has_role(&self, role: RoleId, address: Address) -> AppResult<bool> {
        let data = self
            .read(self.addresses.registry, registry::has_role(role, address))
            .await?;
        registry::decode_bool(&data)
    }

    async fn read(&self, contract: Address, calldata: Vec<u8>) -> AppResult<Vec<u8>> {
        self.retry
            .run("read state", || self.ledger.read_state(contract, calldata.clone()))
            .await
    }
}

/// Extracts name and description from community role data.
fn decode_community_profile(metadata: &[u8]) -> (Option<String>, Option<String>) {
    if metadata.is_empty() {
        return (None, None);
    }

    let profile = AbiType::Tuple(vec![
        AbiType::String,
        AbiType::String,
        AbiType::String,
        AbiType::String,
        AbiType::String,
        AbiType::Uint,
    ]);
    let fields = decode(&[profile], metadata)
        .ok()
        .and_then(|mut values| values.pop())
        .and_then(|value| value.into_members().ok())
        .unwrap_or_default();
    let mut strings = fields.into_iter().map(|value| value.into_string().ok());

    let name = strings.next().flatten();
    let description = strings.nth(2).flatten();
    (name, description)
}

#[cfg(test)]
mod tests {
    use rolegate_core::{Address, Amount};
    use rolegate_domain::{CommunityProfile, WorkflowTarget};

    use super::decode_community_profile;

    #[test]
    fn community_profile_round_trips_through_role_data() {
        let target = WorkflowTarget::LaunchCommunity(CommunityProfile {
            name: "DemoDAO".to_owned(),
            ens_name: "demo.eth".to_owned(),
            website: String::new(),
            description: "a demo community".to_owned(),
            logo_uri: String::new(),
            stake: Amount::ZERO,
            token_name: "Demo Token".to_owned(),
            token_symbol: "DEMO".to_owned(),
        });
        let (name, description) = decode_community_profile(&target.role_data(Address::ZERO));

        assert_eq!(name.as_deref(), Some("DemoDAO"));
        assert_eq!(description.as_deref(), Some("a demo community"));
    }

    #[test]
    fn empty_metadata_has_no_profile() {
        assert_eq!(decode_community_profile(&[]), (None, None));
    }
}
