use std::sync::Arc;

use rolegate_core::{Address, Amount, AppResult};
use rolegate_domain::protocol::{points_factory, registry};
use rolegate_domain::{
    Identity, IdentityKind, ProvisioningPolicy, Resolution, RoleId, WorkflowStep, WorkflowTarget,
};
use tracing::debug;

use crate::ledger_ports::LedgerReader;
use crate::protocol_settings::ProtocolAddresses;
use crate::retry::RetryPolicy;

/// Computes which onboarding steps an identity still needs.
#[derive(Clone)]
pub struct PreconditionResolver {
    ledger: Arc<dyn LedgerReader>,
    addresses: ProtocolAddresses,
    policy: ProvisioningPolicy,
    retry: RetryPolicy,
}

impl PreconditionResolver {
    /// Creates a resolver applying `policy` to funding requirements.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        addresses: ProtocolAddresses,
        policy: ProvisioningPolicy,
    ) -> Self {
        Self {
            ledger,
            addresses,
            policy,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy used for reads.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the default provisioning policy.
    #[must_use]
    pub fn policy(&self) -> ProvisioningPolicy {
        self.policy
    }

    /// Resolves remaining steps with the default policy.
    pub async fn resolve(
        &self,
        identity: &Identity,
        target: &WorkflowTarget,
    ) -> AppResult<Resolution> {
        self.resolve_with_policy(identity, target, &self.policy)
            .await
    }

    /// Resolves remaining steps in fixed order: deploy, fund, approve, register,
    /// then deploy the community token when one is requested.
    ///
    /// An identity that already holds the target role needs nothing, whatever its
    /// balances, except a requested community token that does not exist yet.
    pub async fn resolve_with_policy(
        &self,
        identity: &Identity,
        target: &WorkflowTarget,
        policy: &ProvisioningPolicy,
    ) -> AppResult<Resolution> {
        let account = identity.address();
        let signer = identity.signer_address();
        let stake = target.stake();
        let token = self.addresses.governance_token;
        let native_requirement = policy.native_requirement()?;
        let token_requirement = policy.token_requirement(token, stake)?;
        let stakes = !stake.is_zero();
        let token_deployment = self
            .addresses
            .points_factory
            .and_then(|factory| target.token_deployment(factory));

        let (has_role, deployed, native_balance, token_balance, allowance, points_token) = tokio::try_join!(
            self.has_role(target.role_id(), account),
            async {
                match identity.kind() {
                    IdentityKind::Simple => Ok(true),
                    IdentityKind::ContractBacked { .. } => {
                        self.read("code present", || self.ledger.code_present(account))
                            .await
                    }
                }
            },
            self.read("native balance", || self.ledger.native_balance(signer)),
            async {
                if stakes {
                    self.read("token balance", || self.ledger.token_balance(token, account))
                        .await
                } else {
                    Ok(Amount::ZERO)
                }
            },
            async {
                if stakes {
                    self.read("allowance", || {
                        self.ledger.allowance(token, account, self.addresses.staking)
                    })
                    .await
                } else {
                    Ok(Amount::ZERO)
                }
            },
            async {
                if token_deployment.is_some() {
                    self.points_token(account).await
                } else {
                    Ok(None)
                }
            },
        )?;
        let token_deployment = token_deployment.filter(|_| points_token.is_none());

        if has_role {
            debug!(identity = identity.name(), role = %target.role_id(), "role already held");
            return Ok(match token_deployment {
                Some(step) => Resolution {
                    steps: vec![step],
                    already_satisfied: false,
                },
                None => Resolution::satisfied(),
            });
        }

        let mut steps = Vec::new();

        if let IdentityKind::ContractBacked {
            owner_address,
            factory_address,
            salt,
        } = identity.kind()
            && !deployed
        {
            steps.push(WorkflowStep::DeployAccount {
                factory: factory_address,
                owner: owner_address,
                salt,
            });
        }

        if !native_requirement.is_met_by(native_balance) {
            steps.push(WorkflowStep::FundResource {
                recipient: signer,
                requirement: native_requirement,
            });
        }

        if stakes && !token_requirement.is_met_by(token_balance) {
            steps.push(WorkflowStep::FundResource {
                recipient: account,
                requirement: token_requirement,
            });
        }

        if stakes && allowance < stake {
            steps.push(WorkflowStep::ApproveSpender {
                token,
                spender: self.addresses.staking,
                amount: stake,
            });
        }

        steps.push(WorkflowStep::SubmitProtocolCall {
            call: target.protocol_call(self.addresses.registry, account),
        });
        steps.extend(token_deployment);

        debug!(identity = identity.name(), steps = steps.len(), "resolved workflow steps");
        Ok(Resolution {
            steps,
            already_satisfied: false,
        })
    }

    /// Reads `hasRole(role, account)` from the registry.
    pub async fn has_role(&self, role: RoleId, account: Address) -> AppResult<bool> {
        let data = self
            .read("has role", || {
                self.ledger
                    .read_state(self.addresses.registry, registry::has_role(role, account))
            })
            .await?;
        registry::decode_bool(&data)
    }

    /// Reads the points token the factory holds for `community`.
    ///
    /// Returns `None` when no factory is configured or no token exists.
    pub async fn points_token(&self, community: Address) -> AppResult<Option<Address>> {
        let Some(factory) = self.addresses.points_factory else {
            return Ok(None);
        };
        let data = self
            .read("points token", || {
                self.ledger
                    .read_state(factory, points_factory::get_token_address(community))
            })
            .await?;
        points_factory::decode_token(&data)
    }

    async fn read<T, F, Fut>(&self, label: &str, operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        self.retry.run(label, operation).await
    }
}
