use std::sync::Arc;

use rolegate_core::{Address, Amount, AppError, AppResult, TxHash};
use rolegate_domain::protocol::erc20;
use rolegate_domain::{ContractCall, Identity, ProvisioningPolicy, Resource, ResourceRequirement};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger_ports::{LedgerReader, TransactionSubmitter};
use crate::retry::RetryPolicy;
use crate::state_ports::WorkflowStateStore;
use crate::transaction_executor::TransactionExecutor;

/// Result of one provisioning check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningOutcome {
    /// True when a top-up was submitted.
    pub acted: bool,
    /// Amount transferred.
    pub amount_added: Amount,
    /// Top-up transaction.
    pub transaction: Option<TxHash>,
}

impl ProvisioningOutcome {
    fn untouched() -> Self {
        Self {
            acted: false,
            amount_added: Amount::ZERO,
            transaction: None,
        }
    }
}

/// Funding result for one identity and resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingReport {
    /// Identity name.
    pub identity: String,
    /// Funded address.
    pub recipient: Address,
    /// Funded resource.
    pub resource: Resource,
    /// Outcome when the check completed.
    pub outcome: Option<ProvisioningOutcome>,
    /// Error code and message when it did not.
    pub error: Option<String>,
}

/// Tops up identity balances from the funding identity.
#[derive(Clone)]
pub struct Provisioner {
    ledger: Arc<dyn LedgerReader>,
    executor: TransactionExecutor,
    funding_identity: Arc<Identity>,
    retry: RetryPolicy,
}

impl Provisioner {
    /// Creates a provisioner funding from `funding_identity`.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        submitter: Arc<dyn TransactionSubmitter>,
        store: Arc<dyn WorkflowStateStore>,
        funding_identity: Arc<Identity>,
    ) -> Self {
        Self {
            ledger,
            executor: TransactionExecutor::new(submitter, store),
            funding_identity,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy used for reads and top-ups.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the identity that pays for top-ups.
    #[must_use]
    pub fn funding_identity(&self) -> &Identity {
        &self.funding_identity
    }

    /// Reads the balance `owner` holds of `resource`, retrying transient failures.
    pub async fn balance_of(&self, resource: Resource, owner: Address) -> AppResult<Amount> {
        self.retry
            .run("read balance", || async move {
                match resource {
                    Resource::Native => self.ledger.native_balance(owner).await,
                    Resource::Token(token) => self.ledger.token_balance(token, owner).await,
                }
            })
            .await
    }

    /// Ensures `recipient` holds at least the requirement's minimum.
    ///
    /// Below the minimum the balance is raised to the target. Concurrent calls for the
    /// same recipient may both fund it.
    pub async fn ensure(
        &self,
        recipient: Address,
        requirement: &ResourceRequirement,
    ) -> AppResult<ProvisioningOutcome> {
        self.ensure_traced(recipient, requirement, "fund", self.funding_identity.name())
            .await
            .0
    }

    pub(crate) async fn ensure_traced(
        &self,
        recipient: Address,
        requirement: &ResourceRequirement,
        label: &str,
        owner_name: &str,
    ) -> (AppResult<ProvisioningOutcome>, Option<TxHash>) {
        let resource = requirement.resource();
        let current = match self.balance_of(resource, recipient).await {
            Ok(current) => current,
            Err(error) => return (Err(error), None),
        };
        if requirement.is_met_by(current) {
            return (Ok(ProvisioningOutcome::untouched()), None);
        }

        let delta = requirement.shortfall(current);
        let available = match self.balance_of(resource, self.funding_identity.address()).await {
            Ok(available) => available,
            Err(error) => return (Err(error), None),
        };
        if available < delta {
            return (
                Err(AppError::InsufficientFunds(format!(
                    "funding identity holds {available} of {resource}, top-up needs {delta}"
                ))),
                None,
            );
        }

        let call = match resource {
            Resource::Native => ContractCall::native_transfer(recipient, delta),
            Resource::Token(token) => erc20::transfer(token, recipient, delta),
        };
        info!(
            recipient = %recipient,
            resource = %resource,
            current = %current,
            amount = %delta,
            "topping up balance"
        );

        let execution = self
            .executor
            .execute(&self.funding_identity, &call, label, owner_name)
            .await;
        let outcome = execution.outcome.map(|receipt| ProvisioningOutcome {
            acted: true,
            amount_added: delta,
            transaction: Some(receipt.tx_hash),
        });
        (outcome, execution.tx_hash)
    }

    /// Funds gas and governance tokens for each identity, one at a time.
    ///
    /// Failures are reported per identity and do not stop the remaining ones.
    pub async fn fund_identities(
        &self,
        identities: &[Identity],
        policy: &ProvisioningPolicy,
        governance_token: Address,
    ) -> AppResult<Vec<FundingReport>> {
        let native = policy.native_requirement()?;
        let token = policy.token_requirement(governance_token, Amount::ZERO)?;
        let mut reports = Vec::with_capacity(identities.len() * 2);

        for identity in identities {
            for (recipient, requirement) in [
                (identity.signer_address(), native),
                (identity.address(), token),
            ] {
                let label = format!("fund {}", requirement.resource());
                let label_ref = label.as_str();
                let requirement_ref = &requirement;
                let result = self
                    .retry
                    .run(label_ref, || async move {
                        self.ensure_traced(recipient, requirement_ref, label_ref, identity.name())
                            .await
                            .0
                    })
                    .await;
                if let Err(error) = &result {
                    warn!(identity = identity.name(), error = %error, "funding failed");
                }

                reports.push(FundingReport {
                    identity: identity.name().to_owned(),
                    recipient,
                    resource: requirement.resource(),
                    error: result.as_ref().err().map(ToString::to_string),
                    outcome: result.ok(),
                });
            }
        }

        Ok(reports)
    }
}
