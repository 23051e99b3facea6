use std::sync::Arc;

use chrono::Utc;
use rolegate_core::{AppError, AppResult, TxHash};
use rolegate_domain::{
    Identity, PolicyOverrides, ProvisioningPolicy, StepReport, StepStatus, TerminalIdentifiers,
    WorkflowFailure, WorkflowResult, WorkflowRunStatus, WorkflowTarget,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger_ports::{LedgerReader, TransactionSubmitter};
use crate::precondition_resolver::PreconditionResolver;
use crate::protocol_settings::ProtocolAddresses;
use crate::provisioner::Provisioner;
use crate::retry::RetryPolicy;
use crate::state_ports::WorkflowStateStore;
use crate::transaction_executor::TransactionExecutor;

mod batch;
mod execution;
mod terminal;

/// Request to drive one stored identity to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    /// Stored identity name.
    pub identity: String,
    /// Target onboarding state.
    pub target: WorkflowTarget,
    /// Optional balance and stake overrides.
    #[serde(default)]
    pub overrides: PolicyOverrides,
}

/// Drives identities through resolution, step execution and terminal reads.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    store: Arc<dyn WorkflowStateStore>,
    ledger: Arc<dyn LedgerReader>,
    executor: TransactionExecutor,
    resolver: PreconditionResolver,
    provisioner: Provisioner,
    addresses: ProtocolAddresses,
    step_retry: RetryPolicy,
}

impl WorkflowOrchestrator {
    /// Creates an orchestrator over the given ports.
    #[must_use]
    pub fn new(
        store: Arc<dyn WorkflowStateStore>,
        ledger: Arc<dyn LedgerReader>,
        submitter: Arc<dyn TransactionSubmitter>,
        resolver: PreconditionResolver,
        provisioner: Provisioner,
        addresses: ProtocolAddresses,
    ) -> Self {
        Self {
            executor: TransactionExecutor::new(submitter, store.clone()),
            store,
            ledger,
            resolver,
            provisioner,
            addresses,
            step_retry: RetryPolicy::default(),
        }
    }

    /// Overrides the per-step retry policy.
    #[must_use]
    pub fn with_step_retry(mut self, step_retry: RetryPolicy) -> Self {
        self.step_retry = step_retry;
        self
    }

    /// Runs one workflow.
    ///
    /// Ledger failures are reported inside the result; `Err` means the request itself
    /// was invalid or the identity is unknown.
    pub async fn run(&self, request: WorkflowRequest) -> AppResult<WorkflowResult> {
        let identity = self.find_identity(&request.identity).await?;
        let prepared = self.prepare(request.target, &request.overrides).await?;
        Ok(self.execute(&identity, prepared).await)
    }

    async fn find_identity(&self, name: &str) -> AppResult<Identity> {
        self.store
            .load()
            .await?
            .into_iter()
            .find(|identity| identity.name() == name)
            .ok_or_else(|| AppError::NotFound(format!("identity '{name}' does not exist")))
    }

    /// Applies overrides and defaults, then checks everything that needs no ledger.
    async fn prepare(
        &self,
        target: WorkflowTarget,
        overrides: &PolicyOverrides,
    ) -> AppResult<PreparedRun> {
        let mut target = match overrides.stake {
            Some(stake) => target.with_stake(stake),
            None => target,
        };
        if target.needs_community() {
            let community = self
                .store
                .snapshot()
                .await?
                .community_address
                .ok_or_else(|| {
                    AppError::Validation(
                        "no community given and none has been launched".to_owned(),
                    )
                })?;
            target = target.with_default_community(community);
        }
        target.validate()?;
        if self.addresses.points_factory.is_none()
            && matches!(&target, WorkflowTarget::LaunchCommunity(profile) if profile.requests_token())
        {
            return Err(AppError::Validation(
                "a community token needs a configured points factory".to_owned(),
            ));
        }

        let policy: ProvisioningPolicy = self.resolver.policy().with_overrides(overrides);
        policy.native_requirement()?;
        policy.token_requirement(self.addresses.governance_token, target.stake())?;
        Ok(PreparedRun { target, policy })
    }

    async fn execute(&self, identity: &Identity, prepared: PreparedRun) -> WorkflowResult {
        let PreparedRun { target, policy } = prepared;
        let mut run = RunTrace::start(identity, &target);
        info!(identity = identity.name(), target = target.label(), "workflow resolving");

        let resolution = match self
            .resolver
            .resolve_with_policy(identity, &target, &policy)
            .await
        {
            Ok(resolution) => resolution,
            Err(error) => {
                warn!(identity = identity.name(), error = %error, "workflow resolution failed");
                return run.fail(0, "resolve", &error);
            }
        };

        if resolution.already_satisfied {
            info!(identity = identity.name(), "workflow already satisfied");
            run.already_satisfied = true;
            let terminal = self.terminal_identifiers(identity, &target).await;
            return run.succeed(terminal);
        }

        for (index, step) in resolution.steps.iter().enumerate() {
            let label = step.label();
            info!(identity = identity.name(), step = index, label = %label, "workflow executing step");
            let (report, error) = self
                .execute_step_with_retry(identity, &target, index, step)
                .await;
            run.transaction_ids
                .extend(report.transaction_ids.iter().copied());
            run.steps.push(report);

            if let Some(error) = error {
                warn!(
                    identity = identity.name(),
                    step = index,
                    error = %error,
                    "workflow step failed"
                );
                return run.fail(index, &label, &error);
            }
        }

        let terminal = self.terminal_identifiers(identity, &target).await;
        info!(
            identity = identity.name(),
            transactions = run.transaction_ids.len(),
            "workflow succeeded"
        );
        run.succeed(terminal)
    }
}

/// A request that passed every check not needing the ledger.
struct PreparedRun {
    target: WorkflowTarget,
    policy: ProvisioningPolicy,
}

struct RunTrace {
    identity: Identity,
    target: &'static str,
    started_at: chrono::DateTime<Utc>,
    already_satisfied: bool,
    steps: Vec<StepReport>,
    transaction_ids: Vec<TxHash>,
}

impl RunTrace {
    fn start(identity: &Identity, target: &WorkflowTarget) -> Self {
        Self {
            identity: identity.clone(),
            target: target.label(),
            started_at: Utc::now(),
            already_satisfied: false,
            steps: Vec::new(),
            transaction_ids: Vec::new(),
        }
    }

    fn succeed(self, terminal: TerminalIdentifiers) -> WorkflowResult {
        self.finish(WorkflowRunStatus::Succeeded, terminal, None)
    }

    fn fail(self, step_index: usize, step_label: &str, error: &AppError) -> WorkflowResult {
        let partial_progress = self
            .steps
            .iter()
            .any(|step| step.status == StepStatus::Finalized);
        let failure = WorkflowFailure {
            step_index,
            step_label: step_label.to_owned(),
            error_kind: error.kind().to_owned(),
            message: error.to_string(),
            inconclusive: matches!(error, AppError::TimedOut(_)),
            partial_progress,
        };
        self.finish(
            WorkflowRunStatus::Failed {
                at_step: step_index,
            },
            TerminalIdentifiers::default(),
            Some(failure),
        )
    }

    fn finish(
        self,
        status: WorkflowRunStatus,
        terminal: TerminalIdentifiers,
        error: Option<WorkflowFailure>,
    ) -> WorkflowResult {
        WorkflowResult {
            identity: self.identity.name().to_owned(),
            address: self.identity.address(),
            target: self.target.to_owned(),
            success: status == WorkflowRunStatus::Succeeded,
            status,
            already_satisfied: self.already_satisfied,
            steps: self.steps,
            transaction_ids: self.transaction_ids,
            terminal,
            error,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests;
