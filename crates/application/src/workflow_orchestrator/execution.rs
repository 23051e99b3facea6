use rolegate_domain::protocol::{account, erc20};
use rolegate_domain::{ContractCall, WorkflowStep};

use super::*;

struct AttemptOutcome {
    status: AppResult<StepStatus>,
    transaction_ids: Vec<TxHash>,
}

impl AttemptOutcome {
    fn done(status: StepStatus) -> Self {
        Self {
            status: Ok(status),
            transaction_ids: Vec::new(),
        }
    }

    fn failed(error: AppError) -> Self {
        Self {
            status: Err(error),
            transaction_ids: Vec::new(),
        }
    }
}

impl WorkflowOrchestrator {
    pub(super) async fn execute_step_with_retry(
        &self,
        identity: &Identity,
        target: &WorkflowTarget,
        index: usize,
        step: &WorkflowStep,
    ) -> (StepReport, Option<AppError>) {
        let label = format!("{}: {}", target.label(), step.label());
        let mut transaction_ids = Vec::new();
        let mut attempt = 0_u32;

        loop {
            attempt = attempt.saturating_add(1);
            let outcome = self.execute_step(identity, target, step, &label).await;
            transaction_ids.extend(outcome.transaction_ids);

            let (status, error) = match outcome.status {
                Ok(status) => (status, None),
                Err(error)
                    if error.is_retryable() && attempt < self.step_retry.max_attempts() =>
                {
                    warn!(
                        identity = identity.name(),
                        step = index,
                        attempt,
                        error = %error,
                        "retrying workflow step"
                    );
                    let delay = self.step_retry.backoff().saturating_mul(attempt);
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(error) => (StepStatus::Failed, Some(error)),
            };

            let report = StepReport {
                index,
                label: step.label(),
                status,
                attempts: attempt,
                transaction_ids,
            };
            return (report, error);
        }
    }

    async fn execute_step(
        &self,
        identity: &Identity,
        target: &WorkflowTarget,
        step: &WorkflowStep,
        label: &str,
    ) -> AttemptOutcome {
        match step {
            WorkflowStep::DeployAccount {
                factory,
                owner,
                salt,
            } => {
                match self.ledger.code_present(identity.address()).await {
                    Ok(true) => return AttemptOutcome::done(StepStatus::NoOp),
                    Ok(false) => {}
                    Err(error) => return AttemptOutcome::failed(error),
                }
                let call = account::create_account(*factory, *owner, *salt);
                self.submit(self.provisioner.funding_identity(), &call, label, identity)
                    .await
            }
            WorkflowStep::FundResource {
                recipient,
                requirement,
            } => {
                let (result, tx_hash) = self
                    .provisioner
                    .ensure_traced(*recipient, requirement, label, identity.name())
                    .await;
                AttemptOutcome {
                    status: result.map(|outcome| {
                        if outcome.acted {
                            StepStatus::Finalized
                        } else {
                            StepStatus::NoOp
                        }
                    }),
                    transaction_ids: tx_hash.into_iter().collect(),
                }
            }
            WorkflowStep::ApproveSpender {
                token,
                spender,
                amount,
            } => {
                match self
                    .ledger
                    .allowance(*token, identity.address(), *spender)
                    .await
                {
                    Ok(current) if current >= *amount => {
                        return AttemptOutcome::done(StepStatus::NoOp);
                    }
                    Ok(_) => {}
                    Err(error) => return AttemptOutcome::failed(error),
                }
                let call = identity.outbound_call(&erc20::approve(*token, *spender, *amount));
                self.submit(identity, &call, label, identity).await
            }
            WorkflowStep::SubmitProtocolCall { call } => {
                self.submit_protocol_call(identity, target, call, label)
                    .await
            }
            WorkflowStep::DeployCommunityToken { call } => {
                // The factory keeps one token per community.
                match self.resolver.points_token(identity.address()).await {
                    Ok(Some(_)) => return AttemptOutcome::done(StepStatus::NoOp),
                    Ok(None) => {}
                    Err(error) => return AttemptOutcome::failed(error),
                }
                let call = identity.outbound_call(call);
                self.submit(identity, &call, label, identity).await
            }
        }
    }

    async fn submit_protocol_call(
        &self,
        identity: &Identity,
        target: &WorkflowTarget,
        call: &ContractCall,
        label: &str,
    ) -> AttemptOutcome {
        // A timed-out earlier attempt may already have landed the registration.
        match self
            .resolver
            .has_role(target.role_id(), identity.address())
            .await
        {
            Ok(true) => return AttemptOutcome::done(StepStatus::NoOp),
            Ok(false) => {}
            Err(error) => return AttemptOutcome::failed(error),
        }

        let call = identity.outbound_call(call);
        self.submit(identity, &call, label, identity).await
    }

    async fn submit(
        &self,
        signer: &Identity,
        call: &ContractCall,
        label: &str,
        owner: &Identity,
    ) -> AttemptOutcome {
        let execution = self
            .executor
            .execute(signer, call, label, owner.name())
            .await;
        AttemptOutcome {
            status: execution.outcome.map(|_| StepStatus::Finalized),
            transaction_ids: execution.tx_hash.into_iter().collect(),
        }
    }
}
