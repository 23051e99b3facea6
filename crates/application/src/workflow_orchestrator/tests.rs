use rolegate_core::{Address, AppError};
use rolegate_domain::{
    CommunityMarker, CommunityProfile, ContractCall, PolicyOverrides, RoleId, StepStatus,
    WorkflowRunStatus, WorkflowTarget,
};

use crate::ledger_ports::TransactionSubmitter;
use crate::state_ports::WorkflowStateStore;
use crate::test_support::{
    COMMUNITY_TOKEN, Harness, MEMBERSHIP_TOKEN_ID, contract_backed_identity, simple_identity,
    units,
};

use super::WorkflowRequest;

fn operator_target(stake: u128) -> WorkflowTarget {
    WorkflowTarget::OnboardOperator {
        stake: units(stake),
    }
}

fn community_target() -> WorkflowTarget {
    WorkflowTarget::LaunchCommunity(CommunityProfile {
        name: "DemoDAO".to_owned(),
        ens_name: String::new(),
        website: String::new(),
        description: "demo community".to_owned(),
        logo_uri: String::new(),
        stake: units(0),
        token_name: "Demo Token".to_owned(),
        token_symbol: "DEMO".to_owned(),
    })
}

fn tokenless_community_target() -> WorkflowTarget {
    WorkflowTarget::LaunchCommunity(CommunityProfile {
        name: "QuietDAO".to_owned(),
        ens_name: String::new(),
        website: String::new(),
        description: String::new(),
        logo_uri: String::new(),
        stake: units(0),
        token_name: String::new(),
        token_symbol: String::new(),
    })
}

fn join_target(community: Address) -> WorkflowTarget {
    WorkflowTarget::JoinCommunity {
        community,
        avatar_uri: String::new(),
        ens_name: String::new(),
        stake: units(0),
    }
}

fn community_role() -> RoleId {
    RoleId::from_name(RoleId::COMMUNITY)
}

fn step_labels(result: &rolegate_domain::WorkflowResult) -> Vec<&str> {
    result.steps.iter().map(|step| step.label.as_str()).collect()
}

fn request(identity: &str, target: WorkflowTarget) -> WorkflowRequest {
    WorkflowRequest {
        identity: identity.to_owned(),
        target,
        overrides: PolicyOverrides::default(),
    }
}

fn operator_role() -> RoleId {
    RoleId::from_name(RoleId::PAYMASTER_SUPER)
}

#[tokio::test]
async fn already_onboarded_identity_submits_nothing() {
    let harness = Harness::new().await;
    let operator = simple_identity("operator", 0x11);
    harness
        .ledger
        .grant_role(operator_role(), operator.address())
        .await;
    harness.store_identities(vec![operator]).await;

    let result = harness
        .orchestrator()
        .run(request("operator", operator_target(50)))
        .await;

    assert!(result.is_ok());
    let result = result.unwrap_or_else(|_| unreachable!());
    assert!(result.success);
    assert!(result.already_satisfied);
    assert!(result.steps.is_empty());
    assert!(result.transaction_ids.is_empty());
    assert!(harness.ledger.submissions().await.is_empty());
}

#[tokio::test]
async fn fresh_operator_is_funded_approved_and_registered_in_order() {
    let harness = Harness::new().await;
    harness.ledger.require_stake(operator_role(), 50).await;
    let operator = simple_identity("operator", 0x11);
    let address = operator.address();
    harness.store_identities(vec![operator]).await;

    let result = harness
        .orchestrator()
        .run(request("operator", operator_target(50)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(result.status, WorkflowRunStatus::Succeeded);
    let labels = result
        .steps
        .iter()
        .map(|step| step.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        labels,
        vec![
            "fund native",
            "fund token 0x6060606060606060606060606060606060606060",
            "approve stake",
            "operator setup",
        ]
    );
    assert!(
        result
            .steps
            .iter()
            .all(|step| step.status == StepStatus::Finalized)
    );
    assert_eq!(result.transaction_ids.len(), 4);
    assert!(harness.ledger.holds_role(operator_role(), address).await);
    assert_eq!(harness.ledger.native(address).await, 100);
    assert_eq!(harness.store.records().await.len(), 4);
}

#[tokio::test]
async fn rerun_after_failed_step_resumes_without_repeating_finished_steps() {
    let harness = Harness::new().await;
    harness.ledger.require_stake(operator_role(), 50).await;
    harness.store_identities(vec![simple_identity("operator", 0x11)]).await;
    harness.ledger.revert_label(Some("operator setup")).await;
    let orchestrator = harness.orchestrator();

    let failed = orchestrator
        .run(request("operator", operator_target(50)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!failed.success);
    assert_eq!(failed.status, WorkflowRunStatus::Failed { at_step: 3 });
    let failure = failed.error.unwrap_or_else(|| unreachable!());
    assert_eq!(failure.error_kind, "execution_reverted");
    assert!(failure.partial_progress);
    assert!(!failure.inconclusive);
    assert_eq!(failed.steps[3].attempts, 1);

    harness.ledger.revert_label(None).await;
    let resumed = orchestrator
        .run(request("operator", operator_target(50)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(resumed.success);
    assert_eq!(resumed.steps.len(), 1);
    assert_eq!(resumed.steps[0].label, "operator setup");
    assert_eq!(harness.ledger.submissions().await.len(), 5);
}

#[tokio::test]
async fn submission_failures_are_retried_within_the_step() {
    let harness = Harness::new().await;
    harness.store_identities(vec![simple_identity("operator", 0x11)]).await;
    harness
        .ledger
        .fail_next_submissions(vec![AppError::Submission("replacement underpriced".to_owned())])
        .await;

    let result = harness
        .orchestrator()
        .run(request("operator", operator_target(0)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(result.steps[0].attempts, 2);
}

#[tokio::test]
async fn exhausted_submission_retries_fail_the_step() {
    let harness = Harness::new().await;
    harness.store_identities(vec![simple_identity("operator", 0x11)]).await;
    harness
        .ledger
        .fail_next_submissions(vec![
            AppError::Submission("rpc down".to_owned()),
            AppError::Submission("rpc down".to_owned()),
            AppError::Submission("rpc down".to_owned()),
        ])
        .await;

    let result = harness
        .orchestrator()
        .run(request("operator", operator_target(0)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(result.status, WorkflowRunStatus::Failed { at_step: 0 });
    assert_eq!(result.steps[0].attempts, 3);
    assert_eq!(
        result.error.map(|failure| failure.error_kind),
        Some("submission".to_owned())
    );
}

#[tokio::test]
async fn finalization_timeout_is_inconclusive_and_not_retried() {
    let harness = Harness::new().await;
    let operator = simple_identity("operator", 0x11);
    harness.ledger.set_native(operator.address(), 100).await;
    harness.store_identities(vec![operator]).await;
    harness.ledger.time_out_label(Some("operator setup")).await;
    let orchestrator = harness.orchestrator();

    let result = orchestrator
        .run(request("operator", operator_target(0)))
        .await
        .unwrap_or_else(|_| unreachable!());

    let failure = result.error.unwrap_or_else(|| unreachable!());
    assert!(failure.inconclusive);
    assert_eq!(failure.error_kind, "timed_out");
    assert_eq!(result.steps[0].attempts, 1);
    assert_eq!(result.steps[0].transaction_ids.len(), 1);

    // The transaction landed after all; a re-run sees the role.
    let rerun = orchestrator
        .run(request("operator", operator_target(0)))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(rerun.already_satisfied);
    assert_eq!(harness.ledger.submissions().await.len(), 1);
}

#[tokio::test]
async fn empty_funding_identity_fails_immediately() {
    let harness = Harness::new().await;
    harness.ledger.set_native(harness.funder.address(), 0).await;
    harness.store_identities(vec![simple_identity("operator", 0x11)]).await;

    let result = harness
        .orchestrator()
        .run(request("operator", operator_target(0)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(result.status, WorkflowRunStatus::Failed { at_step: 0 });
    assert_eq!(result.steps[0].attempts, 1);
    let failure = result.error.unwrap_or_else(|| unreachable!());
    assert_eq!(failure.error_kind, "insufficient_funds");
    assert!(!failure.partial_progress);
    assert!(harness.ledger.submissions().await.is_empty());
}

#[tokio::test]
async fn transient_resolution_reads_are_retried() {
    let harness = Harness::new().await;
    harness.store_identities(vec![simple_identity("operator", 0x11)]).await;
    harness.ledger.fail_next_reads(2).await;

    let result = harness
        .orchestrator()
        .run(request("operator", operator_target(0)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
}

#[tokio::test]
async fn contract_backed_community_is_deployed_by_funder_and_reports_token() {
    let harness = Harness::new().await;
    let admin = contract_backed_identity("admin", 0x22);
    let account = admin.address();
    let owner = admin.signer_address();
    harness.store_identities(vec![admin]).await;

    let result = harness
        .orchestrator()
        .run(request("admin", community_target()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(result.steps[0].label, "deploy account");
    assert_eq!(step_labels(&result).last(), Some(&"deploy community token"));
    assert_eq!(harness.ledger.points_token(account).await, Some(COMMUNITY_TOKEN));
    assert!(harness.ledger.deployed(account).await);
    assert!(
        harness
            .ledger
            .holds_role(community_role(), account)
            .await
    );
    assert_eq!(harness.ledger.native(owner).await, 100);
    assert_eq!(result.terminal.community_token, Some(COMMUNITY_TOKEN));

    let submissions = harness.ledger.submissions().await;
    assert_eq!(submissions[0].signer, harness.funder.address());
    assert_eq!(submissions.last().map(|entry| entry.signer), Some(owner));

    let snapshot = harness
        .store
        .snapshot()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(snapshot.community_address, Some(account));
    assert_eq!(snapshot.community_token, Some(COMMUNITY_TOKEN));
}

#[tokio::test]
async fn joining_a_community_reports_membership_token() {
    let harness = Harness::new().await;
    harness.store_identities(vec![simple_identity("member", 0x33)]).await;
    let community = Address::from_bytes([0x22; 20]);
    harness.ledger.grant_role(community_role(), community).await;

    let result = harness
        .orchestrator()
        .run(request("member", join_target(community)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(
        result.terminal.sbt_id,
        Some(MEMBERSHIP_TOKEN_ID.to_string())
    );
}

#[tokio::test]
async fn stake_override_raises_token_requirement() {
    let harness = Harness::new().await;
    let operator = simple_identity("operator", 0x11);
    let address = operator.address();
    harness.store_identities(vec![operator]).await;

    let result = harness
        .orchestrator()
        .run(WorkflowRequest {
            identity: "operator".to_owned(),
            target: operator_target(0),
            overrides: PolicyOverrides {
                stake: Some(units(250)),
                ..PolicyOverrides::default()
            },
        })
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(harness.ledger.tokens(address).await, 250);
}

#[tokio::test]
async fn unknown_identity_is_not_found() {
    let harness = Harness::new().await;
    let result = harness
        .orchestrator()
        .run(request("ghost", operator_target(0)))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn batch_runs_share_the_funding_identity_without_nonce_collisions() {
    let harness = Harness::new().await;
    harness
        .store_identities(vec![
            simple_identity("first", 0x41),
            simple_identity("second", 0x42),
            simple_identity("third", 0x43),
        ])
        .await;

    let results = harness
        .orchestrator()
        .run_batch(vec![
            request("first", operator_target(0)),
            request("second", operator_target(0)),
            request("third", operator_target(0)),
        ])
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        results
            .iter()
            .map(|result| result.identity.as_str())
            .collect::<Vec<_>>(),
        vec!["first", "second", "third"]
    );
    assert!(results.iter().all(|result| result.success));
    assert!(
        results
            .iter()
            .all(|result| result.steps.iter().all(|step| step.attempts == 1))
    );

    let mut funder_nonces = harness
        .ledger
        .submissions()
        .await
        .into_iter()
        .filter(|entry| entry.signer == harness.funder.address())
        .map(|entry| entry.nonce)
        .collect::<Vec<_>>();
    funder_nonces.sort_unstable();
    assert_eq!(funder_nonces, vec![0, 1, 2]);
}

#[tokio::test]
async fn unserialized_concurrent_submissions_collide_on_the_fake_ledger() {
    let harness = Harness::new().await;
    let funder = harness.funder.clone();
    let first = ContractCall::native_transfer(Address::from_bytes([1; 20]), units(1));
    let second = ContractCall::native_transfer(Address::from_bytes([2; 20]), units(1));

    let (a, b) = tokio::join!(
        harness.ledger.submit(&funder, &first),
        harness.ledger.submit(&funder, &second)
    );

    assert!(a.is_ok() != b.is_ok());
}

#[tokio::test]
async fn batch_rejects_repeated_identity() {
    let harness = Harness::new().await;
    harness.store_identities(vec![simple_identity("first", 0x41)]).await;

    let result = harness
        .orchestrator()
        .run_batch(vec![
            request("first", operator_target(0)),
            request("first", operator_target(0)),
        ])
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn community_without_token_name_deploys_no_token() {
    let harness = Harness::new().await;
    let admin = simple_identity("admin", 0x22);
    let address = admin.address();
    harness.store_identities(vec![admin]).await;

    let result = harness
        .orchestrator()
        .run(request("admin", tokenless_community_target()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(step_labels(&result), vec!["fund native", "community launch"]);
    assert_eq!(result.terminal.community_token, None);
    assert_eq!(harness.ledger.points_token(address).await, None);
}

#[tokio::test]
async fn registered_community_without_token_only_deploys_the_token() {
    let harness = Harness::new().await;
    let admin = simple_identity("admin", 0x22);
    let address = admin.address();
    harness.ledger.set_native(address, 100).await;
    harness.ledger.grant_role(community_role(), address).await;
    harness.store_identities(vec![admin]).await;
    let orchestrator = harness.orchestrator();

    let result = orchestrator
        .run(request("admin", community_target()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert!(!result.already_satisfied);
    assert_eq!(step_labels(&result), vec!["deploy community token"]);
    assert_eq!(result.terminal.community_token, Some(COMMUNITY_TOKEN));

    let rerun = orchestrator
        .run(request("admin", community_target()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(rerun.already_satisfied);
    assert_eq!(rerun.terminal.community_token, Some(COMMUNITY_TOKEN));
    assert_eq!(harness.ledger.submissions().await.len(), 1);
}

#[tokio::test]
async fn failed_token_deployment_resumes_at_the_token_step() {
    let harness = Harness::new().await;
    let admin = simple_identity("admin", 0x22);
    let address = admin.address();
    harness.store_identities(vec![admin]).await;
    harness.ledger.revert_label(Some("deploy community token")).await;
    let orchestrator = harness.orchestrator();

    let failed = orchestrator
        .run(request("admin", community_target()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(failed.status, WorkflowRunStatus::Failed { at_step: 2 });
    assert!(failed.error.is_some_and(|failure| failure.partial_progress));
    assert!(harness.ledger.holds_role(community_role(), address).await);

    harness.ledger.revert_label(None).await;
    let resumed = orchestrator
        .run(request("admin", community_target()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(resumed.success);
    assert_eq!(step_labels(&resumed), vec!["deploy community token"]);
    let snapshot = harness
        .store
        .snapshot()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(snapshot.community_token, Some(COMMUNITY_TOKEN));
}

#[tokio::test]
async fn token_request_without_points_factory_is_rejected() {
    let harness = Harness::new().await;
    harness.store_identities(vec![simple_identity("admin", 0x22)]).await;
    let mut addresses = crate::test_support::addresses();
    addresses.points_factory = None;

    let result = harness
        .orchestrator_with(addresses)
        .run(request("admin", community_target()))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(harness.ledger.submissions().await.is_empty());
}

#[tokio::test]
async fn joining_without_community_uses_the_launched_one() {
    let harness = Harness::new().await;
    let community = Address::from_bytes([0x22; 20]);
    harness.ledger.grant_role(community_role(), community).await;
    let _ = harness
        .store
        .record_community(CommunityMarker {
            community_address: community,
            community_token: None,
        })
        .await;
    let member = simple_identity("member", 0x33);
    let address = member.address();
    harness.store_identities(vec![member]).await;

    let result = harness
        .orchestrator()
        .run(request("member", join_target(Address::ZERO)))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert!(
        harness
            .ledger
            .holds_role(RoleId::from_name(RoleId::ENDUSER), address)
            .await
    );
}

#[tokio::test]
async fn joining_without_any_launched_community_is_rejected() {
    let harness = Harness::new().await;
    harness.store_identities(vec![simple_identity("member", 0x33)]).await;

    let result = harness
        .orchestrator()
        .run(request("member", join_target(Address::ZERO)))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(harness.ledger.submissions().await.is_empty());
}

#[tokio::test]
async fn invalid_batch_entry_rejects_the_batch_before_any_submission() {
    let harness = Harness::new().await;
    harness
        .store_identities(vec![
            simple_identity("good", 0x41),
            simple_identity("bad", 0x42),
        ])
        .await;

    let result = harness
        .orchestrator()
        .run_batch(vec![
            request("good", operator_target(0)),
            WorkflowRequest {
                identity: "bad".to_owned(),
                target: operator_target(0),
                overrides: PolicyOverrides {
                    native_minimum: Some(units(500)),
                    native_target: Some(units(1)),
                    ..PolicyOverrides::default()
                },
            },
        ])
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(harness.ledger.submissions().await.is_empty());
}

#[tokio::test]
async fn failing_batch_run_keeps_the_other_results() {
    let harness = Harness::new().await;
    harness
        .store_identities(vec![
            simple_identity("first", 0x41),
            simple_identity("second", 0x42),
        ])
        .await;
    harness.ledger.set_native(harness.funder.address(), 150).await;

    let results = harness
        .orchestrator()
        .run_batch(vec![
            request("first", operator_target(0)),
            request("second", operator_target(0)),
        ])
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].identity, "first");
    assert_eq!(results[1].identity, "second");
    assert_eq!(results.iter().filter(|result| result.success).count(), 1);
    let failed = results
        .iter()
        .find(|result| !result.success)
        .unwrap_or_else(|| unreachable!());
    assert_eq!(failed.status, WorkflowRunStatus::Failed { at_step: 0 });
    assert!(failed.error.is_some());
}
