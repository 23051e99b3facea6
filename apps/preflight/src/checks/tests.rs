use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rolegate_application::RetryPolicy;
use rolegate_core::AppError;
use rolegate_domain::abi::{AbiValue, encode, selector};
use rolegate_infrastructure::{InMemoryWorkflowStateStore, parse_token_amount};
use tokio::sync::Mutex;

use super::*;

const TOKENS: u128 = 1_000_000_000_000_000_000;

struct FakeLedger {
    online: bool,
    native: Amount,
    tokens: Amount,
    without_code: HashSet<Address>,
    inactive_roles: Mutex<usize>,
}

impl FakeLedger {
    fn healthy() -> Self {
        Self {
            online: true,
            native: Amount::from_base_units(TOKENS),
            tokens: Amount::from_base_units(500 * TOKENS),
            without_code: HashSet::new(),
            inactive_roles: Mutex::new(0),
        }
    }

    fn reachable(&self) -> AppResult<()> {
        if self.online {
            Ok(())
        } else {
            Err(AppError::TransientRead("connection refused".to_owned()))
        }
    }
}

#[async_trait]
impl LedgerReader for FakeLedger {
    async fn native_balance(&self, _address: Address) -> AppResult<Amount> {
        self.reachable()?;
        Ok(self.native)
    }

    async fn read_state(&self, _contract: Address, calldata: Vec<u8>) -> AppResult<Vec<u8>> {
        self.reachable()?;
        if calldata.starts_with(&selector("balanceOf(address)")) {
            return Ok(encode(&[AbiValue::Uint(self.tokens.base_units())]));
        }

        let mut inactive = self.inactive_roles.lock().await;
        let is_active = *inactive == 0;
        *inactive = inactive.saturating_sub(1);
        Ok(encode(&[
            AbiValue::Uint(10 * TOKENS),
            AbiValue::Uint(TOKENS),
            AbiValue::Uint(86_400),
            AbiValue::Bool(is_active),
        ]))
    }

    async fn code_present(&self, address: Address) -> AppResult<bool> {
        self.reachable()?;
        Ok(!self.without_code.contains(&address))
    }

    async fn block_number(&self) -> AppResult<u64> {
        self.reachable()?;
        Ok(19_000_000)
    }
}

fn address(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn addresses() -> ProtocolAddresses {
    ProtocolAddresses {
        registry: address(0x52),
        governance_token: address(0x60),
        staking: address(0x51),
        account_factory: Some(address(0x53)),
        points_factory: None,
        sbt: None,
        points_token: None,
    }
}

fn thresholds() -> Thresholds {
    Thresholds {
        min_native: parse_token_amount("0.5").unwrap_or_default(),
        min_token: parse_token_amount("200").unwrap_or_default(),
    }
}

async fn run_checks(ledger: FakeLedger) -> PreflightReport {
    let ledger = Arc::new(ledger);
    let queries = StateQueryService::new(
        ledger.clone(),
        Arc::new(InMemoryWorkflowStateStore::new()),
        addresses(),
    )
    .with_retry_policy(RetryPolicy::new(1, Duration::ZERO));

    PreflightReport::from_checks(
        ledger_checks(
            ledger.as_ref(),
            &queries,
            &addresses(),
            address(0xf0),
            &thresholds(),
        )
        .await,
    )
}

fn status_of<'a>(report: &'a PreflightReport, name: &str) -> Option<&'a CheckOutcome> {
    report.checks.iter().find(|check| check.name == name)
}

#[tokio::test]
async fn healthy_deployment_passes_every_check() {
    let report = run_checks(FakeLedger::healthy()).await;

    assert!(report.passed());
    assert_eq!(report.hard_failures(), 0);
    assert!(status_of(&report, "account factory contract").is_some());
    assert!(status_of(&report, "role PAYMASTER_SUPER").is_some());
    assert!(report.render().ends_with("ready: 10 checks, 0 failed"));
}

#[tokio::test]
async fn unreachable_endpoint_stops_after_connectivity() {
    let ledger = FakeLedger {
        online: false,
        ..FakeLedger::healthy()
    };

    let report = run_checks(ledger).await;

    assert!(!report.passed());
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].name, "connectivity");
}

#[tokio::test]
async fn underfunded_funder_fails_hard() {
    let ledger = FakeLedger {
        tokens: Amount::from_base_units(150 * TOKENS),
        ..FakeLedger::healthy()
    };

    let report = run_checks(ledger).await;

    let check = status_of(&report, "funder token balance").cloned();
    assert_eq!(check.map(|check| check.status), Some(CheckStatus::Fail));
    assert_eq!(report.hard_failures(), 1);
}

#[tokio::test]
async fn missing_optional_contract_only_warns() {
    let ledger = FakeLedger {
        without_code: HashSet::from([address(0x53)]),
        ..FakeLedger::healthy()
    };

    let report = run_checks(ledger).await;

    let check = status_of(&report, "account factory contract").cloned();
    assert_eq!(check.map(|check| check.status), Some(CheckStatus::Warn));
    assert!(report.passed());
}

#[tokio::test]
async fn missing_registry_fails_hard() {
    let ledger = FakeLedger {
        without_code: HashSet::from([address(0x52)]),
        ..FakeLedger::healthy()
    };

    let report = run_checks(ledger).await;

    assert!(!report.passed());
}

#[tokio::test]
async fn inactive_role_fails_hard() {
    let ledger = FakeLedger {
        inactive_roles: Mutex::new(1),
        ..FakeLedger::healthy()
    };

    let report = run_checks(ledger).await;

    let check = status_of(&report, "role COMMUNITY").cloned();
    assert_eq!(check.map(|check| check.status), Some(CheckStatus::Fail));
    assert_eq!(report.hard_failures(), 1);
}

#[test]
fn chain_id_mismatch_is_reported() {
    assert_eq!(chain_id_check(1, Ok(1)).status, CheckStatus::Pass);

    let mismatch = chain_id_check(11_155_111, Ok(1));
    assert_eq!(mismatch.status, CheckStatus::Fail);
    assert!(mismatch.detail.contains("11155111"));

    let unreachable = chain_id_check(1, Err(AppError::TransientRead("timeout".to_owned())));
    assert_eq!(unreachable.status, CheckStatus::Fail);
}

#[test]
fn report_render_lists_each_check() {
    let report = PreflightReport::from_checks(vec![
        CheckOutcome::pass("connectivity", "head block 7"),
        CheckOutcome::warn("sbt contract", "no code"),
        CheckOutcome::fail("configuration", "RPC_URL is required"),
    ]);

    let rendered = report.render();

    assert!(rendered.contains("[PASS] connectivity"));
    assert!(rendered.contains("[WARN] sbt contract"));
    assert!(rendered.contains("[FAIL] configuration"));
    assert!(rendered.ends_with("not ready: 3 checks, 1 failed"));
}
