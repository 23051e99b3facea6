use std::fmt::Write as _;

use rolegate_application::{LedgerReader, ProtocolAddresses, StateQueryService};
use rolegate_core::{Address, Amount, AppResult};
use rolegate_domain::RoleId;
use rolegate_infrastructure::format_token_amount;

/// Roles the onboarding workflows register.
const WORKFLOW_ROLES: [&str; 3] = [RoleId::COMMUNITY, RoleId::ENDUSER, RoleId::PAYMASTER_SUPER];

/// Minimum funding identity balances.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub min_native: Amount,
    pub min_token: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, detail)
    }

    pub fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, detail)
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, detail)
    }

    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    checks: Vec<CheckOutcome>,
}

impl PreflightReport {
    pub fn from_checks(checks: Vec<CheckOutcome>) -> Self {
        Self { checks }
    }

    pub fn hard_failures(&self) -> usize {
        self.checks
            .iter()
            .filter(|check| check.status == CheckStatus::Fail)
            .count()
    }

    /// True when no hard check failed; warnings do not fail the run.
    pub fn passed(&self) -> bool {
        self.hard_failures() == 0
    }

    pub fn render(&self) -> String {
        let width = self
            .checks
            .iter()
            .map(|check| check.name.len())
            .max()
            .unwrap_or_default();

        let mut rendered = String::from("rolegate preflight\n");
        for check in &self.checks {
            let _ = writeln!(
                rendered,
                "  [{}] {:<width$}  {}",
                check.status.as_str(),
                check.name,
                check.detail
            );
        }
        let verdict = if self.passed() { "ready" } else { "not ready" };
        let _ = write!(
            rendered,
            "{verdict}: {} checks, {} failed",
            self.checks.len(),
            self.hard_failures()
        );
        rendered
    }
}

pub fn chain_id_check(expected: u64, remote: AppResult<u64>) -> CheckOutcome {
    match remote {
        Ok(remote) if remote == expected => CheckOutcome::pass("chain id", remote.to_string()),
        Ok(remote) => CheckOutcome::fail(
            "chain id",
            format!("endpoint reports {remote}, CHAIN_ID is {expected}"),
        ),
        Err(error) => CheckOutcome::fail("chain id", error.to_string()),
    }
}

/// Runs every check that needs the ledger.
///
/// Skips the rest when the endpoint does not answer `block_number`.
pub async fn ledger_checks(
    ledger: &dyn LedgerReader,
    queries: &StateQueryService,
    addresses: &ProtocolAddresses,
    funder: Address,
    thresholds: &Thresholds,
) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::new();
    match ledger.block_number().await {
        Ok(block) => outcomes.push(CheckOutcome::pass("connectivity", format!("head block {block}"))),
        Err(error) => {
            outcomes.push(CheckOutcome::fail("connectivity", error.to_string()));
            return outcomes;
        }
    }

    for (name, contract, required) in contracts(addresses) {
        outcomes.push(contract_check(ledger, name, contract, required).await);
    }

    outcomes.push(balance_check(
        "funder native balance",
        ledger.native_balance(funder).await,
        thresholds.min_native,
    ));
    outcomes.push(balance_check(
        "funder token balance",
        ledger.token_balance(addresses.governance_token, funder).await,
        thresholds.min_token,
    ));

    for role in WORKFLOW_ROLES {
        outcomes.push(role_check(queries, role).await);
    }

    outcomes
}

fn contracts(addresses: &ProtocolAddresses) -> Vec<(&'static str, Address, bool)> {
    let mut contracts = vec![
        ("registry", addresses.registry, true),
        ("governance token", addresses.governance_token, true),
        ("staking", addresses.staking, true),
    ];
    let optional = [
        ("account factory", addresses.account_factory),
        ("points factory", addresses.points_factory),
        ("sbt", addresses.sbt),
        ("points token", addresses.points_token),
    ];
    contracts.extend(
        optional
            .into_iter()
            .filter_map(|(name, address)| address.map(|address| (name, address, false))),
    );
    contracts
}

async fn contract_check(
    ledger: &dyn LedgerReader,
    name: &str,
    contract: Address,
    required: bool,
) -> CheckOutcome {
    let label = format!("{name} contract");
    match ledger.code_present(contract).await {
        Ok(true) => CheckOutcome::pass(label, contract.to_string()),
        Ok(false) if required => CheckOutcome::fail(label, format!("no code at {contract}")),
        Ok(false) => CheckOutcome::warn(label, format!("no code at {contract}")),
        Err(error) => CheckOutcome::fail(label, error.to_string()),
    }
}

fn balance_check(name: &str, balance: AppResult<Amount>, minimum: Amount) -> CheckOutcome {
    match balance {
        Ok(balance) if balance >= minimum => {
            CheckOutcome::pass(name, format_token_amount(balance))
        }
        Ok(balance) => CheckOutcome::fail(
            name,
            format!(
                "{} below required {}",
                format_token_amount(balance),
                format_token_amount(minimum)
            ),
        ),
        Err(error) => CheckOutcome::fail(name, error.to_string()),
    }
}

async fn role_check(queries: &StateQueryService, role: &str) -> CheckOutcome {
    let label = format!("role {role}");
    match queries.role_config(RoleId::from_name(role)).await {
        Ok(config) if config.is_active => CheckOutcome::pass(
            label,
            format!(
                "entry burn {}, exit burn {}, lock {}s",
                format_token_amount(config.entry_burn),
                format_token_amount(config.exit_burn),
                config.lock_duration
            ),
        ),
        Ok(_) => CheckOutcome::fail(label, "role is not active in the registry"),
        Err(error) => CheckOutcome::fail(label, error.to_string()),
    }
}

#[cfg(test)]
mod tests;
