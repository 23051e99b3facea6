//! Rolegate preflight check: validates configuration, connectivity, funding and roles.

#![forbid(unsafe_code)]

mod checks;

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use rolegate_application::{LedgerReader, StateQueryService};
use rolegate_core::{Amount, AppError, AppResult};
use rolegate_infrastructure::{
    ChainConfig, InMemoryWorkflowStateStore, JsonRpcLedgerClient, K256KeyGenerator,
    parse_token_amount,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::checks::{CheckOutcome, PreflightReport, Thresholds, chain_id_check};

#[derive(Debug, Clone)]
struct PreflightConfig {
    chain: ChainConfig,
    thresholds: Thresholds,
}

impl PreflightConfig {
    fn load() -> AppResult<Self> {
        Ok(Self {
            chain: ChainConfig::load()?,
            thresholds: Thresholds {
                min_native: parse_env_amount("PREFLIGHT_MIN_NATIVE", "0.5")?,
                min_token: parse_env_amount("PREFLIGHT_MIN_TOKEN", "200")?,
            },
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match PreflightConfig::load() {
        Ok(config) => config,
        Err(error) => {
            let report = PreflightReport::from_checks(vec![CheckOutcome::fail(
                "configuration",
                error.to_string(),
            )]);
            println!("{}", report.render());
            return ExitCode::FAILURE;
        }
    };

    match run(&config).await {
        Ok(report) => {
            println!("{}", report.render());
            if report.passed() {
                info!("preflight passed");
                ExitCode::SUCCESS
            } else {
                error!(failures = report.hard_failures(), "preflight failed");
                ExitCode::FAILURE
            }
        }
        Err(run_error) => {
            error!(error = %run_error, "preflight could not run");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &PreflightConfig) -> AppResult<PreflightReport> {
    let chain = &config.chain;
    let client = Arc::new(JsonRpcLedgerClient::new(
        chain.http_client()?,
        chain.rpc_url.clone(),
        chain.json_rpc_settings(),
    ));
    let keys = K256KeyGenerator::new();
    let funder = chain.funding_identity(&keys)?;

    info!(
        rpc_url = %chain.rpc_url,
        chain_id = chain.chain_id,
        funder = %funder.address(),
        "preflight started"
    );

    let ledger: Arc<dyn LedgerReader> = client.clone();
    let queries = StateQueryService::new(
        ledger.clone(),
        Arc::new(InMemoryWorkflowStateStore::new()),
        chain.addresses,
    )
    .with_retry_policy(chain.retry_policy());

    let mut outcomes = vec![CheckOutcome::pass(
        "configuration",
        format!("state file {}", chain.state_file.display()),
    )];
    outcomes.push(chain_id_check(chain.chain_id, client.remote_chain_id().await));
    outcomes.extend(
        checks::ledger_checks(
            ledger.as_ref(),
            &queries,
            &chain.addresses,
            funder.address(),
            &config.thresholds,
        )
        .await,
    );

    Ok(PreflightReport::from_checks(outcomes))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_env_amount(name: &str, default: &str) -> AppResult<Amount> {
    let value = env::var(name).unwrap_or_else(|_| default.to_owned());
    parse_token_amount(&value)
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}
