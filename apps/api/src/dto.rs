use rolegate_application::{FundingReport, WorkflowRequest};
use rolegate_core::{Address, AppError, AppResult};
use rolegate_domain::{Identity, IdentityFlavor, IdentityView, PolicyOverrides};
use rolegate_infrastructure::parse_token_amount;
use serde::{Deserialize, Serialize};

/// Dependency status entry in the health payload.
#[derive(Debug, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub ledger: HealthDependencyStatus,
    pub block_number: Option<u64>,
}

/// Incoming payload for identity generation.
#[derive(Debug, Deserialize)]
pub struct GenerateIdentitiesRequest {
    pub names: Vec<String>,
    #[serde(default)]
    pub kind: IdentityFlavor,
    #[serde(default)]
    pub reveal_keys: bool,
}

/// API representation of a generated identity.
#[derive(Debug, Serialize)]
pub struct GeneratedIdentityResponse {
    #[serde(flatten)]
    pub identity: IdentityView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl GeneratedIdentityResponse {
    pub fn from_identity(identity: &Identity, reveal_key: bool) -> Self {
        Self {
            identity: identity.public_view(),
            private_key: reveal_key.then(|| identity.signing_key().expose().to_owned()),
        }
    }
}

/// Incoming payload for funding every stored identity.
///
/// Amounts are decimal token strings; each one is used as both minimum and target.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FundIdentitiesRequest {
    pub native: Option<String>,
    pub token: Option<String>,
}

impl FundIdentitiesRequest {
    pub fn overrides(&self) -> AppResult<PolicyOverrides> {
        let native = self.native.as_deref().map(parse_token_amount).transpose()?;
        let token = self.token.as_deref().map(parse_token_amount).transpose()?;

        Ok(PolicyOverrides {
            native_minimum: native,
            native_target: native,
            token_minimum: token,
            token_target: token,
            stake: None,
        })
    }
}

/// Funding response payload.
#[derive(Debug, Serialize)]
pub struct FundIdentitiesResponse {
    pub funded: usize,
    pub failed: usize,
    pub reports: Vec<FundingReport>,
}

impl From<Vec<FundingReport>> for FundIdentitiesResponse {
    fn from(reports: Vec<FundingReport>) -> Self {
        let failed = reports.iter().filter(|report| report.error.is_some()).count();
        Self {
            funded: reports.len() - failed,
            failed,
            reports,
        }
    }
}

/// Incoming payload for a batch of workflow runs.
#[derive(Debug, Deserialize)]
pub struct BatchWorkflowRequest {
    pub runs: Vec<WorkflowRequest>,
}

/// Query string for balance lookups: `?address=0x..,0x..`.
#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    pub address: String,
}

impl BalancesQuery {
    pub fn addresses(&self) -> AppResult<Vec<Address>> {
        let addresses = self
            .address
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::parse::<Address>)
            .collect::<AppResult<Vec<_>>>()?;

        if addresses.is_empty() {
            return Err(AppError::Validation(
                "at least one address is required".to_owned(),
            ));
        }

        Ok(addresses)
    }
}
