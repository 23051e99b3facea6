use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rolegate_application::{KeyGenerator, ProtocolAddresses, RetryPolicy};
use rolegate_core::{Address, Amount, AppError, AppResult, NonEmptyString};
use rolegate_domain::{Identity, ProvisioningPolicy, SigningKeyHex};
use url::Url;

use crate::json_rpc_ledger_client::JsonRpcSettings;

/// Decimals of the native currency and the governance token.
const TOKEN_DECIMALS: u32 = 18;
const FUNDING_IDENTITY_NAME: &str = "funding";

/// Ledger, protocol and funding settings shared by every binary.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Key of the identity that pays for top-ups and account deployments.
    pub funding_key: SigningKeyHex,
    /// Registry, token and factory addresses.
    pub addresses: ProtocolAddresses,
    /// JSON state file location.
    pub state_file: PathBuf,
    /// Default minimum and target balances.
    pub policy: ProvisioningPolicy,
    /// Blocks required on top of a receipt.
    pub confirmations: u64,
    /// Deadline for a receipt to become final.
    pub finalization_timeout: Duration,
    /// Delay between receipt polls.
    pub receipt_poll_interval: Duration,
    /// Attempts per workflow step and per read.
    pub step_max_attempts: u32,
    /// Base delay between attempts.
    pub retry_backoff: Duration,
    /// Timeout for one JSON-RPC request.
    pub rpc_timeout: Duration,
}

impl ChainConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> AppResult<Self> {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_source<F>(source: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvSource(source);

        let rpc_url = vars.required("RPC_URL")?;
        let rpc_url = Url::parse(&rpc_url)
            .map_err(|error| AppError::Validation(format!("invalid RPC_URL '{rpc_url}': {error}")))?;
        let chain_id = vars.parse("CHAIN_ID", None)?;
        let funding_key = SigningKeyHex::new(vars.required("FUNDING_PRIVATE_KEY")?)?;

        let addresses = ProtocolAddresses {
            registry: vars.parse("REGISTRY_ADDRESS", None)?,
            governance_token: vars.parse("GTOKEN_ADDRESS", None)?,
            staking: vars.parse("STAKING_ADDRESS", None)?,
            account_factory: vars.optional("ACCOUNT_FACTORY_ADDRESS")?,
            points_factory: vars.optional("POINTS_FACTORY_ADDRESS")?,
            sbt: vars.optional("SBT_ADDRESS")?,
            points_token: vars.optional("POINTS_TOKEN_ADDRESS")?,
        };

        let policy = ProvisioningPolicy {
            native_minimum: vars.amount("NATIVE_MIN", "0.01")?,
            native_target: vars.amount("NATIVE_TARGET", "0.05")?,
            token_minimum: vars.amount("TOKEN_MIN", "10")?,
            token_target: vars.amount("TOKEN_TARGET", "100")?,
        };
        policy.native_requirement()?;
        policy.token_requirement(addresses.governance_token, Amount::ZERO)?;

        Ok(Self {
            rpc_url,
            chain_id,
            funding_key,
            addresses,
            state_file: PathBuf::from(
                vars.get("STATE_FILE")
                    .unwrap_or_else(|| "rolegate_state.json".to_owned()),
            ),
            policy,
            confirmations: vars.parse("CONFIRMATIONS", Some(1))?,
            finalization_timeout: Duration::from_secs(
                vars.parse("FINALIZATION_TIMEOUT_SECS", Some(120))?,
            ),
            receipt_poll_interval: Duration::from_millis(
                vars.parse("RECEIPT_POLL_INTERVAL_MS", Some(2000))?,
            ),
            step_max_attempts: vars.parse("STEP_MAX_ATTEMPTS", Some(3))?,
            retry_backoff: Duration::from_millis(vars.parse("RETRY_BACKOFF_MS", Some(500))?),
            rpc_timeout: Duration::from_secs(vars.parse("RPC_TIMEOUT_SECS", Some(15))?),
        })
    }

    /// Settings for the JSON-RPC ledger client.
    #[must_use]
    pub fn json_rpc_settings(&self) -> JsonRpcSettings {
        JsonRpcSettings {
            confirmations: self.confirmations.max(1),
            finalization_timeout: self.finalization_timeout,
            poll_interval: self.receipt_poll_interval,
            ..JsonRpcSettings::new(self.chain_id)
        }
    }

    /// Retry policy for reads and workflow steps.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.step_max_attempts, self.retry_backoff)
    }

    /// HTTP client with the configured request timeout.
    pub fn http_client(&self) -> AppResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.rpc_timeout)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))
    }

    /// Builds the funding identity from the configured key.
    pub fn funding_identity(&self, keys: &dyn KeyGenerator) -> AppResult<Identity> {
        Ok(Identity::simple(
            NonEmptyString::new(FUNDING_IDENTITY_NAME)?,
            keys.address_of(&self.funding_key)?,
            self.funding_key.clone(),
        ))
    }
}

/// Parses a decimal token amount such as `"0.05"` into base units.
pub fn parse_token_amount(value: &str) -> AppResult<Amount> {
    Amount::parse_units(value, TOKEN_DECIMALS)
}

/// Formats base units as a decimal token amount.
#[must_use]
pub fn format_token_amount(amount: Amount) -> String {
    amount.format_units(TOKEN_DECIMALS)
}

struct EnvSource<F>(F);

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.get(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn parse<T>(&self, name: &str, default: Option<T>) -> AppResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.get(name), default) {
            (Some(value), _) => value.trim().parse::<T>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(AppError::Validation(format!("{name} is required"))),
        }
    }

    fn optional(&self, name: &str) -> AppResult<Option<Address>> {
        self.get(name)
            .map(|value| {
                value.trim().parse::<Address>().map_err(|error| {
                    AppError::Validation(format!("invalid {name} value '{value}': {error}"))
                })
            })
            .transpose()
    }

    fn amount(&self, name: &str, default: &str) -> AppResult<Amount> {
        let value = self.get(name).unwrap_or_else(|| default.to_owned());
        parse_token_amount(&value)
            .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
    }
}
