use chrono::{DateTime, Utc};
use rolegate_core::{Address, Amount, AppError, AppResult, TxHash};
use serde::{Deserialize, Serialize};

use crate::abi::{AbiValue, encode};
use crate::protocol::{ContractCall, points_factory, registry};
use crate::requirement::ResourceRequirement;
use crate::role::RoleId;

/// Community profile registered with the community role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityProfile {
    /// Unique community name.
    pub name: String,
    /// ENS name, may be empty.
    #[serde(default)]
    pub ens_name: String,
    /// Website URL, may be empty.
    #[serde(default)]
    pub website: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Logo URI, may be empty.
    #[serde(default)]
    pub logo_uri: String,
    /// Governance tokens staked with the role.
    #[serde(default)]
    pub stake: Amount,
    /// Points token name; empty means no token is deployed.
    #[serde(default)]
    pub token_name: String,
    /// Points token symbol, required together with the name.
    #[serde(default)]
    pub token_symbol: String,
}

impl CommunityProfile {
    /// True when the launch should also deploy a community points token.
    #[must_use]
    pub fn requests_token(&self) -> bool {
        !self.token_name.trim().is_empty()
    }
}

/// Stake the super-paymaster role requires: 50 governance tokens.
pub const DEFAULT_OPERATOR_STAKE: Amount = Amount::from_base_units(50_000_000_000_000_000_000);

fn default_operator_stake() -> Amount {
    DEFAULT_OPERATOR_STAKE
}

fn unset_community() -> Address {
    Address::ZERO
}

/// Terminal onboarding state an identity is driven towards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowTarget {
    /// Register the identity as a community administrator.
    LaunchCommunity(CommunityProfile),
    /// Register the identity as a super-paymaster operator.
    OnboardOperator {
        /// Governance tokens staked with the role.
        #[serde(default = "default_operator_stake")]
        stake: Amount,
    },
    /// Register the identity as a member of an existing community.
    JoinCommunity {
        /// Community administrator address; zero means the last launched community.
        #[serde(default = "unset_community")]
        community: Address,
        /// Avatar URI, may be empty.
        #[serde(default)]
        avatar_uri: String,
        /// ENS name, may be empty.
        #[serde(default)]
        ens_name: String,
        /// Governance tokens staked with the role.
        #[serde(default)]
        stake: Amount,
    },
}

impl WorkflowTarget {
    /// Returns the role granted when the workflow succeeds.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        match self {
            Self::LaunchCommunity(_) => RoleId::from_name(RoleId::COMMUNITY),
            Self::OnboardOperator { .. } => RoleId::from_name(RoleId::PAYMASTER_SUPER),
            Self::JoinCommunity { .. } => RoleId::from_name(RoleId::ENDUSER),
        }
    }

    /// Returns the governance-token stake locked by registration.
    #[must_use]
    pub fn stake(&self) -> Amount {
        match self {
            Self::LaunchCommunity(profile) => profile.stake,
            Self::OnboardOperator { stake } | Self::JoinCommunity { stake, .. } => *stake,
        }
    }

    /// Returns a copy with the stake replaced.
    #[must_use]
    pub fn with_stake(mut self, amount: Amount) -> Self {
        match &mut self {
            Self::LaunchCommunity(profile) => profile.stake = amount,
            Self::OnboardOperator { stake } | Self::JoinCommunity { stake, .. } => *stake = amount,
        }
        self
    }

    /// Returns a copy joining `address` when no community was named.
    #[must_use]
    pub fn with_default_community(mut self, address: Address) -> Self {
        if let Self::JoinCommunity { community, .. } = &mut self
            && community.is_zero()
        {
            *community = address;
        }
        self
    }

    /// True for a join that names no community.
    #[must_use]
    pub fn needs_community(&self) -> bool {
        matches!(self, Self::JoinCommunity { community, .. } if community.is_zero())
    }

    /// Returns a short label used in logs and transaction history.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::LaunchCommunity(_) => "community launch",
            Self::OnboardOperator { .. } => "operator setup",
            Self::JoinCommunity { .. } => "user onboarding",
        }
    }

    /// Checks target fields that the registry would otherwise reject late.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::LaunchCommunity(profile) if profile.name.trim().is_empty() => Err(
                AppError::Validation("community name must not be empty".to_owned()),
            ),
            Self::LaunchCommunity(profile)
                if profile.token_name.trim().is_empty() != profile.token_symbol.trim().is_empty() =>
            {
                Err(AppError::Validation(
                    "token name and token symbol must be given together".to_owned(),
                ))
            }
            Self::JoinCommunity { community, .. } if community.is_zero() => Err(
                AppError::Validation("community address must not be zero".to_owned()),
            ),
            _ => Ok(()),
        }
    }

    /// Encodes the role-specific registration payload for `account`.
    #[must_use]
    pub fn role_data(&self, account: Address) -> Vec<u8> {
        match self {
            Self::LaunchCommunity(profile) => encode(&[AbiValue::Tuple(vec![
                AbiValue::String(profile.name.clone()),
                AbiValue::String(profile.ens_name.clone()),
                AbiValue::String(profile.website.clone()),
                AbiValue::String(profile.description.clone()),
                AbiValue::String(profile.logo_uri.clone()),
                AbiValue::Uint(profile.stake.base_units()),
            ])]),
            Self::OnboardOperator { .. } => Vec::new(),
            Self::JoinCommunity {
                community,
                avatar_uri,
                ens_name,
                stake,
            } => encode(&[
                AbiValue::Address(account),
                AbiValue::Address(*community),
                AbiValue::String(avatar_uri.clone()),
                AbiValue::String(ens_name.clone()),
                AbiValue::Uint(stake.base_units()),
            ]),
        }
    }

    /// Builds the terminal `registerRole` call for `account`.
    #[must_use]
    pub fn protocol_call(&self, registry_address: Address, account: Address) -> ContractCall {
        let mut call = registry::register_role(
            registry_address,
            self.role_id(),
            account,
            self.role_data(account),
        );
        call.label = self.label().to_owned();
        call
    }

    /// Builds the points-token deployment a community launch asks for.
    #[must_use]
    pub fn token_deployment(&self, factory: Address) -> Option<WorkflowStep> {
        match self {
            Self::LaunchCommunity(profile) if profile.requests_token() => {
                Some(WorkflowStep::DeployCommunityToken {
                    call: points_factory::deploy_token(
                        factory,
                        &profile.token_name,
                        &profile.token_symbol,
                        &profile.name,
                        &profile.ens_name,
                    ),
                })
            }
            _ => None,
        }
    }
}

/// One unit of work that moves an identity towards its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Deploy the identity's smart account through its factory.
    DeployAccount {
        /// Account factory.
        factory: Address,
        /// Owner key address.
        owner: Address,
        /// Deployment salt.
        salt: u64,
    },
    /// Top up a resource balance.
    FundResource {
        /// Address receiving the resource.
        recipient: Address,
        /// Balance requirement to satisfy.
        requirement: ResourceRequirement,
    },
    /// Approve a spender for a token amount.
    ApproveSpender {
        /// Token to approve.
        token: Address,
        /// Contract allowed to pull the tokens.
        spender: Address,
        /// Approved amount.
        amount: Amount,
    },
    /// Submit the terminal protocol call.
    SubmitProtocolCall {
        /// Call to submit.
        call: ContractCall,
    },
    /// Deploy the launched community's points token through the factory.
    DeployCommunityToken {
        /// Factory call, sent by the community administrator.
        call: ContractCall,
    },
}

impl WorkflowStep {
    /// Returns a short label used in logs and transaction history.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::DeployAccount { .. } => "deploy account".to_owned(),
            Self::FundResource { requirement, .. } => format!("fund {}", requirement.resource()),
            Self::ApproveSpender { .. } => "approve stake".to_owned(),
            Self::SubmitProtocolCall { call } | Self::DeployCommunityToken { call } => {
                call.label.clone()
            }
        }
    }
}

/// Outcome of precondition resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Steps still required, in execution order.
    pub steps: Vec<WorkflowStep>,
    /// True when the identity already holds the target role and nothing is pending.
    pub already_satisfied: bool,
}

impl Resolution {
    /// Resolution for an identity that needs nothing further.
    #[must_use]
    pub fn satisfied() -> Self {
        Self {
            steps: Vec::new(),
            already_satisfied: true,
        }
    }
}

/// Per-step outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// All step transactions finalized successfully.
    Finalized,
    /// Nothing was needed when the step ran.
    NoOp,
    /// The step failed.
    Failed,
}

/// Report for one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Zero-based position in the run.
    pub index: usize,
    /// Step label.
    pub label: String,
    /// Step outcome.
    pub status: StepStatus,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Transactions the step submitted.
    pub transaction_ids: Vec<TxHash>,
}

/// Final state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    /// Target reached.
    Succeeded,
    /// Run stopped at a step.
    Failed {
        /// Zero-based index of the failed step.
        at_step: usize,
    },
}

/// Failure details attached to an unsuccessful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    /// Zero-based index of the failed step.
    pub step_index: usize,
    /// Failed step label, `resolve` for resolution failures.
    pub step_label: String,
    /// Stable error code.
    pub error_kind: String,
    /// Error message.
    pub message: String,
    /// True when the outcome of the last submission is unknown.
    pub inconclusive: bool,
    /// True when any earlier step finalized a transaction.
    pub partial_progress: bool,
}

/// Identifiers produced by the terminal call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TerminalIdentifiers {
    /// Points token of a launched community.
    pub community_token: Option<Address>,
    /// Membership token id of a joined user.
    pub sbt_id: Option<String>,
}

/// Result of driving one identity towards a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Identity name.
    pub identity: String,
    /// Identity address.
    pub address: Address,
    /// Target label.
    pub target: String,
    /// True when the target was reached.
    pub success: bool,
    /// Final run state.
    pub status: WorkflowRunStatus,
    /// True when nothing needed doing.
    pub already_satisfied: bool,
    /// Executed steps in order.
    pub steps: Vec<StepReport>,
    /// Every transaction submitted during the run.
    pub transaction_ids: Vec<TxHash>,
    /// Identifiers produced by the terminal call.
    pub terminal: TerminalIdentifiers,
    /// Failure details when unsuccessful.
    pub error: Option<WorkflowFailure>,
    /// Run start time.
    pub started_at: DateTime<Utc>,
    /// Run end time.
    pub finished_at: DateTime<Utc>,
}
