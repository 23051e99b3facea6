//! In-process fakes shared by service tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rolegate_core::{Address, Amount, AppError, AppResult, NonEmptyString, TxHash};
use rolegate_domain::abi::{AbiType, AbiValue, decode, encode, selector};
use rolegate_domain::{
    CommunityMarker, ContractCall, Identity, ProvisioningPolicy, RoleId, SigningKeyHex,
    TransactionRecord, WorkflowState,
};
use tokio::sync::Mutex;

use crate::ledger_ports::{GeneratedKey, KeyGenerator, LedgerReader, Receipt, TransactionSubmitter};
use crate::precondition_resolver::PreconditionResolver;
use crate::protocol_settings::ProtocolAddresses;
use crate::provisioner::Provisioner;
use crate::retry::RetryPolicy;
use crate::serialized_submitter::SerializedSubmitter;
use crate::state_ports::WorkflowStateStore;
use crate::workflow_orchestrator::WorkflowOrchestrator;

pub(crate) const GOVERNANCE_TOKEN: Address = Address::from_bytes([0x60; 20]);
pub(crate) const STAKING: Address = Address::from_bytes([0x51; 20]);
pub(crate) const REGISTRY: Address = Address::from_bytes([0x52; 20]);
pub(crate) const ACCOUNT_FACTORY: Address = Address::from_bytes([0x53; 20]);
pub(crate) const POINTS_FACTORY: Address = Address::from_bytes([0x54; 20]);
pub(crate) const SBT: Address = Address::from_bytes([0x55; 20]);
pub(crate) const COMMUNITY_TOKEN: Address = Address::from_bytes([0x56; 20]);
pub(crate) const MEMBERSHIP_TOKEN_ID: u128 = 7;

pub(crate) fn units(value: u128) -> Amount {
    Amount::from_base_units(value)
}

pub(crate) fn addresses() -> ProtocolAddresses {
    ProtocolAddresses {
        registry: REGISTRY,
        governance_token: GOVERNANCE_TOKEN,
        staking: STAKING,
        account_factory: Some(ACCOUNT_FACTORY),
        points_factory: Some(POINTS_FACTORY),
        sbt: Some(SBT),
        points_token: Some(COMMUNITY_TOKEN),
    }
}

pub(crate) fn policy() -> ProvisioningPolicy {
    ProvisioningPolicy {
        native_minimum: units(10),
        native_target: units(100),
        token_minimum: units(10),
        token_target: units(100),
    }
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

fn key(seed: u8) -> SigningKeyHex {
    SigningKeyHex::new(hex::encode([seed; 32])).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn simple_identity(name: &str, seed: u8) -> Identity {
    Identity::simple(
        NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
        Address::from_bytes([seed; 20]),
        key(seed),
    )
}

/// Counterfactual smart-account address the fake factory assigns to `owner`.
pub(crate) fn derived_account(owner: Address) -> Address {
    let mut bytes = *owner.as_bytes();
    bytes[0] ^= 0xff;
    Address::from_bytes(bytes)
}

pub(crate) fn contract_backed_identity(name: &str, seed: u8) -> Identity {
    let owner = Address::from_bytes([seed; 20]);
    Identity::contract_backed(
        NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
        derived_account(owner),
        key(seed),
        owner,
        ACCOUNT_FACTORY,
        0,
    )
    .unwrap_or_else(|_| unreachable!())
}

#[derive(Debug, Clone)]
pub(crate) struct Submission {
    pub signer: Address,
    pub label: String,
    pub nonce: u64,
}

#[derive(Default)]
struct LedgerState {
    native: HashMap<Address, u128>,
    tokens: HashMap<(Address, Address), u128>,
    allowances: HashMap<(Address, Address, Address), u128>,
    roles: HashSet<(RoleId, Address)>,
    unlisted_members: HashSet<(RoleId, Address)>,
    code: HashSet<Address>,
    role_stake: HashMap<RoleId, u128>,
    points_tokens: HashMap<Address, Address>,
    next_nonce: HashMap<Address, u64>,
    used_nonces: HashSet<(Address, u64)>,
    receipts: HashMap<TxHash, (String, Receipt)>,
    submissions: Vec<Submission>,
    submit_failures: VecDeque<AppError>,
    read_failures: u32,
    revert_label: Option<String>,
    timeout_label: Option<String>,
    tx_counter: u64,
}

/// Fake ledger that applies calls on broadcast and rejects reused nonces.
///
/// The pending nonce is read and used across an await point, so unserialized
/// concurrent submissions from one signer collide just like on a real node.
#[derive(Default)]
pub(crate) struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub(crate) async fn set_native(&self, address: Address, amount: u128) {
        self.state.lock().await.native.insert(address, amount);
    }

    pub(crate) async fn set_tokens(&self, owner: Address, amount: u128) {
        self.state
            .lock()
            .await
            .tokens
            .insert((GOVERNANCE_TOKEN, owner), amount);
    }

    pub(crate) async fn set_allowance(&self, owner: Address, amount: u128) {
        self.state
            .lock()
            .await
            .allowances
            .insert((GOVERNANCE_TOKEN, owner, STAKING), amount);
    }

    pub(crate) async fn grant_role(&self, role: RoleId, account: Address) {
        self.state.lock().await.roles.insert((role, account));
    }

    pub(crate) async fn hide_member(&self, role: RoleId, account: Address) {
        self.state
            .lock()
            .await
            .unlisted_members
            .insert((role, account));
    }

    pub(crate) async fn require_stake(&self, role: RoleId, amount: u128) {
        self.state.lock().await.role_stake.insert(role, amount);
    }

    pub(crate) async fn fail_next_submissions(&self, errors: Vec<AppError>) {
        self.state.lock().await.submit_failures.extend(errors);
    }

    pub(crate) async fn fail_next_reads(&self, count: u32) {
        self.state.lock().await.read_failures = count;
    }

    pub(crate) async fn revert_label(&self, label: Option<&str>) {
        self.state.lock().await.revert_label = label.map(ToOwned::to_owned);
    }

    pub(crate) async fn time_out_label(&self, label: Option<&str>) {
        self.state.lock().await.timeout_label = label.map(ToOwned::to_owned);
    }

    pub(crate) async fn native(&self, address: Address) -> u128 {
        self.state
            .lock()
            .await
            .native
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) async fn tokens(&self, owner: Address) -> u128 {
        self.state
            .lock()
            .await
            .tokens
            .get(&(GOVERNANCE_TOKEN, owner))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) async fn holds_role(&self, role: RoleId, account: Address) -> bool {
        self.state.lock().await.roles.contains(&(role, account))
    }

    pub(crate) async fn deployed(&self, address: Address) -> bool {
        self.state.lock().await.code.contains(&address)
    }

    pub(crate) async fn points_token(&self, community: Address) -> Option<Address> {
        self.state
            .lock()
            .await
            .points_tokens
            .get(&community)
            .copied()
    }

    pub(crate) async fn submissions(&self) -> Vec<Submission> {
        self.state.lock().await.submissions.clone()
    }

    async fn check_read(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(AppError::TransientRead("connection reset".to_owned()));
        }
        Ok(())
    }
}

impl LedgerState {
    fn apply(&mut self, sender: Address, call: &ContractCall) -> Result<(), String> {
        if call.data.is_empty() {
            return self.move_native(sender, call.to, call.value.base_units());
        }

        let (head, body) = call.data.split_at(4);
        let args = |types: &[AbiType]| decode(types, body).map_err(|error| error.to_string());

        if head == selector("transfer(address,uint256)") {
            let mut values = args(&[AbiType::Address, AbiType::Uint])?.into_iter();
            let recipient = address_arg(values.next())?;
            let amount = uint_arg(values.next())?;
            return self.move_tokens(call.to, sender, recipient, amount);
        }

        if head == selector("approve(address,uint256)") {
            let mut values = args(&[AbiType::Address, AbiType::Uint])?.into_iter();
            let spender = address_arg(values.next())?;
            let amount = uint_arg(values.next())?;
            self.allowances.insert((call.to, sender, spender), amount);
            return Ok(());
        }

        if head == selector("createAccount(address,uint256)") {
            let mut values = args(&[AbiType::Address, AbiType::Uint])?.into_iter();
            let owner = address_arg(values.next())?;
            self.code.insert(derived_account(owner));
            return Ok(());
        }

        if head == selector("execute(address,uint256,bytes)") {
            if !self.code.contains(&call.to) {
                return Err("account not deployed".to_owned());
            }
            if sender != owner_of(call.to) {
                return Err("OwnableUnauthorizedAccount".to_owned());
            }
            let mut values = args(&[AbiType::Address, AbiType::Uint, AbiType::Bytes])?.into_iter();
            let target = address_arg(values.next())?;
            let value = uint_arg(values.next())?;
            let data = values
                .next()
                .ok_or("missing data")?
                .into_bytes()
                .map_err(|error| error.to_string())?;
            let inner = ContractCall {
                to: target,
                value: Amount::from_base_units(value),
                data,
                label: call.label.clone(),
            };
            return self.apply(call.to, &inner);
        }

        if head == selector("registerRole(bytes32,address,bytes)") {
            let mut values =
                args(&[AbiType::FixedBytes32, AbiType::Address, AbiType::Bytes])?.into_iter();
            let role = match values.next() {
                Some(AbiValue::FixedBytes32(bytes)) => RoleId::from_bytes(bytes),
                _ => return Err("missing role".to_owned()),
            };
            let account = address_arg(values.next())?;
            if account != sender {
                return Err("Unauthorized".to_owned());
            }
            if role == RoleId::from_name(RoleId::ENDUSER) {
                let role_data = values
                    .next()
                    .ok_or("missing role data")?
                    .into_bytes()
                    .map_err(|error| error.to_string())?;
                let community = decode(
                    &[
                        AbiType::Address,
                        AbiType::Address,
                        AbiType::String,
                        AbiType::String,
                        AbiType::Uint,
                    ],
                    &role_data,
                )
                .map_err(|error| error.to_string())?
                .into_iter()
                .nth(1);
                let community = address_arg(community)?;
                if !self
                    .roles
                    .contains(&(RoleId::from_name(RoleId::COMMUNITY), community))
                {
                    return Err("CommunityNotFound".to_owned());
                }
            }
            if self.roles.contains(&(role, account)) {
                return Err("RoleAlreadyGranted".to_owned());
            }

            let stake = self.role_stake.get(&role).copied().unwrap_or_default();
            if stake > 0 {
                let key = (GOVERNANCE_TOKEN, account, STAKING);
                let allowance = self.allowances.get(&key).copied().unwrap_or_default();
                if allowance < stake {
                    return Err("ERC20InsufficientAllowance".to_owned());
                }
                self.move_tokens(GOVERNANCE_TOKEN, account, STAKING, stake)?;
                self.allowances.insert(key, allowance - stake);
            }

            self.roles.insert((role, account));
            return Ok(());
        }

        if head == selector("deployxPNTsToken(string,string,string,string,uint256,address)") {
            if call.to != POINTS_FACTORY {
                return Err("not a points factory".to_owned());
            }
            if !self
                .roles
                .contains(&(RoleId::from_name(RoleId::COMMUNITY), sender))
            {
                return Err("CommunityNotRegistered".to_owned());
            }
            if self.points_tokens.contains_key(&sender) {
                return Err("TokenAlreadyDeployed".to_owned());
            }
            self.points_tokens.insert(sender, COMMUNITY_TOKEN);
            return Ok(());
        }

        Err(format!("unknown selector 0x{}", hex::encode(head)))
    }

    fn move_native(&mut self, from: Address, to: Address, amount: u128) -> Result<(), String> {
        let balance = self.native.get(&from).copied().unwrap_or_default();
        if balance < amount {
            return Err("insufficient native balance".to_owned());
        }
        self.native.insert(from, balance - amount);
        *self.native.entry(to).or_default() += amount;
        Ok(())
    }

    fn move_tokens(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), String> {
        let balance = self.tokens.get(&(token, from)).copied().unwrap_or_default();
        if balance < amount {
            return Err("ERC20InsufficientBalance".to_owned());
        }
        self.tokens.insert((token, from), balance - amount);
        *self.tokens.entry((token, to)).or_default() += amount;
        Ok(())
    }
}

fn owner_of(account: Address) -> Address {
    derived_account(account)
}

fn address_arg(value: Option<AbiValue>) -> Result<Address, String> {
    value
        .ok_or("missing address")?
        .into_address()
        .map_err(|error| error.to_string())
}

fn uint_arg(value: Option<AbiValue>) -> Result<u128, String> {
    value
        .ok_or("missing uint")?
        .into_uint()
        .map_err(|error| error.to_string())
}

#[async_trait]
impl LedgerReader for FakeLedger {
    async fn native_balance(&self, address: Address) -> AppResult<Amount> {
        self.check_read().await?;
        Ok(units(self.native(address).await))
    }

    async fn read_state(&self, contract: Address, calldata: Vec<u8>) -> AppResult<Vec<u8>> {
        self.check_read().await?;
        let state = self.state.lock().await;
        let (head, body) = calldata.split_at(4);
        let role_of = |value: Option<AbiValue>| match value {
            Some(AbiValue::FixedBytes32(bytes)) => Ok(RoleId::from_bytes(bytes)),
            _ => Err(AppError::ContractRevert("missing role".to_owned())),
        };

        if head == selector("hasRole(bytes32,address)") {
            let mut values = decode(&[AbiType::FixedBytes32, AbiType::Address], body)?.into_iter();
            let role = role_of(values.next())?;
            let account = values
                .next()
                .ok_or_else(|| AppError::ContractRevert("missing account".to_owned()))?
                .into_address()?;
            return Ok(encode(&[AbiValue::Bool(state.roles.contains(&(role, account)))]));
        }

        if head == selector("getRoleMembers(bytes32)") {
            let role = role_of(decode(&[AbiType::FixedBytes32], body)?.pop())?;
            let mut members = state
                .roles
                .iter()
                .filter(|entry| entry.0 == role && !state.unlisted_members.contains(*entry))
                .map(|(_, account)| *account)
                .collect::<Vec<_>>();
            members.sort();
            let members = members.into_iter().map(AbiValue::Address).collect();
            return Ok(encode(&[AbiValue::Array(members)]));
        }

        if head == selector("roleMetadata(bytes32,address)") {
            return Ok(encode(&[AbiValue::Bytes(Vec::new())]));
        }

        if head == selector("getAddress(address,uint256)") && contract == ACCOUNT_FACTORY {
            let owner = decode(&[AbiType::Address, AbiType::Uint], body)?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::ContractRevert("missing owner".to_owned()))?
                .into_address()?;
            return Ok(encode(&[AbiValue::Address(derived_account(owner))]));
        }

        if head == selector("getTokenAddress(address)") {
            let community = decode(&[AbiType::Address], body)?
                .pop()
                .ok_or_else(|| AppError::ContractRevert("missing community".to_owned()))?
                .into_address()?;
            let token = state
                .points_tokens
                .get(&community)
                .copied()
                .unwrap_or(Address::ZERO);
            return Ok(encode(&[AbiValue::Address(token)]));
        }

        if head == selector("getUserSBT(address)") {
            let user = decode(&[AbiType::Address], body)?
                .pop()
                .ok_or_else(|| AppError::ContractRevert("missing user".to_owned()))?
                .into_address()?;
            let member = state
                .roles
                .contains(&(RoleId::from_name(RoleId::ENDUSER), user));
            let id = if member { MEMBERSHIP_TOKEN_ID } else { 0 };
            return Ok(encode(&[AbiValue::Uint(id)]));
        }

        Err(AppError::ContractRevert(format!(
            "unsupported read 0x{}",
            hex::encode(head)
        )))
    }

    async fn code_present(&self, address: Address) -> AppResult<bool> {
        self.check_read().await?;
        Ok(self.deployed(address).await)
    }

    async fn block_number(&self) -> AppResult<u64> {
        self.check_read().await?;
        Ok(self.state.lock().await.tx_counter)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> AppResult<Amount> {
        self.check_read().await?;
        let state = self.state.lock().await;
        Ok(units(
            state.tokens.get(&(token, owner)).copied().unwrap_or_default(),
        ))
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> AppResult<Amount> {
        self.check_read().await?;
        let state = self.state.lock().await;
        Ok(units(
            state
                .allowances
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl TransactionSubmitter for FakeLedger {
    async fn submit(&self, identity: &Identity, call: &ContractCall) -> AppResult<TxHash> {
        let signer = identity.signer_address();
        let nonce = {
            let mut state = self.state.lock().await;
            if let Some(error) = state.submit_failures.pop_front() {
                return Err(error);
            }
            state.next_nonce.get(&signer).copied().unwrap_or_default()
        };

        tokio::task::yield_now().await;

        let mut state = self.state.lock().await;
        if !state.used_nonces.insert((signer, nonce)) {
            return Err(AppError::Submission(format!(
                "nonce too low: {nonce} already used by {signer}"
            )));
        }
        state.next_nonce.insert(signer, nonce + 1);
        state.tx_counter += 1;

        let mut hash = [0_u8; 32];
        hash[24..].copy_from_slice(&state.tx_counter.to_be_bytes());
        let tx_hash = TxHash::from_bytes(hash);

        let forced_revert = state.revert_label.as_deref() == Some(call.label.as_str());
        let success = !forced_revert && state.apply(signer, call).is_ok();
        let receipt = Receipt {
            tx_hash,
            block_number: state.tx_counter,
            success,
        };
        state.receipts.insert(tx_hash, (call.label.clone(), receipt));
        state.submissions.push(Submission {
            signer,
            label: call.label.clone(),
            nonce,
        });

        Ok(tx_hash)
    }

    async fn await_finalization(&self, tx_hash: TxHash) -> AppResult<Receipt> {
        let state = self.state.lock().await;
        let (label, receipt) = state
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| AppError::TimedOut(format!("{tx_hash} is unknown")))?;
        if state.timeout_label.as_deref() == Some(label.as_str()) {
            return Err(AppError::TimedOut(format!(
                "{tx_hash} not finalized before deadline"
            )));
        }
        Ok(receipt)
    }
}

/// Store keeping state in memory.
#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<WorkflowState>,
}

impl FakeStore {
    pub(crate) async fn records(&self) -> Vec<TransactionRecord> {
        self.state.lock().await.transactions.clone()
    }
}

#[async_trait]
impl WorkflowStateStore for FakeStore {
    async fn load(&self) -> AppResult<Vec<Identity>> {
        Ok(self.state.lock().await.identities.clone())
    }

    async fn save(&self, identities: Vec<Identity>) -> AppResult<()> {
        self.state.lock().await.identities = identities;
        Ok(())
    }

    async fn append(&self, record: TransactionRecord) -> AppResult<()> {
        self.state.lock().await.transactions.push(record);
        Ok(())
    }

    async fn record_community(&self, marker: CommunityMarker) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.community_address = Some(marker.community_address);
        state.community_token = marker.community_token;
        Ok(())
    }

    async fn snapshot(&self) -> AppResult<WorkflowState> {
        Ok(self.state.lock().await.clone())
    }

    async fn reset(&self) -> AppResult<()> {
        *self.state.lock().await = WorkflowState::default();
        Ok(())
    }
}

/// Key generator handing out sequential deterministic keys.
#[derive(Default)]
pub(crate) struct SequentialKeys {
    next: std::sync::atomic::AtomicU8,
}

impl KeyGenerator for SequentialKeys {
    fn generate(&self) -> AppResult<GeneratedKey> {
        let seed = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .wrapping_add(0x21);
        Ok(GeneratedKey {
            signing_key: key(seed),
            address: Address::from_bytes([seed; 20]),
        })
    }

    fn address_of(&self, signing_key: &SigningKeyHex) -> AppResult<Address> {
        let bytes = hex::decode(signing_key.expose().trim_start_matches("0x"))
            .map_err(|error| AppError::Validation(error.to_string()))?;
        Ok(Address::from_bytes([bytes[0]; 20]))
    }
}

/// Fully wired services over one fake ledger and store.
pub(crate) struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<FakeStore>,
    pub funder: Arc<Identity>,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        let ledger = Arc::new(FakeLedger::default());
        let funder = Arc::new(simple_identity("funder", 0xf0));
        ledger.set_native(funder.address(), 1_000_000).await;
        ledger.set_tokens(funder.address(), 1_000_000).await;

        Self {
            ledger,
            store: Arc::new(FakeStore::default()),
            funder,
        }
    }

    pub(crate) async fn store_identities(&self, identities: Vec<Identity>) {
        let _ = self.store.save(identities).await;
    }

    pub(crate) fn submitter(&self) -> Arc<dyn TransactionSubmitter> {
        Arc::new(SerializedSubmitter::new(self.ledger.clone()))
    }

    pub(crate) fn resolver(&self) -> PreconditionResolver {
        self.resolver_with(addresses())
    }

    fn resolver_with(&self, addresses: ProtocolAddresses) -> PreconditionResolver {
        PreconditionResolver::new(self.ledger.clone(), addresses, policy())
            .with_retry_policy(fast_retry())
    }

    pub(crate) fn provisioner(&self) -> Provisioner {
        self.provisioner_with(self.submitter())
    }

    fn provisioner_with(&self, submitter: Arc<dyn TransactionSubmitter>) -> Provisioner {
        Provisioner::new(
            self.ledger.clone(),
            submitter,
            self.store.clone(),
            self.funder.clone(),
        )
        .with_retry_policy(fast_retry())
    }

    pub(crate) fn orchestrator(&self) -> WorkflowOrchestrator {
        self.orchestrator_with(addresses())
    }

    pub(crate) fn orchestrator_with(&self, addresses: ProtocolAddresses) -> WorkflowOrchestrator {
        let submitter = self.submitter();
        WorkflowOrchestrator::new(
            self.store.clone(),
            self.ledger.clone(),
            submitter.clone(),
            self.resolver_with(addresses),
            self.provisioner_with(submitter),
            addresses,
        )
        .with_step_retry(fast_retry())
    }
}
