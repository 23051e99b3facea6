use std::collections::HashSet;
use std::sync::Arc;

use rolegate_core::{Address, AppError, AppResult, NonEmptyString};
use rolegate_domain::protocol::account;
use rolegate_domain::{Identity, IdentityFlavor, IdentityView};
use tokio::sync::Mutex;
use tracing::info;

use crate::ledger_ports::{KeyGenerator, LedgerReader};
use crate::state_ports::WorkflowStateStore;

const DEFAULT_ACCOUNT_SALT: u64 = 0;

/// Creates and looks up stored identities.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn WorkflowStateStore>,
    keys: Arc<dyn KeyGenerator>,
    ledger: Arc<dyn LedgerReader>,
    account_factory: Option<Address>,
    write_lock: Arc<Mutex<()>>,
}

impl IdentityService {
    /// Creates an identity service.
    #[must_use]
    pub fn new(
        store: Arc<dyn WorkflowStateStore>,
        keys: Arc<dyn KeyGenerator>,
        ledger: Arc<dyn LedgerReader>,
    ) -> Self {
        Self {
            store,
            keys,
            ledger,
            account_factory: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Enables contract-backed identities deployed by `factory`.
    #[must_use]
    pub fn with_account_factory(mut self, factory: Address) -> Self {
        self.account_factory = Some(factory);
        self
    }

    /// Generates one identity per name with a fresh random key.
    ///
    /// Names must be unique across the request and the store.
    pub async fn generate(
        &self,
        names: Vec<String>,
        flavor: IdentityFlavor,
    ) -> AppResult<Vec<Identity>> {
        if names.is_empty() {
            return Err(AppError::Validation(
                "at least one identity name is required".to_owned(),
            ));
        }

        let names = names
            .into_iter()
            .map(|name| NonEmptyString::new(name.trim()))
            .collect::<AppResult<Vec<_>>>()?;
        let mut requested = HashSet::new();
        for name in &names {
            if !requested.insert(name.as_str().to_owned()) {
                return Err(AppError::Validation(format!(
                    "identity name '{name}' is repeated in the request"
                )));
            }
        }

        let _guard = self.write_lock.lock().await;
        let mut identities = self.store.load().await?;
        if let Some(existing) = identities
            .iter()
            .find(|identity| requested.contains(identity.name()))
        {
            return Err(AppError::Conflict(format!(
                "identity '{}' already exists",
                existing.name()
            )));
        }

        let mut created = Vec::with_capacity(names.len());
        for name in names {
            created.push(self.create(name, flavor).await?);
        }

        identities.extend(created.iter().cloned());
        self.store.save(identities).await?;
        info!(count = created.len(), ?flavor, "generated identities");

        Ok(created)
    }

    async fn create(&self, name: NonEmptyString, flavor: IdentityFlavor) -> AppResult<Identity> {
        let key = self.keys.generate()?;

        match flavor {
            IdentityFlavor::Simple => Ok(Identity::simple(name, key.address, key.signing_key)),
            IdentityFlavor::ContractBacked => {
                let factory = self.account_factory.ok_or_else(|| {
                    AppError::Validation(
                        "contract-backed identities need an account factory address".to_owned(),
                    )
                })?;
                let data = self
                    .ledger
                    .read_state(factory, account::get_address(key.address, DEFAULT_ACCOUNT_SALT))
                    .await?;
                let derived = account::decode_address(&data)?;

                Identity::contract_backed(
                    name,
                    derived,
                    key.signing_key,
                    key.address,
                    factory,
                    DEFAULT_ACCOUNT_SALT,
                )
            }
        }
    }

    /// Lists stored identities without key material.
    pub async fn list(&self) -> AppResult<Vec<IdentityView>> {
        Ok(self
            .store
            .load()
            .await?
            .iter()
            .map(Identity::public_view)
            .collect())
    }

    /// Returns all stored identities including keys.
    pub async fn all(&self) -> AppResult<Vec<Identity>> {
        self.store.load().await
    }

    /// Finds a stored identity by name.
    pub async fn find(&self, name: &str) -> AppResult<Identity> {
        self.store
            .load()
            .await?
            .into_iter()
            .find(|identity| identity.name() == name)
            .ok_or_else(|| AppError::NotFound(format!("identity '{name}' does not exist")))
    }
}
