//! Ledger identities owned by the workflow state store.

use rolegate_core::{Address, AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::protocol::{ContractCall, account};

/// Hex-encoded secp256k1 private key.
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SigningKeyHex(String);

impl SigningKeyHex {
    /// Validates a 32-byte hex key with optional `0x` prefix.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let digits = value.trim().trim_start_matches("0x");
        let valid = digits.len() == 64 && digits.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(AppError::Validation(
                "signing key must be 32 bytes of hex".to_owned(),
            ));
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// Returns the `0x`-prefixed key.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for SigningKeyHex {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("SigningKeyHex(<redacted>)")
    }
}

impl TryFrom<String> for SigningKeyHex {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        Self::new(value)
    }
}

impl From<SigningKeyHex> for String {
    fn from(value: SigningKeyHex) -> Self {
        value.0
    }
}

/// How an identity holds its on-chain address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityKind {
    /// Externally owned account controlled directly by the key.
    Simple,
    /// Smart account deployed by a factory and controlled by an owner key.
    ContractBacked {
        /// Address of the owner key.
        owner_address: Address,
        /// Factory that deploys the account.
        factory_address: Address,
        /// Deployment salt.
        salt: u64,
    },
}

/// Requested identity flavour when generating new identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityFlavor {
    /// Plain externally owned account.
    #[default]
    Simple,
    /// Factory-deployed smart account.
    ContractBacked,
}

/// A named ledger identity with its signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    name: NonEmptyString,
    address: Address,
    #[serde(rename = "private_key")]
    signing_key: SigningKeyHex,
    #[serde(flatten)]
    kind: IdentityKind,
}

impl Identity {
    /// Creates a simple identity whose address is the key's address.
    #[must_use]
    pub fn simple(name: NonEmptyString, address: Address, signing_key: SigningKeyHex) -> Self {
        Self {
            name,
            address,
            signing_key,
            kind: IdentityKind::Simple,
        }
    }

    /// Creates a contract-backed identity at its factory-derived address.
    pub fn contract_backed(
        name: NonEmptyString,
        derived_address: Address,
        signing_key: SigningKeyHex,
        owner_address: Address,
        factory_address: Address,
        salt: u64,
    ) -> AppResult<Self> {
        if derived_address.is_zero() {
            return Err(AppError::Validation(format!(
                "factory returned the zero address for identity '{name}'"
            )));
        }

        Ok(Self {
            name,
            address: derived_address,
            signing_key,
            kind: IdentityKind::ContractBacked {
                owner_address,
                factory_address,
                salt,
            },
        })
    }

    /// Returns the identity name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the address that holds roles and tokens.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the signing key.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKeyHex {
        &self.signing_key
    }

    /// Returns the identity kind.
    #[must_use]
    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    /// Returns the address that signs and pays gas for this identity.
    #[must_use]
    pub fn signer_address(&self) -> Address {
        match self.kind {
            IdentityKind::Simple => self.address,
            IdentityKind::ContractBacked { owner_address, .. } => owner_address,
        }
    }

    /// Returns true for factory-deployed smart accounts.
    #[must_use]
    pub fn is_contract_backed(&self) -> bool {
        matches!(self.kind, IdentityKind::ContractBacked { .. })
    }

    /// Adapts a call so it executes with this identity as `msg.sender`.
    #[must_use]
    pub fn outbound_call(&self, call: &ContractCall) -> ContractCall {
        match self.kind {
            IdentityKind::Simple => call.clone(),
            IdentityKind::ContractBacked { .. } => account::execute(self.address, call),
        }
    }

    /// Returns the key-free projection shown to API callers.
    #[must_use]
    pub fn public_view(&self) -> IdentityView {
        let (owner_address, salt) = match self.kind {
            IdentityKind::Simple => (None, None),
            IdentityKind::ContractBacked {
                owner_address,
                salt,
                ..
            } => (Some(owner_address), Some(salt)),
        };

        IdentityView {
            name: self.name().to_owned(),
            address: self.address,
            flavor: if self.is_contract_backed() {
                IdentityFlavor::ContractBacked
            } else {
                IdentityFlavor::Simple
            },
            owner_address,
            salt,
        }
    }
}

/// Identity projection without key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityView {
    /// Identity name.
    pub name: String,
    /// Role-holding address.
    pub address: Address,
    /// Identity flavour.
    pub flavor: IdentityFlavor,
    /// Owner key address for contract-backed identities.
    pub owner_address: Option<Address>,
    /// Deployment salt for contract-backed identities.
    pub salt: Option<u64>,
}
