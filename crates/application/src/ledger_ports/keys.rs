use rolegate_core::{Address, AppResult};
use rolegate_domain::SigningKeyHex;

/// Freshly generated key pair.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    /// Private key.
    pub signing_key: SigningKeyHex,
    /// Address controlled by the key.
    pub address: Address,
}

/// Port for creating and inspecting signing keys.
pub trait KeyGenerator: Send + Sync {
    /// Generates a random key.
    fn generate(&self) -> AppResult<GeneratedKey>;

    /// Derives the address controlled by a key.
    fn address_of(&self, signing_key: &SigningKeyHex) -> AppResult<Address>;
}
