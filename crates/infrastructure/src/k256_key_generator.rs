use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rolegate_application::{GeneratedKey, KeyGenerator};
use rolegate_core::{Address, AppError, AppResult};
use rolegate_domain::SigningKeyHex;
use rolegate_domain::abi::keccak256;

/// secp256k1 key generator backed by the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct K256KeyGenerator;

impl K256KeyGenerator {
    /// Creates a key generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl KeyGenerator for K256KeyGenerator {
    fn generate(&self) -> AppResult<GeneratedKey> {
        let key = SigningKey::random(&mut OsRng);
        let signing_key = SigningKeyHex::new(hex::encode(key.to_bytes()))?;

        Ok(GeneratedKey {
            address: address_of_key(&key),
            signing_key,
        })
    }

    fn address_of(&self, signing_key: &SigningKeyHex) -> AppResult<Address> {
        Ok(address_of_key(&parse_signing_key(signing_key)?))
    }
}

/// Loads a validated hex key into a secp256k1 signing key.
pub(crate) fn parse_signing_key(signing_key: &SigningKeyHex) -> AppResult<SigningKey> {
    let bytes = hex::decode(signing_key.expose().trim_start_matches("0x"))
        .map_err(|error| AppError::Validation(format!("invalid signing key: {error}")))?;
    SigningKey::from_slice(&bytes)
        .map_err(|_| AppError::Validation("signing key is not a valid secp256k1 scalar".to_owned()))
}

/// `keccak256(uncompressed_public_key[1..])[12..]`
pub(crate) fn address_of_key(key: &SigningKey) -> Address {
    let encoded = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_word(&hash)
}
