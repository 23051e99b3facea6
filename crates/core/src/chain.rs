use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// A 20-byte ledger account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0; 20]);

    /// Creates an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an address from the trailing 20 bytes of a 32-byte word.
    #[must_use]
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut bytes = [0_u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true for the all-zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }
}

impl FromStr for Address {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        let bytes = decode_prefixed_hex(value, 20, "address")?;
        let mut address = [0_u8; 20];
        address.copy_from_slice(&bytes);
        Ok(Self(address))
    }
}

impl TryFrom<String> for Address {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl Display for Address {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "0x{}", hex::encode(self.0))
    }
}

/// A 32-byte transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Creates a hash from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw hash bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        let bytes = decode_prefixed_hex(value, 32, "transaction hash")?;
        let mut hash = [0_u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self(hash))
    }
}

impl TryFrom<String> for TxHash {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.to_string()
    }
}

impl Display for TxHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "0x{}", hex::encode(self.0))
    }
}

/// An unsigned quantity in the smallest unit of a resource (wei, token base units).
///
/// Serialized as a decimal string so JSON consumers never lose precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    /// Zero units.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from base units.
    #[must_use]
    pub const fn from_base_units(value: u128) -> Self {
        Self(value)
    }

    /// Returns the amount in base units.
    #[must_use]
    pub const fn base_units(&self) -> u128 {
        self.0
    }

    /// Returns true when the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Subtracts, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Parses a decimal display value such as `"0.05"` scaled by `decimals`.
    pub fn parse_units(value: &str, decimals: u32) -> AppResult<Self> {
        let value = value.trim();
        let invalid = || AppError::Validation(format!("invalid decimal amount '{value}'"));

        let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let fraction = fraction.trim_end_matches('0');
        let fraction_len = u32::try_from(fraction.len()).map_err(|_| invalid())?;
        if fraction_len > decimals {
            return Err(AppError::Validation(format!(
                "amount '{value}' has more than {decimals} decimal places"
            )));
        }

        let scale = 10_u128.checked_pow(decimals).ok_or_else(invalid)?;
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| invalid())?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = fraction.parse::<u128>().map_err(|_| invalid())?;
            padded
                .checked_mul(10_u128.pow(decimals - fraction_len))
                .ok_or_else(invalid)?
        };

        whole_units
            .checked_mul(scale)
            .and_then(|units| units.checked_add(fraction_units))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Formats the amount as a decimal display value scaled by `decimals`.
    #[must_use]
    pub fn format_units(&self, decimals: u32) -> String {
        let Some(scale) = 10_u128.checked_pow(decimals) else {
            return self.0.to_string();
        };
        let whole = self.0 / scale;
        let fraction = self.0 % scale;
        if fraction == 0 {
            return whole.to_string();
        }

        let width = decimals as usize;
        let fraction = format!("{fraction:0width$}");
        format!("{whole}.{}", fraction.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        value
            .trim()
            .parse::<u128>()
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid amount '{value}': {error}")))
    }
}

impl TryFrom<String> for Amount {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.0.to_string()
    }
}

impl Display for Amount {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

fn decode_prefixed_hex(value: &str, expected_len: usize, label: &str) -> AppResult<Vec<u8>> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(digits)
        .map_err(|error| AppError::Validation(format!("invalid {label} '{value}': {error}")))?;

    if bytes.len() != expected_len {
        return Err(AppError::Validation(format!(
            "invalid {label} '{value}': expected {expected_len} bytes, got {}",
            bytes.len()
        )));
    }

    Ok(bytes)
}
