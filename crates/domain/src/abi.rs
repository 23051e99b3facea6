use rolegate_core::{Address, AppError, AppResult};
use sha3::{Digest, Keccak256};

/// Computes the keccak-256 digest of arbitrary bytes.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Returns the 4-byte selector for a canonical function or error signature.
#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// ABI parameter type used when decoding return data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    /// `address`
    Address,
    /// `uint256`, saturated into `u128`.
    Uint,
    /// `bool`
    Bool,
    /// `bytes32`
    FixedBytes32,
    /// `bytes`
    Bytes,
    /// `string`
    String,
    /// `T[]`
    Array(Box<AbiType>),
    /// `(T1, T2, ...)`
    Tuple(Vec<AbiType>),
}

impl AbiType {
    fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::Tuple(members) => members.iter().any(Self::is_dynamic),
            Self::Address | Self::Uint | Self::Bool | Self::FixedBytes32 => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            Self::Tuple(members) if !self.is_dynamic() => {
                members.iter().map(Self::head_size).sum()
            }
            _ => 32,
        }
    }
}

/// ABI value used for call encoding and decoded return data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    /// `address`
    Address(Address),
    /// `uint256`
    Uint(u128),
    /// `bool`
    Bool(bool),
    /// `bytes32`
    FixedBytes32([u8; 32]),
    /// `bytes`
    Bytes(Vec<u8>),
    /// `string`
    String(String),
    /// `T[]`
    Array(Vec<AbiValue>),
    /// `(T1, T2, ...)`
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes(_) | Self::String(_) | Self::Array(_) => true,
            Self::Tuple(members) => members.iter().any(Self::is_dynamic),
            Self::Address(_) | Self::Uint(_) | Self::Bool(_) | Self::FixedBytes32(_) => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            Self::Tuple(members) if !self.is_dynamic() => {
                members.iter().map(Self::head_size).sum()
            }
            _ => 32,
        }
    }

    /// Returns the address payload.
    pub fn into_address(self) -> AppResult<Address> {
        match self {
            Self::Address(value) => Ok(value),
            other => Err(unexpected("address", &other)),
        }
    }

    /// Returns the integer payload.
    pub fn into_uint(self) -> AppResult<u128> {
        match self {
            Self::Uint(value) => Ok(value),
            other => Err(unexpected("uint256", &other)),
        }
    }

    /// Returns the boolean payload.
    pub fn into_bool(self) -> AppResult<bool> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(unexpected("bool", &other)),
        }
    }

    /// Returns the byte payload.
    pub fn into_bytes(self) -> AppResult<Vec<u8>> {
        match self {
            Self::Bytes(value) => Ok(value),
            other => Err(unexpected("bytes", &other)),
        }
    }

    /// Returns the string payload.
    pub fn into_string(self) -> AppResult<String> {
        match self {
            Self::String(value) => Ok(value),
            other => Err(unexpected("string", &other)),
        }
    }

    /// Returns array or tuple members.
    pub fn into_members(self) -> AppResult<Vec<AbiValue>> {
        match self {
            Self::Array(values) | Self::Tuple(values) => Ok(values),
            other => Err(unexpected("array or tuple", &other)),
        }
    }
}

fn unexpected(expected: &str, actual: &AbiValue) -> AppError {
    AppError::ContractRevert(format!(
        "malformed ABI data: expected {expected}, decoded {actual:?}"
    ))
}

/// Encodes a function call: selector followed by ABI-encoded arguments.
#[must_use]
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode(args));
    data
}

/// ABI-encodes a parameter list.
#[must_use]
pub fn encode(values: &[AbiValue]) -> Vec<u8> {
    let heads_len: usize = values.iter().map(AbiValue::head_size).sum();
    let mut heads = Vec::with_capacity(heads_len);
    let mut tail = Vec::new();

    for value in values {
        if value.is_dynamic() {
            heads.extend(uint_word((heads_len + tail.len()) as u128));
            tail.extend(encode_value(value));
        } else {
            heads.extend(encode_value(value));
        }
    }

    heads.extend(tail);
    heads
}

fn encode_value(value: &AbiValue) -> Vec<u8> {
    match value {
        AbiValue::Address(address) => {
            let mut word = [0_u8; 32];
            word[12..].copy_from_slice(address.as_bytes());
            word.to_vec()
        }
        AbiValue::Uint(number) => uint_word(*number).to_vec(),
        AbiValue::Bool(flag) => uint_word(u128::from(*flag)).to_vec(),
        AbiValue::FixedBytes32(bytes) => bytes.to_vec(),
        AbiValue::Bytes(bytes) => encode_packed_bytes(bytes),
        AbiValue::String(text) => encode_packed_bytes(text.as_bytes()),
        AbiValue::Array(items) => {
            let mut encoded = uint_word(items.len() as u128).to_vec();
            encoded.extend(encode(items));
            encoded
        }
        AbiValue::Tuple(members) => encode(members),
    }
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut encoded = uint_word(bytes.len() as u128).to_vec();
    encoded.extend_from_slice(bytes);
    let padding = (32 - bytes.len() % 32) % 32;
    encoded.extend(std::iter::repeat_n(0_u8, padding));
    encoded
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0_u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decodes ABI-encoded return data against the expected parameter types.
pub fn decode(types: &[AbiType], data: &[u8]) -> AppResult<Vec<AbiValue>> {
    let mut values = Vec::with_capacity(types.len());
    let mut cursor = 0_usize;

    for ty in types {
        if ty.is_dynamic() {
            let offset = read_offset(data, cursor)?;
            let start = data
                .get(offset..)
                .ok_or_else(|| out_of_bounds(offset, data.len()))?;
            values.push(decode_dynamic(ty, start)?);
        } else {
            let end = cursor + ty.head_size();
            let slice = data
                .get(cursor..end)
                .ok_or_else(|| out_of_bounds(end, data.len()))?;
            values.push(decode_static(ty, slice)?);
        }
        cursor += ty.head_size();
    }

    Ok(values)
}

/// Decodes return data holding exactly one value.
pub fn decode_single(ty: AbiType, data: &[u8]) -> AppResult<AbiValue> {
    decode(std::slice::from_ref(&ty), data)?
        .pop()
        .ok_or_else(|| AppError::ContractRevert("malformed ABI data: empty result".to_owned()))
}

fn decode_static(ty: &AbiType, slice: &[u8]) -> AppResult<AbiValue> {
    match ty {
        AbiType::Address => {
            let word = word_at(slice, 0)?;
            Ok(AbiValue::Address(Address::from_word(&word)))
        }
        AbiType::Uint => Ok(AbiValue::Uint(saturating_uint(&word_at(slice, 0)?))),
        AbiType::Bool => Ok(AbiValue::Bool(word_at(slice, 0)?.iter().any(|byte| *byte != 0))),
        AbiType::FixedBytes32 => Ok(AbiValue::FixedBytes32(word_at(slice, 0)?)),
        AbiType::Tuple(members) => decode(members, slice).map(AbiValue::Tuple),
        AbiType::Bytes | AbiType::String | AbiType::Array(_) => Err(AppError::ContractRevert(
            format!("malformed ABI data: {ty:?} is not a static type"),
        )),
    }
}

fn decode_dynamic(ty: &AbiType, data: &[u8]) -> AppResult<AbiValue> {
    match ty {
        AbiType::Bytes | AbiType::String => {
            let len = read_offset(data, 0)?;
            let end = len.saturating_add(32);
            let bytes = data
                .get(32..end)
                .ok_or_else(|| out_of_bounds(end, data.len()))?
                .to_vec();
            if matches!(ty, AbiType::Bytes) {
                Ok(AbiValue::Bytes(bytes))
            } else {
                String::from_utf8(bytes).map(AbiValue::String).map_err(|error| {
                    AppError::ContractRevert(format!("malformed ABI string: {error}"))
                })
            }
        }
        AbiType::Array(inner) => {
            let len = read_offset(data, 0)?;
            let body = data.get(32..).unwrap_or_default();
            if len > body.len() / 32 {
                return Err(out_of_bounds(len.saturating_mul(32), body.len()));
            }
            let member_types = vec![(**inner).clone(); len];
            decode(&member_types, body).map(AbiValue::Array)
        }
        AbiType::Tuple(members) => decode(members, data).map(AbiValue::Tuple),
        _ => decode_static(ty, data),
    }
}

fn word_at(data: &[u8], position: usize) -> AppResult<[u8; 32]> {
    let slice = data
        .get(position..position + 32)
        .ok_or_else(|| out_of_bounds(position + 32, data.len()))?;
    let mut word = [0_u8; 32];
    word.copy_from_slice(slice);
    Ok(word)
}

fn read_offset(data: &[u8], position: usize) -> AppResult<usize> {
    let word = word_at(data, position)?;
    if word[..24].iter().any(|byte| *byte != 0) {
        return Err(AppError::ContractRevert(
            "malformed ABI data: offset out of range".to_owned(),
        ));
    }
    let mut tail = [0_u8; 8];
    tail.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(tail))
        .map_err(|_| AppError::ContractRevert("malformed ABI data: offset overflow".to_owned()))
}

fn saturating_uint(word: &[u8; 32]) -> u128 {
    if word[..16].iter().any(|byte| *byte != 0) {
        return u128::MAX;
    }
    let mut low = [0_u8; 16];
    low.copy_from_slice(&word[16..]);
    u128::from_be_bytes(low)
}

fn out_of_bounds(needed: usize, available: usize) -> AppError {
    AppError::ContractRevert(format!(
        "malformed ABI data: needed {needed} bytes, got {available}"
    ))
}
