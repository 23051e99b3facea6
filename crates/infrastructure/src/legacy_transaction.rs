use k256::ecdsa::SigningKey;
use rolegate_core::{Address, AppError, AppResult, TxHash};
use rolegate_domain::abi::keccak256;

/// Pre-London transaction signed with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// Raw signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: TxHash,
}

impl LegacyTransaction {
    /// Hash signed over: `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`.
    pub(crate) fn signing_hash(&self) -> [u8; 32] {
        let mut fields = self.base_fields();
        fields.push(rlp_uint(u128::from(self.chain_id)));
        fields.push(rlp_bytes(&[]));
        fields.push(rlp_bytes(&[]));
        keccak256(&rlp_list(&fields))
    }

    pub(crate) fn sign(&self, key: &SigningKey) -> AppResult<SignedTransaction> {
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&self.signing_hash())
            .map_err(|error| AppError::Internal(format!("transaction signing failed: {error}")))?;
        let (r, s) = signature.split_bytes();
        let v = u128::from(self.chain_id)
            .saturating_mul(2)
            .saturating_add(35)
            .saturating_add(u128::from(recovery_id.to_byte()));

        let mut fields = self.base_fields();
        fields.push(rlp_uint(v));
        fields.push(rlp_bytes(trim_leading_zeros(&r)));
        fields.push(rlp_bytes(trim_leading_zeros(&s)));
        let raw = rlp_list(&fields);
        let hash = TxHash::from_bytes(keccak256(&raw));

        Ok(SignedTransaction { raw, hash })
    }

    fn base_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp_uint(u128::from(self.nonce)),
            rlp_uint(self.gas_price),
            rlp_uint(u128::from(self.gas_limit)),
            rlp_bytes(self.to.as_bytes()),
            rlp_uint(self.value),
            rlp_bytes(&self.data),
        ]
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn rlp_uint(value: u128) -> Vec<u8> {
    rlp_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

fn rlp_bytes(bytes: &[u8]) -> Vec<u8> {
    if let [single] = bytes
        && *single < 0x80
    {
        return vec![*single];
    }

    let mut encoded = length_prefix(0x80, bytes.len());
    encoded.extend_from_slice(bytes);
    encoded
}

fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload = items.concat();
    let mut encoded = length_prefix(0xc0, payload.len());
    encoded.extend(payload);
    encoded
}

fn length_prefix(offset: u8, length: usize) -> Vec<u8> {
    if length < 56 {
        // Lengths below 56 fit in the prefix byte itself.
        return vec![offset + length as u8];
    }

    let length_bytes = trim_leading_zeros(&length.to_be_bytes()).to_vec();
    let mut prefix = vec![offset + 55 + length_bytes.len() as u8];
    prefix.extend(length_bytes);
    prefix
}
