//! Call encoders and return decoders for the contracts the onboarding
//! workflows touch. Only signatures live here; contract rules stay on-chain.

use rolegate_core::{Address, Amount, AppResult};
use serde::{Deserialize, Serialize};

use crate::abi::{AbiType, AbiValue, decode, decode_single, encode_call};

/// A state-changing call ready for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Call target.
    pub to: Address,
    /// Native value attached to the call.
    pub value: Amount,
    /// ABI-encoded calldata.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Human label recorded in transaction history.
    pub label: String,
}

impl ContractCall {
    /// Creates a plain native-currency transfer.
    #[must_use]
    pub fn native_transfer(to: Address, value: Amount) -> Self {
        Self {
            to,
            value,
            data: Vec::new(),
            label: "native transfer".to_owned(),
        }
    }
}

/// ERC-20 token calls.
pub mod erc20 {
    use super::*;

    /// `balanceOf(address)` calldata.
    #[must_use]
    pub fn balance_of(owner: Address) -> Vec<u8> {
        encode_call("balanceOf(address)", &[AbiValue::Address(owner)])
    }

    /// `allowance(address,address)` calldata.
    #[must_use]
    pub fn allowance(owner: Address, spender: Address) -> Vec<u8> {
        encode_call(
            "allowance(address,address)",
            &[AbiValue::Address(owner), AbiValue::Address(spender)],
        )
    }

    /// `transfer(address,uint256)` call.
    #[must_use]
    pub fn transfer(token: Address, recipient: Address, amount: Amount) -> ContractCall {
        ContractCall {
            to: token,
            value: Amount::ZERO,
            data: encode_call(
                "transfer(address,uint256)",
                &[
                    AbiValue::Address(recipient),
                    AbiValue::Uint(amount.base_units()),
                ],
            ),
            label: "token transfer".to_owned(),
        }
    }

    /// `approve(address,uint256)` call.
    #[must_use]
    pub fn approve(token: Address, spender: Address, amount: Amount) -> ContractCall {
        ContractCall {
            to: token,
            value: Amount::ZERO,
            data: encode_call(
                "approve(address,uint256)",
                &[
                    AbiValue::Address(spender),
                    AbiValue::Uint(amount.base_units()),
                ],
            ),
            label: "token approval".to_owned(),
        }
    }

    /// Decodes a `uint256` amount result.
    pub fn decode_amount(data: &[u8]) -> AppResult<Amount> {
        decode_single(AbiType::Uint, data)?
            .into_uint()
            .map(Amount::from_base_units)
    }
}

/// Role registry calls.
pub mod registry {
    use crate::role::{RoleConfig, RoleId};

    use super::*;

    /// `hasRole(bytes32,address)` calldata.
    #[must_use]
    pub fn has_role(role: RoleId, account: Address) -> Vec<u8> {
        encode_call(
            "hasRole(bytes32,address)",
            &[
                AbiValue::FixedBytes32(*role.as_bytes()),
                AbiValue::Address(account),
            ],
        )
    }

    /// `getRoleMembers(bytes32)` calldata.
    #[must_use]
    pub fn get_role_members(role: RoleId) -> Vec<u8> {
        encode_call(
            "getRoleMembers(bytes32)",
            &[AbiValue::FixedBytes32(*role.as_bytes())],
        )
    }

    /// `getRoleConfig(bytes32)` calldata.
    #[must_use]
    pub fn get_role_config(role: RoleId) -> Vec<u8> {
        encode_call(
            "getRoleConfig(bytes32)",
            &[AbiValue::FixedBytes32(*role.as_bytes())],
        )
    }

    /// `roleMetadata(bytes32,address)` calldata.
    #[must_use]
    pub fn role_metadata(role: RoleId, account: Address) -> Vec<u8> {
        encode_call(
            "roleMetadata(bytes32,address)",
            &[
                AbiValue::FixedBytes32(*role.as_bytes()),
                AbiValue::Address(account),
            ],
        )
    }

    /// `registerRole(bytes32,address,bytes)` call.
    #[must_use]
    pub fn register_role(
        registry: Address,
        role: RoleId,
        account: Address,
        role_data: Vec<u8>,
    ) -> ContractCall {
        ContractCall {
            to: registry,
            value: Amount::ZERO,
            data: encode_call(
                "registerRole(bytes32,address,bytes)",
                &[
                    AbiValue::FixedBytes32(*role.as_bytes()),
                    AbiValue::Address(account),
                    AbiValue::Bytes(role_data),
                ],
            ),
            label: "register role".to_owned(),
        }
    }

    /// Decodes a boolean result.
    pub fn decode_bool(data: &[u8]) -> AppResult<bool> {
        decode_single(AbiType::Bool, data)?.into_bool()
    }

    /// Decodes an `address[]` result.
    pub fn decode_members(data: &[u8]) -> AppResult<Vec<Address>> {
        decode_single(AbiType::Array(Box::new(AbiType::Address)), data)?
            .into_members()?
            .into_iter()
            .map(AbiValue::into_address)
            .collect()
    }

    /// Decodes a `bytes` result.
    pub fn decode_bytes(data: &[u8]) -> AppResult<Vec<u8>> {
        decode_single(AbiType::Bytes, data)?.into_bytes()
    }

    /// Decodes the `(entryBurn, exitBurn, lockDuration, isActive)` prefix of a role config.
    pub fn decode_role_config(data: &[u8]) -> AppResult<RoleConfig> {
        let mut values = decode(
            &[AbiType::Uint, AbiType::Uint, AbiType::Uint, AbiType::Bool],
            data,
        )?
        .into_iter();
        let mut next = || {
            values.next().ok_or_else(|| {
                rolegate_core::AppError::ContractRevert("role config is truncated".to_owned())
            })
        };

        Ok(RoleConfig {
            entry_burn: Amount::from_base_units(next()?.into_uint()?),
            exit_burn: Amount::from_base_units(next()?.into_uint()?),
            lock_duration: next()?.into_uint()?,
            is_active: next()?.into_bool()?,
        })
    }
}

/// Deterministic smart-account factory and account calls.
pub mod account {
    use super::*;

    /// `getAddress(address,uint256)` calldata.
    #[must_use]
    pub fn get_address(owner: Address, salt: u64) -> Vec<u8> {
        encode_call(
            "getAddress(address,uint256)",
            &[AbiValue::Address(owner), AbiValue::Uint(u128::from(salt))],
        )
    }

    /// `createAccount(address,uint256)` call.
    #[must_use]
    pub fn create_account(factory: Address, owner: Address, salt: u64) -> ContractCall {
        ContractCall {
            to: factory,
            value: Amount::ZERO,
            data: encode_call(
                "createAccount(address,uint256)",
                &[AbiValue::Address(owner), AbiValue::Uint(u128::from(salt))],
            ),
            label: "deploy account".to_owned(),
        }
    }

    /// Wraps a call in the account's `execute(address,uint256,bytes)`.
    #[must_use]
    pub fn execute(account: Address, inner: &ContractCall) -> ContractCall {
        ContractCall {
            to: account,
            value: Amount::ZERO,
            data: encode_call(
                "execute(address,uint256,bytes)",
                &[
                    AbiValue::Address(inner.to),
                    AbiValue::Uint(inner.value.base_units()),
                    AbiValue::Bytes(inner.data.clone()),
                ],
            ),
            label: inner.label.clone(),
        }
    }

    /// Decodes an `address` result.
    pub fn decode_address(data: &[u8]) -> AppResult<Address> {
        decode_single(AbiType::Address, data)?.into_address()
    }
}

/// Community points-token factory calls.
pub mod points_factory {
    use super::*;

    /// `getTokenAddress(address)` calldata.
    #[must_use]
    pub fn get_token_address(community: Address) -> Vec<u8> {
        encode_call("getTokenAddress(address)", &[AbiValue::Address(community)])
    }

    /// Exchange rate between points and gas credit, 1:1 at 18 decimals.
    pub const DEFAULT_EXCHANGE_RATE: u128 = 1_000_000_000_000_000_000;

    /// `deployxPNTsToken(string,string,string,string,uint256,address)` call.
    ///
    /// The factory binds the token to the sender, so the community
    /// administrator must send it. No paymaster is attached at launch.
    #[must_use]
    pub fn deploy_token(
        factory: Address,
        token_name: &str,
        token_symbol: &str,
        community_name: &str,
        community_ens: &str,
    ) -> ContractCall {
        ContractCall {
            to: factory,
            value: Amount::ZERO,
            data: encode_call(
                "deployxPNTsToken(string,string,string,string,uint256,address)",
                &[
                    AbiValue::String(token_name.to_owned()),
                    AbiValue::String(token_symbol.to_owned()),
                    AbiValue::String(community_name.to_owned()),
                    AbiValue::String(community_ens.to_owned()),
                    AbiValue::Uint(DEFAULT_EXCHANGE_RATE),
                    AbiValue::Address(Address::ZERO),
                ],
            ),
            label: "deploy community token".to_owned(),
        }
    }

    /// Decodes the token address; the zero address means no token exists.
    pub fn decode_token(data: &[u8]) -> AppResult<Option<Address>> {
        let token = decode_single(AbiType::Address, data)?.into_address()?;
        Ok((!token.is_zero()).then_some(token))
    }
}

/// Membership soul-bound token calls.
pub mod sbt {
    use super::*;

    /// `getUserSBT(address)` calldata.
    #[must_use]
    pub fn get_user_sbt(user: Address) -> Vec<u8> {
        encode_call("getUserSBT(address)", &[AbiValue::Address(user)])
    }

    /// Decodes the token id; zero means the user holds no token.
    pub fn decode_token_id(data: &[u8]) -> AppResult<Option<u128>> {
        let id = decode_single(AbiType::Uint, data)?.into_uint()?;
        Ok((id != 0).then_some(id))
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value = String::deserialize(deserializer)?;
        hex::decode(value.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
