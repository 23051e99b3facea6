use std::collections::HashMap;

use crate::abi::{AbiType, decode, selector};

const ERROR_STRING_SIGNATURE: &str = "Error(string)";
const PANIC_SIGNATURE: &str = "Panic(uint256)";

/// Custom error signatures emitted by the registry, staking, SBT and ERC-20 contracts.
const KNOWN_ERRORS: &[&str] = &[
    "InvalidParameter(string)",
    "RoleNotConfigured(bytes32,bool)",
    "RoleAlreadyGranted(bytes32,address)",
    "RoleNotGranted(bytes32,address)",
    "InsufficientStake(uint256,uint256)",
    "StakeAlreadyExists(address,bytes32)",
    "InsufficientAllowance(uint256,uint256)",
    "InsufficientBalance(uint256,uint256)",
    "TransferFailed()",
    "StakeNotFound()",
    "TokenIdAlreadyMinted(uint256)",
    "AlreadyMinted(address,bytes32)",
    "Unauthorized()",
    "NotFound()",
    "AlreadyExists()",
    "PaymasterNotFound(address)",
    "ERC20InsufficientBalance(address,uint256,uint256)",
    "ERC20InvalidSender(address)",
    "ERC20InvalidReceiver(address)",
    "ERC20InsufficientAllowance(address,uint256,uint256)",
    "ERC20InvalidApprover(address)",
    "ERC20InvalidSpender(address)",
    "AccessControlUnauthorizedAccount(address,bytes32)",
    "OwnableUnauthorizedAccount(address)",
    "SafeERC20FailedOperation(address)",
    "RoleMemberLimitReached(bytes32)",
    "NameAlreadyRegistered(string)",
    "ENSAlreadyRegistered(string)",
];

/// Decoded reason behind a revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    /// `require(cond, "message")` style revert.
    Message(String),
    /// Compiler-inserted panic with its code.
    Panic(u128),
    /// Custom error whose selector is in the catalog.
    Custom {
        /// Error name without parameters.
        name: String,
        /// Full canonical signature.
        signature: String,
    },
    /// Selector not present in the catalog.
    Unknown {
        /// Hex-encoded 4-byte selector.
        selector: String,
    },
    /// Revert without return data.
    Empty,
}

impl std::fmt::Display for RevertReason {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => write!(formatter, "{message}"),
            Self::Panic(code) => write!(formatter, "panic code 0x{code:x}"),
            Self::Custom { signature, .. } => write!(formatter, "{signature}"),
            Self::Unknown { selector } => write!(formatter, "unknown error selector 0x{selector}"),
            Self::Empty => write!(formatter, "reverted without reason"),
        }
    }
}

/// Selector-to-signature lookup for contract revert data.
#[derive(Debug, Clone)]
pub struct RevertCatalog {
    by_selector: HashMap<[u8; 4], &'static str>,
}

impl Default for RevertCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl RevertCatalog {
    /// Builds the catalog of known protocol error signatures.
    #[must_use]
    pub fn new() -> Self {
        let by_selector = KNOWN_ERRORS
            .iter()
            .map(|signature| (selector(signature), *signature))
            .collect();
        Self { by_selector }
    }

    /// Decodes raw revert data into a structured reason.
    #[must_use]
    pub fn decode(&self, data: &[u8]) -> RevertReason {
        let Some(head) = data.get(..4) else {
            return RevertReason::Empty;
        };
        let mut code = [0_u8; 4];
        code.copy_from_slice(head);
        let body = &data[4..];

        if code == selector(ERROR_STRING_SIGNATURE) {
            return decode(&[AbiType::String], body)
                .ok()
                .and_then(|mut values| values.pop())
                .and_then(|value| value.into_string().ok())
                .map_or_else(
                    || RevertReason::Unknown {
                        selector: hex::encode(code),
                    },
                    RevertReason::Message,
                );
        }

        if code == selector(PANIC_SIGNATURE) {
            return decode(&[AbiType::Uint], body)
                .ok()
                .and_then(|mut values| values.pop())
                .and_then(|value| value.into_uint().ok())
                .map_or_else(
                    || RevertReason::Unknown {
                        selector: hex::encode(code),
                    },
                    RevertReason::Panic,
                );
        }

        match self.by_selector.get(&code) {
            Some(signature) => RevertReason::Custom {
                name: signature
                    .split_once('(')
                    .map_or(*signature, |(name, _)| name)
                    .to_owned(),
                signature: (*signature).to_owned(),
            },
            None => RevertReason::Unknown {
                selector: hex::encode(code),
            },
        }
    }
}
