use async_trait::async_trait;
use rolegate_core::{Address, Amount, AppResult};
use rolegate_domain::protocol::erc20;

/// Read-only port over remote ledger state.
///
/// Transport failures surface as `AppError::TransientRead`, rejected queries as
/// `AppError::ContractRevert`.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Returns the native balance of an address.
    async fn native_balance(&self, address: Address) -> AppResult<Amount>;

    /// Executes a read-only contract call and returns the raw return data.
    async fn read_state(&self, contract: Address, calldata: Vec<u8>) -> AppResult<Vec<u8>>;

    /// Returns whether bytecode is deployed at an address.
    async fn code_present(&self, address: Address) -> AppResult<bool>;

    /// Returns the latest block number.
    async fn block_number(&self) -> AppResult<u64>;

    /// Returns the ERC-20 balance of `owner`.
    async fn token_balance(&self, token: Address, owner: Address) -> AppResult<Amount> {
        let data = self.read_state(token, erc20::balance_of(owner)).await?;
        erc20::decode_amount(&data)
    }

    /// Returns the ERC-20 allowance `owner` granted to `spender`.
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> AppResult<Amount> {
        let data = self.read_state(token, erc20::allowance(owner, spender)).await?;
        erc20::decode_amount(&data)
    }
}
