use super::*;

use async_trait::async_trait;
use rolegate_application::LedgerReader;
use rolegate_core::{Address, Amount};

#[async_trait]
impl LedgerReader for JsonRpcLedgerClient {
    async fn native_balance(&self, address: Address) -> AppResult<Amount> {
        let value: String = self
            .call("eth_getBalance", json!([address.to_string(), "latest"]))
            .await
            .map_err(|failure| self.read_error(failure))?;
        parse_quantity(&value)
            .map(Amount::from_base_units)
            .map_err(AppError::TransientRead)
    }

    async fn read_state(&self, contract: Address, calldata: Vec<u8>) -> AppResult<Vec<u8>> {
        let value: String = self
            .call(
                "eth_call",
                json!([
                    {
                        "to": contract.to_string(),
                        "data": data_hex(&calldata),
                    },
                    "latest"
                ]),
            )
            .await
            .map_err(|failure| self.read_error(failure))?;
        parse_data(&value).map_err(AppError::TransientRead)
    }

    async fn code_present(&self, address: Address) -> AppResult<bool> {
        let value: String = self
            .call("eth_getCode", json!([address.to_string(), "latest"]))
            .await
            .map_err(|failure| self.read_error(failure))?;
        Ok(!parse_data(&value)
            .map_err(AppError::TransientRead)?
            .is_empty())
    }

    async fn block_number(&self) -> AppResult<u64> {
        let value: String = self
            .call("eth_blockNumber", json!([]))
            .await
            .map_err(|failure| self.read_error(failure))?;
        let block = parse_quantity(&value).map_err(AppError::TransientRead)?;
        u64::try_from(block)
            .map_err(|_| AppError::TransientRead(format!("block number {value} is out of range")))
    }
}
