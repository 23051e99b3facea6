use super::*;

use async_trait::async_trait;
use rolegate_application::{Receipt, TransactionSubmitter};
use rolegate_core::TxHash;
use rolegate_domain::{ContractCall, Identity};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::k256_key_generator::parse_signing_key;
use crate::legacy_transaction::LegacyTransaction;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    status: Option<String>,
    block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    from: String,
    to: Option<String>,
    value: String,
    input: String,
}

impl JsonRpcLedgerClient {
    async fn submission_quantity(&self, method: &str, params: Value) -> AppResult<u128> {
        let value: String = self
            .call(method, params)
            .await
            .map_err(|failure| AppError::Submission(failure.to_string()))?;
        parse_quantity(&value).map_err(AppError::Submission)
    }

    async fn estimate_gas(&self, request: &Value, label: &str) -> AppResult<u128> {
        let value: String = self
            .call("eth_estimateGas", json!([request]))
            .await
            .map_err(|failure| match failure.revert_data() {
                Some(data) => AppError::ExecutionReverted(format!(
                    "{label} would revert: {}",
                    self.catalog.decode(&data)
                )),
                None => AppError::Submission(format!("{label} gas estimation failed: {failure}")),
            })?;
        parse_quantity(&value).map_err(AppError::Submission)
    }

    async fn final_receipt(&self, tx_hash: TxHash) -> Result<Option<(u64, bool)>, RpcFailure> {
        let receipt: Option<RpcReceipt> = self
            .call("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;
        let Some(receipt) = receipt else {
            return Ok(None);
        };
        let Some(block) = receipt.block_number.as_deref() else {
            return Ok(None);
        };

        let block = parse_quantity(block).map_err(RpcFailure::Transport)?;
        let block = u64::try_from(block).map_err(|_| {
            RpcFailure::Transport(format!("receipt block {block} is out of range"))
        })?;
        let success = match receipt.status.as_deref() {
            Some(status) => parse_quantity(status).map_err(RpcFailure::Transport)? == 1,
            None => true,
        };

        if self.settings.confirmations > 1 {
            let head: String = self.call("eth_blockNumber", json!([])).await?;
            let head = parse_quantity(&head).map_err(RpcFailure::Transport)?;
            let required = u128::from(block) + u128::from(self.settings.confirmations) - 1;
            if head < required {
                return Ok(None);
            }
        }

        Ok(Some((block, success)))
    }

    /// Re-executes a reverted transaction at its block to recover the revert reason.
    async fn replay_revert(&self, tx_hash: TxHash, block: u64) -> String {
        let transaction: Option<RpcTransaction> = match self
            .call("eth_getTransactionByHash", json!([tx_hash.to_string()]))
            .await
        {
            Ok(transaction) => transaction,
            Err(failure) => return format!("revert reason unavailable: {failure}"),
        };
        let Some(transaction) = transaction else {
            return "revert reason unavailable: transaction not found".to_owned();
        };

        let replay = self
            .call::<String>(
                "eth_call",
                json!([
                    {
                        "from": transaction.from,
                        "to": transaction.to,
                        "value": transaction.value,
                        "data": transaction.input,
                    },
                    quantity(u128::from(block))
                ]),
            )
            .await;

        match replay {
            Ok(_) => "reverted on chain, replay succeeded".to_owned(),
            Err(failure) => match failure.revert_data() {
                Some(data) => self.catalog.decode(&data).to_string(),
                None => format!("revert reason unavailable: {failure}"),
            },
        }
    }
}

#[async_trait]
impl TransactionSubmitter for JsonRpcLedgerClient {
    async fn submit(&self, identity: &Identity, call: &ContractCall) -> AppResult<TxHash> {
        let key = parse_signing_key(identity.signing_key())?;
        let from = identity.signer_address();
        let request = json!({
            "from": from.to_string(),
            "to": call.to.to_string(),
            "value": quantity(call.value.base_units()),
            "data": data_hex(&call.data),
        });

        let (nonce, gas_price, estimate) = tokio::try_join!(
            self.submission_quantity(
                "eth_getTransactionCount",
                json!([from.to_string(), "pending"])
            ),
            self.submission_quantity("eth_gasPrice", json!([])),
            self.estimate_gas(&request, &call.label),
        )?;

        let headroom = u128::from(100 + self.settings.gas_headroom_percent);
        let gas_limit = u64::try_from(estimate.saturating_mul(headroom) / 100)
            .map_err(|_| AppError::Submission(format!("gas estimate {estimate} is out of range")))?;
        let nonce = u64::try_from(nonce)
            .map_err(|_| AppError::Submission(format!("nonce {nonce} is out of range")))?;

        let signed = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: call.to,
            value: call.value.base_units(),
            data: call.data.clone(),
            chain_id: self.settings.chain_id,
        }
        .sign(&key)?;

        let returned: String = self
            .call("eth_sendRawTransaction", json!([data_hex(&signed.raw)]))
            .await
            .map_err(|failure| {
                AppError::Submission(format!("{} broadcast rejected: {failure}", call.label))
            })?;
        if returned.parse::<TxHash>().ok() != Some(signed.hash) {
            warn!(returned = %returned, expected = %signed.hash, "node reported a different transaction hash");
        }

        info!(
            signer = %from,
            nonce,
            gas_limit,
            tx_hash = %signed.hash,
            label = %call.label,
            "broadcast transaction"
        );
        Ok(signed.hash)
    }

    async fn await_finalization(&self, tx_hash: TxHash) -> AppResult<Receipt> {
        let deadline = Instant::now() + self.settings.finalization_timeout;

        loop {
            match self.final_receipt(tx_hash).await {
                Ok(Some((block_number, true))) => {
                    debug!(tx_hash = %tx_hash, block_number, "transaction finalized");
                    return Ok(Receipt {
                        tx_hash,
                        block_number,
                        success: true,
                    });
                }
                Ok(Some((block_number, false))) => {
                    let reason = self.replay_revert(tx_hash, block_number).await;
                    return Err(AppError::ExecutionReverted(format!(
                        "{tx_hash} reverted in block {block_number}: {reason}"
                    )));
                }
                Ok(None) => {}
                Err(failure) => {
                    debug!(tx_hash = %tx_hash, error = %failure, "receipt poll failed");
                }
            }

            if Instant::now() + self.settings.poll_interval > deadline {
                return Err(AppError::TimedOut(format!(
                    "{tx_hash} not finalized within {}s",
                    self.settings.finalization_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
