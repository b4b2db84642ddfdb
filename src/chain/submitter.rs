//! Report transaction submission: fee computation, gas estimation, EIP-1559
//! send, bounded receipt polling and failure classification.
//!
//! One call = one attempt. There is **no built-in retry**; callers must go
//! through the lifecycle store before re-invoking (the `SENDING`
//! crash-recovery rule makes re-invocation safe). The receipt poll is the
//! only wait loop and is bounded by `attempts × interval`; dropping the
//! future cancels it, which is how a shutting-down host interrupts an
//! in-flight submission.

use std::time::Duration;

use num_bigint::BigUint;
use tracing::debug;

use crate::chain::abi;
use crate::chain::encode::Eip1559Tx;
use crate::chain::rpc::{CallRequest, EvmRpcClient, TxReceipt};
use crate::config::{HubConfig, DEFAULT_CHAIN_ID};
use crate::error::{prefer_domain_token, Error, Result};
use crate::report::payload::ReportPayload;
use crate::types::{Address, ChainId};
use crate::utils::bytes::hex_prefixed;
use crate::wallet::HubWallet;

/// Submits `addReport` transactions to the UEM contract.
pub struct TransactionSubmitter {
    rpc: EvmRpcClient,
    contract: Address,
    chain_id: ChainId,
    token_decimals: u32,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl TransactionSubmitter {
    pub fn new(rpc: EvmRpcClient, config: &HubConfig) -> Self {
        Self {
            rpc,
            contract: config.uem_contract_address.clone(),
            chain_id: config.chain_id,
            token_decimals: config.reward_token_decimals,
            poll_attempts: config.receipt_poll_attempts,
            poll_interval: config.receipt_poll_interval,
        }
    }

    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let rpc = EvmRpcClient::builder(&config.rpc_url)?
            .timeout(config.http_timeout)
            .connect_timeout(config.http_connect_timeout)
            .pool_max_idle(config.http_pool_max_idle)
            .build()?;
        Ok(Self::new(rpc, config))
    }

    /// Submit one report; returns the network-assigned report id.
    pub async fn submit(&self, payload: &ReportPayload, wallet: &HubWallet) -> Result<u64> {
        let data = abi::encode_add_report(payload, self.token_decimals)?;
        let chain_id = self.resolve_chain_id().await;
        let from = wallet.address().to_string();

        // EIP-1559 fees: node-suggested tip, max fee covers a base-fee
        // doubling on top of it.
        let priority = self.rpc.max_priority_fee_per_gas().await.map_err(prefer_domain_token)?;
        let base_fee = self.rpc.latest_base_fee().await.map_err(prefer_domain_token)?;
        let max_fee = &base_fee * 2u32 + &priority;
        let nonce = self
            .rpc
            .transaction_count_pending(&from)
            .await
            .map_err(prefer_domain_token)?;

        // Dry run. The node's revert message travels back verbatim; a domain
        // token in it wins over the generic wrapper.
        let call = CallRequest {
            from: from.clone(),
            to: self.contract.clone(),
            data: hex_prefixed(&data),
        };
        let estimated = self
            .rpc
            .estimate_gas(&call)
            .await
            .map_err(map_estimation_error)?;
        let gas_limit = apply_gas_safety_factor(&estimated);
        debug!(
            nonce,
            estimated = %estimated,
            gas_limit = %gas_limit,
            max_fee = %max_fee,
            "report transaction prepared"
        );

        let tx = Eip1559Tx {
            chain_id,
            nonce,
            max_priority_fee_per_gas: priority,
            max_fee_per_gas: max_fee,
            gas_limit,
            to: crate::address::to_fixed_bytes(&self.contract)?,
            value: BigUint::default(),
            data,
        };
        let raw = tx.sign(wallet.signing_key())?;
        let tx_hash = self
            .rpc
            .send_raw_transaction(&raw)
            .await
            .map_err(prefer_domain_token)?;
        debug!(%tx_hash, "report transaction broadcast");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if !receipt.is_ok() {
            return Err(classify_receipt_failure(&receipt));
        }
        match abi::extract_report_sent(&receipt.logs, &self.contract)? {
            Some(event) => Ok(event.report_id),
            None => Err(Error::ReportIdNotFound(tx_hash)),
        }
    }

    /// Poll for the receipt, bounded attempts at a fixed interval.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt> {
        for attempt in 0..self.poll_attempts {
            if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if attempt + 1 < self.poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Err(Error::ReceiptTimeout(tx_hash.to_string()))
    }

    async fn resolve_chain_id(&self) -> ChainId {
        if self.chain_id != 0 {
            return self.chain_id;
        }
        match self.rpc.chain_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "chain id query failed, using default");
                DEFAULT_CHAIN_ID
            }
        }
    }
}

/// estimated × 1.2, in integer arithmetic.
fn apply_gas_safety_factor(estimated: &BigUint) -> BigUint {
    estimated * 12u32 / 10u32
}

/// Estimation failures keep the node's own words: the `data` field when it is
/// a string (revert payloads and custom tokens live there), the message
/// otherwise. A domain token anywhere takes precedence.
fn map_estimation_error(err: Error) -> Error {
    if let Some(token) = err.domain_token() {
        return Error::domain(token);
    }
    match err {
        Error::Rpc(obj) => Error::EstimationFailed(obj.preferred_message()),
        other => other,
    }
}

/// Mined-but-failed classification ladder: structured revert reason, then raw
/// status code, then generic. Domain tokens win at every rung.
fn classify_receipt_failure(receipt: &TxReceipt) -> Error {
    if let Some(reason) = receipt.revert_reason.as_deref().filter(|r| !r.trim().is_empty()) {
        return prefer_domain_token(Error::TransactionFailed(reason.to_string()));
    }
    if let Some(status) = receipt.status.as_deref().filter(|s| !s.trim().is_empty()) {
        return prefer_domain_token(Error::TransactionFailed(format!(
            "transaction {} mined with status {}",
            receipt.transaction_hash, status
        )));
    }
    Error::TransactionFailed(format!("transaction {} failed", receipt.transaction_hash))
}
