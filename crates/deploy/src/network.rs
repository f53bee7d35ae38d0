//! Network/account provider used to create contracts.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::rpc;

/// Default JSON-RPC endpoint (a local Hardhat or Anvil node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
/// Default timeout for a single RPC request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default interval between receipt polls, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Outcome of a confirmed contract-creation transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationReceipt {
    /// Address of the created contract.
    pub address: Address,
    /// Hash of the creation transaction.
    pub tx_hash: B256,
    /// Block in which the transaction was included.
    pub block_number: u64,
    /// Gas consumed by the creation.
    pub gas_used: u64,
}

/// A network that can create contracts on behalf of a signer.
pub trait Network: Send + Sync {
    /// The chain ID of the network.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// The account that signs creation transactions.
    fn signer(&self) -> impl Future<Output = Result<Address>> + Send;

    /// Submit a contract-creation transaction and wait until it is confirmed.
    fn create_contract(
        &self,
        from: Address,
        init_code: Bytes,
    ) -> impl Future<Output = Result<CreationReceipt>> + Send;
}

/// Configuration for the JSON-RPC network provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// URL of the JSON-RPC endpoint.
    pub rpc_url: String,
    /// Signer address. Defaults to the first account exposed by the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Timeout for a single RPC request, in seconds.
    pub request_timeout_secs: u64,
    /// Interval between transaction receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum time to wait for a creation to be confirmed, in seconds.
    /// Waits indefinitely when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            from: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            confirmation_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    #[serde(deserialize_with = "rpc::deserialize_u64_from_hex")]
    block_number: u64,
    #[serde(deserialize_with = "rpc::deserialize_u64_from_hex")]
    gas_used: u64,
    contract_address: Option<Address>,
    /// Absent on pre-Byzantium receipts.
    status: Option<String>,
}

impl TransactionReceipt {
    fn into_creation_receipt(self) -> Result<CreationReceipt> {
        if let Some(status) = &self.status {
            if rpc::parse_quantity(status)? == 0 {
                anyhow::bail!(
                    "Contract creation transaction {} reverted in block {}",
                    self.transaction_hash,
                    self.block_number
                );
            }
        }

        let address = self.contract_address.with_context(|| {
            format!(
                "Receipt for transaction {} has no contract address",
                self.transaction_hash
            )
        })?;

        Ok(CreationReceipt {
            address,
            tx_hash: self.transaction_hash,
            block_number: self.block_number,
            gas_used: self.gas_used,
        })
    }
}

/// [`Network`] backed by an Ethereum JSON-RPC endpoint.
///
/// Transactions are sent with `eth_sendTransaction`, so the signer must be an account
/// managed by the node (the default for Hardhat and Anvil development nodes).
#[derive(Debug, Clone)]
pub struct JsonRpcNetwork {
    client: reqwest::Client,
    url: Url,
    from: Option<Address>,
    poll_interval: Duration,
    confirmation_timeout: Option<Duration>,
}

impl JsonRpcNetwork {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let url = Url::parse(&config.rpc_url)
            .with_context(|| format!("Invalid RPC URL '{}'", config.rpc_url))?;

        Ok(Self {
            client: rpc::create_client(Duration::from_secs(config.request_timeout_secs))?,
            url,
            from: config.from,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            confirmation_timeout: config.confirmation_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let client = &self.client;
        let url = self.url.as_str();

        rpc::poll_until(
            "transaction receipt",
            self.poll_interval,
            self.confirmation_timeout,
            || async move {
                rpc::json_rpc_call::<Option<TransactionReceipt>>(
                    client,
                    url,
                    "eth_getTransactionReceipt",
                    vec![serde_json::json!(tx_hash)],
                )
                .await
            },
        )
        .await
        .with_context(|| format!("Failed to confirm transaction {}", tx_hash))
    }
}

impl Network for JsonRpcNetwork {
    async fn chain_id(&self) -> Result<u64> {
        let chain_id: String =
            rpc::json_rpc_call(&self.client, self.url.as_str(), "eth_chainId", vec![])
                .await
                .context("Failed to fetch chain ID")?;
        rpc::parse_quantity(&chain_id).context("Invalid chain ID returned by provider")
    }

    async fn signer(&self) -> Result<Address> {
        if let Some(from) = self.from {
            return Ok(from);
        }

        let accounts: Vec<Address> =
            rpc::json_rpc_call(&self.client, self.url.as_str(), "eth_accounts", vec![])
                .await
                .context("Failed to fetch accounts from provider")?;

        accounts.into_iter().next().context(
            "Provider exposes no accounts; unlock an account on the node or set `network.from`",
        )
    }

    async fn create_contract(&self, from: Address, init_code: Bytes) -> Result<CreationReceipt> {
        let tx_hash: B256 = rpc::json_rpc_call(
            &self.client,
            self.url.as_str(),
            "eth_sendTransaction",
            vec![serde_json::json!({
                "from": from,
                "data": init_code,
            })],
        )
        .await
        .context("Contract creation transaction was rejected")?;

        tracing::debug!(%tx_hash, %from, "Contract creation transaction sent, waiting for receipt...");

        self.wait_for_receipt(tx_hash).await?.into_creation_receipt()
    }
}
