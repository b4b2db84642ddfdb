//! Engine configuration.
//!
//! Everything is explicit and injected; there is no global state and no lazy
//! initialization. Defaults match the production deployment: Polygon-class
//! chain, the public WoM endpoint, a small bounded HTTP pool sized for
//! periodic reporting load, and web3-style receipt polling bounds.

use std::time::Duration;

use crate::types::{Address, ChainId};

/// Default WoM service endpoint.
pub const DEFAULT_WOM_URL: &str = "https://wom.meeds.io";

/// Fallback chain id when the node cannot be asked (Polygon mainnet).
pub const DEFAULT_CHAIN_ID: ChainId = 137;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Base URL of the WoM REST service.
    pub wom_url: String,
    /// EVM JSON-RPC endpoint.
    pub rpc_url: String,
    /// UEM reporting contract address.
    pub uem_contract_address: Address,
    /// Target chain id; 0 means "query the node, fall back to
    /// [`DEFAULT_CHAIN_ID`] on failure".
    pub chain_id: ChainId,
    /// Decimals of the reward token, used to scale report amounts on-chain.
    pub reward_token_decimals: u32,
    /// Max pooled idle connections per host for both HTTP clients.
    pub http_pool_max_idle: usize,
    /// Overall request timeout.
    pub http_timeout: Duration,
    /// Connection establishment timeout.
    pub http_connect_timeout: Duration,
    /// Bounded receipt polling: number of attempts…
    pub receipt_poll_attempts: u32,
    /// …and the fixed interval between them.
    pub receipt_poll_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            wom_url: DEFAULT_WOM_URL.to_string(),
            rpc_url: String::new(),
            uem_contract_address: String::new(),
            chain_id: 0,
            reward_token_decimals: 18,
            http_pool_max_idle: 5,
            http_timeout: Duration::from_secs(20),
            http_connect_timeout: Duration::from_secs(10),
            receipt_poll_attempts: 40,
            receipt_poll_interval: Duration::from_secs(15),
        }
    }
}

impl HubConfig {
    pub fn new(rpc_url: impl Into<String>, uem_contract_address: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            uem_contract_address: uem_contract_address.into(),
            ..Self::default()
        }
    }

    pub fn wom_url(mut self, url: impl Into<String>) -> Self {
        self.wom_url = url.into();
        self
    }

    pub fn chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn reward_token_decimals(mut self, decimals: u32) -> Self {
        self.reward_token_decimals = decimals;
        self
    }

    pub fn http_pool_max_idle(mut self, max: usize) -> Self {
        self.http_pool_max_idle = max;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn receipt_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.receipt_poll_attempts = attempts;
        self.receipt_poll_interval = interval;
        self
    }
}
