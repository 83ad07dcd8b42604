//! Swap actions recorded by an indexer
//!
//! Amounts are kept exactly as the indexer reports them: asset coins at
//! [`POOL_DECIMALS`](crate::POOL_DECIMALS), the settlement asset at the
//! network's native decimals.

use async_trait::async_trait;
use xroute_core::Asset;

use crate::source::SourceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCoin {
    pub asset: Asset,
    pub amount: u128,
}

/// One inbound or outbound transaction of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTx {
    /// Empty for outbounds that never left the settlement chain
    pub hash: String,
    pub address: String,
    pub coins: Vec<ActionCoin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapAction {
    /// Unix time in nanoseconds
    pub date_ns: u128,
    pub pending: bool,
    pub inbound: Vec<ActionTx>,
    pub outbound: Vec<ActionTx>,
    pub memo: String,
}

impl SwapAction {
    /// Hash of the first inbound transaction, shared by every leg of a swap
    pub fn inbound_hash(&self) -> Option<&str> {
        self.inbound.first().map(|tx| tx.hash.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsPage {
    /// Total matching actions known to the indexer
    pub count: u64,
    pub actions: Vec<SwapAction>,
}

/// Swap action lookup on one indexer
#[async_trait]
pub trait ActionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Swap actions involving any of `addresses`, newest first
    async fn swap_actions(&self, addresses: &[String]) -> Result<ActionsPage, SourceError>;
}
