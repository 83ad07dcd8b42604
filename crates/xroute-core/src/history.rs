//! Past swaps of a set of addresses, as reported by protocol indexers

use serde::{Deserialize, Serialize};

use crate::amount::CryptoAmount;
use crate::types::{Asset, Chain, ProtocolId};

/// An address whose swaps are looked up
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainAddress {
    pub chain: Chain,
    pub address: String,
}

impl ChainAddress {
    pub fn new(chain: Chain, address: impl Into<String>) -> Self {
        Self {
            chain,
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Success,
}

/// One side of a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTx {
    pub hash: String,
    pub address: String,
    pub amount: CryptoAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub protocol: ProtocolId,
    /// Unix time in milliseconds
    pub date_ms: u64,
    pub status: SwapStatus,
    pub from_asset: Asset,
    pub to_asset: Asset,
    pub inbound_tx: HistoryTx,
    /// Absent while the swap is pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_tx: Option<HistoryTx>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapHistory {
    /// Total reported by the source, which may exceed `swaps.len()`
    pub count: u64,
    pub swaps: Vec<SwapRecord>,
}

impl SwapHistory {
    /// Distinct addresses of `chain_addresses`, in first-seen order
    pub fn unique_addresses(chain_addresses: &[ChainAddress]) -> Vec<String> {
        let mut addresses: Vec<String> = Vec::with_capacity(chain_addresses.len());
        for entry in chain_addresses {
            if !addresses.contains(&entry.address) {
                addresses.push(entry.address.clone());
            }
        }
        addresses
    }

    /// Newest first
    pub fn sort_newest_first(&mut self) {
        self.swaps.sort_by(|a, b| b.date_ms.cmp(&a.date_ms));
    }
}
