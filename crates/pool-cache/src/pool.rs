//! Normalized protocol state shared by every data source

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xroute_core::{Asset, BaseAmount, Chain};

/// Precision of asset-side pool balances, outbound fees and dust thresholds
pub const POOL_DECIMALS: u8 = 8;

/// Which AMM network a source speaks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkFlavor {
    /// Path segment used by node and proxied indexer endpoints
    pub path_prefix: &'static str,
    /// Settlement asset (e.g. "THOR.RUNE")
    pub settlement_asset: &'static str,
    /// Precision of the settlement side of every pool
    pub native_decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Available,
    Staged,
    Halted,
}

impl PoolStatus {
    /// Map an indexer or node status string ("Available", "staged", "suspended", ...)
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "available" => Self::Available,
            "staged" => Self::Staged,
            _ => Self::Halted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Staged => "staged",
            Self::Halted => "halted",
        }
    }
}

/// One liquidity pool: asset side against the settlement asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub asset: Asset,
    /// Balance of `asset`, always at [`POOL_DECIMALS`]
    pub asset_balance: BaseAmount,
    /// Balance of the settlement asset
    pub native_balance: BaseAmount,
    /// Decimals of `asset` on its own chain
    pub asset_decimals: u8,
    pub status: PoolStatus,
}

impl Pool {
    pub fn is_available(&self) -> bool {
        self.status == PoolStatus::Available
    }

    /// Pools are keyed by chain and symbol; synth and trade assets share their L1 pool
    pub fn matches(&self, asset: &Asset) -> bool {
        self.asset.same_pool(asset)
    }
}

/// Inbound vault for one external chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundDetail {
    pub chain: Chain,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<String>,
    pub halted_chain: bool,
    pub halted_trading: bool,
    pub halted_lp: bool,
    /// Gas rate in `gas_rate_units` (e.g. satsperbyte, gwei)
    pub gas_rate: u128,
    pub gas_rate_units: String,
    pub outbound_tx_size: u64,
    /// Outbound fee in the chain's gas asset at [`POOL_DECIMALS`]
    pub outbound_fee: u128,
    /// Minimum inbound amount at [`POOL_DECIMALS`]
    pub dust_threshold: u128,
}

/// Network constants merged with live overrides, keyed upper-case
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkValues(BTreeMap<String, i64>);

/// Keys the estimator reads
pub mod keys {
    pub const MIN_TX_OUT_VOLUME_THRESHOLD: &str = "MINTXOUTVOLUMETHRESHOLD";
    pub const MAX_TX_OUT_OFFSET: &str = "MAXTXOUTOFFSET";
    pub const TX_OUT_DELAY_RATE: &str = "TXOUTDELAYRATE";
    pub const SCHEDULED_OUTBOUND_VALUE: &str = "SCHEDULEDOUTBOUNDVALUE";
    pub const HALT_TRADING: &str = "HALTTRADING";
    pub const HALT_CHAIN_GLOBAL: &str = "HALTCHAINGLOBAL";
    pub const NATIVE_TX_FEE: &str = "NATIVETRANSACTIONFEE";
    pub const OUTBOUND_TX_FEE: &str = "OUTBOUNDTRANSACTIONFEE";
}

impl NetworkValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts override earlier ones
    pub fn insert(&mut self, key: impl AsRef<str>, value: i64) {
        self.0.insert(key.as_ref().to_ascii_uppercase(), value);
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = (String, i64)>) {
        for (key, value) in values {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.0.get(&key.to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A flag is set when its value is positive
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v > 0)
    }

    pub fn is_trading_halted(&self, chain: &Chain) -> bool {
        self.flag(keys::HALT_TRADING) || self.flag(&format!("HALT{}TRADING", chain))
    }

    pub fn is_chain_halted(&self, chain: &Chain) -> bool {
        self.flag(keys::HALT_CHAIN_GLOBAL) || self.flag(&format!("HALT{}CHAIN", chain))
    }

    pub fn is_lp_paused(&self, chain: &Chain) -> bool {
        self.flag("PAUSELP") || self.flag(&format!("PAUSELP{}", chain))
    }
}
