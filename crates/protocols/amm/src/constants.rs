//! Chain tables used by the estimator and memo builder

use xroute_core::{chains, Asset, Chain};

/// Basis point denominator
pub const BPS_DENOM: u32 = 10_000;

/// Average block time of the settlement chains
pub const SETTLEMENT_BLOCK_SECS: u64 = 6;

/// OP_RETURN payload limit on UTXO chains
pub const UTXO_MEMO_LIMIT: usize = 80;

/// How long a router deposit stays acceptable after it is signed
pub const ROUTER_DEPOSIT_TTL_SECS: u64 = 15 * 60;

/// Gas limits used to price EVM inbound transactions
pub const EVM_NATIVE_GAS_LIMIT: u128 = 21_000;
pub const EVM_TOKEN_GAS_LIMIT: u128 = 70_000;

/// Confirmation parameters of an external chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainAttributes {
    /// Block reward in gas-asset base units (8 decimals); 0 means instant finality
    pub block_reward: u128,
    pub block_time_secs: u64,
}

pub fn chain_attributes(chain: &Chain) -> ChainAttributes {
    let (block_reward, block_time_secs) = match chain.as_str() {
        chains::BTC | chains::BCH => (625_000_000, 600),
        chains::LTC => (1_250_000_000, 150),
        chains::DOGE => (1_000_000_000_000, 60),
        chains::DASH => (200_000_000, 150),
        chains::ETH => (200_000_000, 12),
        chains::AVAX => (0, 3),
        chains::BSC => (0, 3),
        chains::BASE | chains::ARB => (0, 2),
        chains::GAIA | chains::KUJI => (0, 6),
        chains::XRD => (0, 5),
        _ => (0, SETTLEMENT_BLOCK_SECS),
    };
    ChainAttributes {
        block_reward,
        block_time_secs,
    }
}

/// How a chain prices an inbound transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasModel {
    /// `gas_rate` per byte times the transaction size
    Utxo,
    /// `gas_rate` in gwei times a gas limit
    Evm,
    /// `gas_rate` is the fee
    Flat,
}

pub fn gas_model(chain: &Chain) -> GasModel {
    match chain.as_str() {
        chains::BTC | chains::BCH | chains::LTC | chains::DOGE | chains::DASH => GasModel::Utxo,
        chains::ETH | chains::AVAX | chains::BSC | chains::BASE | chains::ARB => GasModel::Evm,
        _ => GasModel::Flat,
    }
}

/// Inbound fee in gas-asset base units (8 decimals)
pub fn inbound_gas_fee(asset: &Asset, gas_rate: u128, tx_size: u64) -> u128 {
    match gas_model(asset.chain()) {
        GasModel::Utxo => gas_rate.saturating_mul(u128::from(tx_size)),
        GasModel::Evm => {
            let gas_limit = if asset.contract().is_some() {
                EVM_TOKEN_GAS_LIMIT
            } else {
                EVM_NATIVE_GAS_LIMIT
            };
            // gwei * limit is in 1e9 units; pool precision is 1e8
            gas_rate.saturating_mul(gas_limit) / 10
        }
        GasModel::Flat => gas_rate,
    }
}

/// Gas asset of an external chain
pub fn gas_asset(chain: &Chain) -> Option<Asset> {
    let symbol = match chain.as_str() {
        chains::BTC => "BTC.BTC",
        chains::BCH => "BCH.BCH",
        chains::LTC => "LTC.LTC",
        chains::DOGE => "DOGE.DOGE",
        chains::DASH => "DASH.DASH",
        chains::ETH => "ETH.ETH",
        chains::AVAX => "AVAX.AVAX",
        chains::BSC => "BSC.BNB",
        chains::BASE => "BASE.ETH",
        chains::ARB => "ARB.ETH",
        chains::GAIA => "GAIA.ATOM",
        chains::KUJI => "KUJI.KUJI",
        chains::XRD => "XRD.XRD",
        chains::THOR => "THOR.RUNE",
        chains::MAYA => "MAYA.CACAO",
        _ => return None,
    };
    symbol.parse().ok()
}

/// Memo size limit of the chain carrying the memo, if any
pub fn memo_limit(chain: &Chain) -> Option<usize> {
    match gas_model(chain) {
        GasModel::Utxo => Some(UTXO_MEMO_LIMIT),
        _ => None,
    }
}

/// Memo aliases of gas assets, `(alias, notation)`
pub type AliasTable = &'static [(&'static str, &'static str)];

pub const THORCHAIN_ASSET_ALIASES: AliasTable = &[
    ("b", "BTC.BTC"),
    ("e", "ETH.ETH"),
    ("g", "GAIA.ATOM"),
    ("d", "DOGE.DOGE"),
    ("l", "LTC.LTC"),
    ("c", "BCH.BCH"),
    ("a", "AVAX.AVAX"),
    ("s", "BSC.BNB"),
    ("r", "THOR.RUNE"),
    ("rune", "THOR.RUNE"),
];

/// MAYAChain memos always carry full asset notation
pub const MAYACHAIN_ASSET_ALIASES: AliasTable = &[];

/// Memo alias of a gas asset in `table`, shortest spelling first
pub fn alias_for(table: AliasTable, asset: &Asset) -> Option<&'static str> {
    if asset.is_synth() || asset.is_trade() {
        return None;
    }
    let full = asset.to_string();
    table
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(&full))
        .map(|(alias, _)| *alias)
}

/// Asset notation behind a memo alias ("b" -> "BTC.BTC")
pub fn resolve_alias(table: AliasTable, alias: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(short, _)| short.eq_ignore_ascii_case(alias))
        .map(|(_, name)| *name)
}
