//! Response shapes of the indexer and node APIs and their mapping into
//! [`Pool`], [`InboundDetail`], [`NetworkValues`] and [`ActionsPage`].
//!
//! Both APIs encode amounts as decimal strings; a few fields flip between
//! strings and numbers across versions, hence [`Numeric`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use xroute_core::{Asset, BaseAmount, Chain};

use crate::actions::{ActionCoin, ActionTx, ActionsPage, SwapAction};
use crate::http::get_json;
use crate::pool::{keys, InboundDetail, NetworkFlavor, NetworkValues, Pool, PoolStatus, POOL_DECIMALS};
use crate::source::SourceError;

/// A number sent either as a JSON string or a JSON integer
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Int(i64),
    Text(String),
}

impl Numeric {
    fn as_u128(&self, source_name: &str, field: &str) -> Result<u128, SourceError> {
        let parsed = match self {
            Self::Int(v) => u128::try_from(*v).ok(),
            Self::Text(s) if s.trim().is_empty() => Some(0),
            Self::Text(s) => s.trim().parse::<u128>().ok(),
        };
        parsed.ok_or_else(|| SourceError::Parse {
            source_name: source_name.to_string(),
            message: format!("{} is not an unsigned integer: {:?}", field, self),
        })
    }

    fn as_i64(&self, source_name: &str, field: &str) -> Result<i64, SourceError> {
        let parsed = match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<i64>().ok(),
        };
        parsed.ok_or_else(|| SourceError::Parse {
            source_name: source_name.to_string(),
            message: format!("{} is not an integer: {:?}", field, self),
        })
    }
}

fn opt_u128(value: &Option<Numeric>, source_name: &str, field: &str) -> Result<u128, SourceError> {
    value
        .as_ref()
        .map_or(Ok(0), |v| v.as_u128(source_name, field))
}

/// Token decimals; unknown or negative means the pool default
fn asset_decimals(value: Option<i64>) -> u8 {
    value
        .and_then(|d| u8::try_from(d).ok())
        .filter(|d| *d > 0)
        .unwrap_or(POOL_DECIMALS)
}

fn parse_asset(raw: &str, source_name: &str) -> Option<Asset> {
    match raw.parse::<Asset>() {
        Ok(asset) => Some(asset),
        Err(e) => {
            tracing::warn!(source = source_name, asset = raw, error = %e, "Skipping pool with unparseable asset");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Indexer pools
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexerPool {
    pub asset: String,
    pub asset_depth: Numeric,
    #[serde(alias = "cacaoDepth")]
    pub rune_depth: Numeric,
    pub status: String,
    #[serde(default)]
    pub native_decimal: Option<Numeric>,
}

pub(crate) fn pools_from_indexer(
    dtos: Vec<IndexerPool>,
    flavor: &NetworkFlavor,
    source_name: &str,
) -> Result<Vec<Pool>, SourceError> {
    let mut pools = Vec::with_capacity(dtos.len());
    for dto in dtos {
        let Some(asset) = parse_asset(&dto.asset, source_name) else {
            continue;
        };
        let decimals = match &dto.native_decimal {
            Some(value) => Some(value.as_i64(source_name, "nativeDecimal")?),
            None => None,
        };
        pools.push(Pool {
            asset,
            asset_balance: BaseAmount::new(
                dto.asset_depth.as_u128(source_name, "assetDepth")?,
                POOL_DECIMALS,
            ),
            native_balance: BaseAmount::new(
                dto.rune_depth.as_u128(source_name, "runeDepth")?,
                flavor.native_decimals,
            ),
            asset_decimals: asset_decimals(decimals),
            status: PoolStatus::parse(&dto.status),
        });
    }
    Ok(pools)
}

// ---------------------------------------------------------------------------
// Node pools
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct NodePool {
    pub asset: String,
    pub status: String,
    #[serde(default)]
    pub decimals: Option<i64>,
    pub balance_asset: Numeric,
    #[serde(alias = "balance_cacao")]
    pub balance_rune: Numeric,
}

pub(crate) fn pools_from_node(
    dtos: Vec<NodePool>,
    flavor: &NetworkFlavor,
    source_name: &str,
) -> Result<Vec<Pool>, SourceError> {
    let mut pools = Vec::with_capacity(dtos.len());
    for dto in dtos {
        let Some(asset) = parse_asset(&dto.asset, source_name) else {
            continue;
        };
        pools.push(Pool {
            asset,
            asset_balance: BaseAmount::new(
                dto.balance_asset.as_u128(source_name, "balance_asset")?,
                POOL_DECIMALS,
            ),
            native_balance: BaseAmount::new(
                dto.balance_rune.as_u128(source_name, "balance_rune")?,
                flavor.native_decimals,
            ),
            asset_decimals: asset_decimals(dto.decimals),
            status: PoolStatus::parse(&dto.status),
        });
    }
    Ok(pools)
}

// ---------------------------------------------------------------------------
// Inbound addresses (same shape on the node and through the indexer proxy)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct InboundAddress {
    pub chain: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub router: Option<String>,
    #[serde(default)]
    pub halted: bool,
    #[serde(default)]
    pub global_trading_paused: bool,
    #[serde(default)]
    pub chain_trading_paused: bool,
    #[serde(default)]
    pub chain_lp_actions_paused: bool,
    #[serde(default)]
    pub gas_rate: Option<Numeric>,
    #[serde(default)]
    pub gas_rate_units: Option<String>,
    #[serde(default)]
    pub outbound_tx_size: Option<Numeric>,
    #[serde(default)]
    pub outbound_fee: Option<Numeric>,
    #[serde(default)]
    pub dust_threshold: Option<Numeric>,
}

pub(crate) fn inbound_from_wire(
    dtos: Vec<InboundAddress>,
    source_name: &str,
) -> Result<Vec<InboundDetail>, SourceError> {
    dtos.into_iter()
        .map(|dto| {
            let chain = Chain::new(&dto.chain).map_err(|e| SourceError::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
            let outbound_tx_size = opt_u128(&dto.outbound_tx_size, source_name, "outbound_tx_size")?;
            Ok(InboundDetail {
                chain,
                address: dto.address,
                router: dto.router.filter(|r| !r.is_empty()),
                halted_chain: dto.halted,
                halted_trading: dto.global_trading_paused || dto.chain_trading_paused,
                halted_lp: dto.chain_lp_actions_paused,
                gas_rate: opt_u128(&dto.gas_rate, source_name, "gas_rate")?,
                gas_rate_units: dto.gas_rate_units.unwrap_or_default(),
                outbound_tx_size: u64::try_from(outbound_tx_size).unwrap_or(u64::MAX),
                outbound_fee: opt_u128(&dto.outbound_fee, source_name, "outbound_fee")?,
                dust_threshold: opt_u128(&dto.dust_threshold, source_name, "dust_threshold")?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Network values
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct Constants {
    #[serde(default)]
    pub int_64_values: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Queue {
    #[serde(default)]
    pub scheduled_outbound_value: Option<Numeric>,
}

/// Endpoints contributing to [`NetworkValues`]
pub(crate) struct NetworkValueUrls {
    pub constants: String,
    pub mimir: String,
    pub queue: String,
}

/// Merge constants, mimir overrides and the outbound queue value.
///
/// Constants and mimir are required; an unreachable queue counts as empty.
pub(crate) async fn load_network_values(
    client: &reqwest::Client,
    source_name: &str,
    urls: &NetworkValueUrls,
    timeout: Duration,
) -> Result<NetworkValues, SourceError> {
    let (constants, mimir, queue) = tokio::join!(
        get_json::<Constants>(client, source_name, &urls.constants, timeout),
        get_json::<BTreeMap<String, i64>>(client, source_name, &urls.mimir, timeout),
        get_json::<Queue>(client, source_name, &urls.queue, timeout),
    );

    let mut values = NetworkValues::new();
    values.extend(constants?.int_64_values);
    values.extend(mimir?);

    let scheduled = match queue {
        Ok(queue) => match &queue.scheduled_outbound_value {
            Some(value) => value.as_i64(source_name, "scheduled_outbound_value")?,
            None => 0,
        },
        Err(e) => {
            tracing::debug!(source = source_name, error = %e, "Outbound queue unavailable");
            0
        }
    };
    values.insert(keys::SCHEDULED_OUTBOUND_VALUE, scheduled);

    Ok(values)
}

// ---------------------------------------------------------------------------
// Indexer actions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ActionsResponse {
    #[serde(default)]
    count: Option<Numeric>,
    #[serde(default)]
    actions: Vec<ActionDto>,
}

#[derive(Debug, Deserialize)]
struct ActionDto {
    date: Numeric,
    status: String,
    #[serde(rename = "in", default)]
    inbound: Vec<ActionTxDto>,
    #[serde(rename = "out", default)]
    outbound: Vec<ActionTxDto>,
    #[serde(default)]
    metadata: ActionMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ActionMetadata {
    #[serde(default)]
    swap: Option<SwapMetadata>,
}

#[derive(Debug, Deserialize)]
struct SwapMetadata {
    #[serde(default)]
    memo: String,
}

#[derive(Debug, Deserialize)]
struct ActionTxDto {
    #[serde(default)]
    address: String,
    #[serde(default)]
    coins: Vec<CoinDto>,
    #[serde(rename = "txID", default)]
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct CoinDto {
    asset: String,
    amount: Numeric,
}

pub(crate) fn actions_from_wire(
    response: ActionsResponse,
    source_name: &str,
) -> Result<ActionsPage, SourceError> {
    let count = match &response.count {
        Some(count) => u64::try_from(count.as_u128(source_name, "count")?).unwrap_or(u64::MAX),
        None => 0,
    };
    let actions = response
        .actions
        .into_iter()
        .map(|dto| {
            Ok(SwapAction {
                date_ns: dto.date.as_u128(source_name, "date")?,
                pending: dto.status.eq_ignore_ascii_case("pending"),
                inbound: action_txs(dto.inbound, source_name)?,
                outbound: action_txs(dto.outbound, source_name)?,
                memo: dto.metadata.swap.map(|swap| swap.memo).unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, SourceError>>()?;
    Ok(ActionsPage { count, actions })
}

fn action_txs(dtos: Vec<ActionTxDto>, source_name: &str) -> Result<Vec<ActionTx>, SourceError> {
    dtos.into_iter()
        .map(|dto| {
            let mut coins = Vec::with_capacity(dto.coins.len());
            for coin in dto.coins {
                let amount = coin.amount.as_u128(source_name, "coin amount")?;
                match coin.asset.parse::<Asset>() {
                    Ok(asset) => coins.push(ActionCoin { asset, amount }),
                    Err(e) => {
                        tracing::warn!(
                            source = source_name,
                            asset = %coin.asset,
                            error = %e,
                            "Skipping coin with unparseable asset"
                        );
                    }
                }
            }
            Ok(ActionTx {
                hash: dto.tx_id,
                address: dto.address,
                coins,
            })
        })
        .collect()
}
