//! Swap history built from indexer actions

use pool_cache::{ActionCoin, ActionTx, ActionsPage, Pool, SwapAction, POOL_DECIMALS};
use xroute_core::{AssetKind, BaseAmount, CryptoAmount, HistoryTx, SwapRecord, SwapStatus};

use crate::memo::{MemoOp, ParsedMemo};
use crate::state::ClpNetwork;

const NANOS_PER_MILLI: u128 = 1_000_000;

/// One record per swap of `page`, newest first.
///
/// Actions whose memo names no swap destination are skipped.
pub fn swap_records(
    network: &dyn ClpNetwork,
    pools: &[Pool],
    page: ActionsPage,
) -> Vec<SwapRecord> {
    let mut records: Vec<SwapRecord> = merge_legs(page.actions)
        .iter()
        .filter_map(|action| record(network, pools, action))
        .collect();
    records.sort_by(|a, b| b.date_ms.cmp(&a.date_ms));
    records
}

/// The indexer reports one action per leg; legs share the inbound hash
fn merge_legs(actions: Vec<SwapAction>) -> Vec<SwapAction> {
    let mut merged: Vec<SwapAction> = Vec::with_capacity(actions.len());
    for action in actions {
        let position = action
            .inbound_hash()
            .and_then(|hash| merged.iter().position(|m| m.inbound_hash() == Some(hash)));
        match position {
            Some(index) => add_inbound(&mut merged[index], &action),
            None => merged.push(action),
        }
    }
    merged
}

fn add_inbound(target: &mut SwapAction, leg: &SwapAction) {
    for (into, from) in target.inbound.iter_mut().zip(&leg.inbound) {
        if let (Some(total), Some(part)) = (into.coins.first_mut(), from.coins.first()) {
            total.amount = total.amount.saturating_add(part.amount);
        }
    }
}

fn record(network: &dyn ClpNetwork, pools: &[Pool], action: &SwapAction) -> Option<SwapRecord> {
    let to_asset = match ParsedMemo::parse_with(&action.memo, network.memo_aliases()) {
        Ok(ParsedMemo {
            op: MemoOp::Swap,
            asset: Some(asset),
            ..
        }) => asset,
        _ => {
            tracing::debug!(memo = %action.memo, "Skipping action without a swap destination");
            return None;
        }
    };
    let inbound_tx = history_tx(network, pools, action.inbound.first()?)?;
    let outbound_tx = if action.pending {
        None
    } else {
        outbound(&action.outbound).and_then(|tx| history_tx(network, pools, tx))
    };

    Some(SwapRecord {
        protocol: network.protocol_id(),
        date_ms: u64::try_from(action.date_ns / NANOS_PER_MILLI).unwrap_or(u64::MAX),
        status: if action.pending {
            SwapStatus::Pending
        } else {
            SwapStatus::Success
        },
        from_asset: inbound_tx.amount.asset.clone(),
        to_asset,
        inbound_tx,
        outbound_tx,
    })
}

/// The outbound that left the network, else the largest payout
fn outbound(txs: &[ActionTx]) -> Option<&ActionTx> {
    txs.iter().find(|tx| !tx.hash.is_empty()).or_else(|| {
        txs.iter()
            .max_by_key(|tx| tx.coins.first().map_or(0, |coin| coin.amount))
    })
}

fn history_tx(network: &dyn ClpNetwork, pools: &[Pool], tx: &ActionTx) -> Option<HistoryTx> {
    let coin = tx.coins.first()?;
    Some(HistoryTx {
        hash: tx.hash.clone(),
        address: tx.address.clone(),
        amount: coin_amount(network, pools, coin),
    })
}

/// Indexer amounts in the asset's own precision
fn coin_amount(network: &dyn ClpNetwork, pools: &[Pool], coin: &ActionCoin) -> CryptoAmount {
    if network.is_settlement(&coin.asset) {
        let decimals = network.flavor().native_decimals;
        return CryptoAmount::new(coin.asset.clone(), BaseAmount::new(coin.amount, decimals));
    }
    let pooled = BaseAmount::new(coin.amount, POOL_DECIMALS);
    let layer_one = matches!(coin.asset.kind(), AssetKind::Native | AssetKind::Token);
    let amount = pools
        .iter()
        .find(|pool| layer_one && pool.asset == coin.asset)
        .and_then(|pool| pooled.rescale_floor(pool.asset_decimals).ok())
        .unwrap_or(pooled);
    CryptoAmount::new(coin.asset.clone(), amount)
}
