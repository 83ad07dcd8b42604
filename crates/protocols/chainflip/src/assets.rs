//! Mapping between xroute assets and the Chainflip registry

use xroute_core::{chains, Asset, Chain};

use crate::api::ChainflipAsset;

const CHAIN_NAMES: &[(&str, &str)] = &[
    (chains::ETH, "Ethereum"),
    (chains::BTC, "Bitcoin"),
    (chains::DOT, "Polkadot"),
    (chains::ARB, "Arbitrum"),
    (chains::SOL, "Solana"),
];

pub fn chainflip_chain(chain: &Chain) -> Option<&'static str> {
    CHAIN_NAMES
        .iter()
        .find(|(id, _)| chain.is(id))
        .map(|(_, name)| *name)
}

pub fn xroute_chain(name: &str) -> Option<Chain> {
    CHAIN_NAMES
        .iter()
        .find(|(_, cf)| cf.eq_ignore_ascii_case(name))
        .and_then(|(id, _)| Chain::new(id).ok())
}

/// Registry entry for `asset`. Synth and trade assets never match.
pub fn find_asset<'a>(registry: &'a [ChainflipAsset], asset: &Asset) -> Option<&'a ChainflipAsset> {
    if asset.is_synth() || asset.is_trade() {
        return None;
    }
    let chain = chainflip_chain(asset.chain())?;
    registry.iter().find(|entry| {
        entry.chain.eq_ignore_ascii_case(chain)
            && entry.asset.eq_ignore_ascii_case(asset.ticker())
            && match (asset.contract(), entry.contract_address.as_deref()) {
                (Some(contract), Some(registered)) => contract.eq_ignore_ascii_case(registered),
                (None, Some(_)) => false,
                _ => true,
            }
    })
}

/// Chains with at least one registry entry, sorted
pub fn registry_chains(registry: &[ChainflipAsset]) -> Vec<Chain> {
    let mut chains: Vec<Chain> = registry
        .iter()
        .filter_map(|entry| xroute_chain(&entry.chain))
        .collect();
    chains.sort();
    chains.dedup();
    chains
}
