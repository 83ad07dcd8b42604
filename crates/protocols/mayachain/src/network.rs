//! MAYAChain network rules

use amm::constants::{AliasTable, MAYACHAIN_ASSET_ALIASES};
use amm::ClpNetwork;
use pool_cache::{InboundDetail, NetworkFlavor, POOL_DECIMALS};
use xroute_core::{chains, Asset, BaseAmount, Chain, ProtocolId};

pub const CACAO: &str = "MAYA.CACAO";
pub const CACAO_DECIMALS: u8 = 10;

/// 0.5 CACAO, used until the network reports NATIVETRANSACTIONFEE
const DEFAULT_NATIVE_FEE: u128 = 5_000_000_000;

/// Minimum inbound amounts by chain, in the chain's own precision
const DUST_THRESHOLDS: &[(&str, u128, u8)] = &[
    (chains::BTC, 10_000, 8),
    (chains::DASH, 10_000, 8),
    (chains::ETH, 0, 18),
    (chains::KUJI, 0, 6),
    (chains::THOR, 0, 8),
    (chains::MAYA, 0, 10),
    (chains::ARB, 0, 18),
    (chains::XRD, 0, 18),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct MayachainNetwork;

impl ClpNetwork for MayachainNetwork {
    fn protocol_id(&self) -> ProtocolId {
        ProtocolId::new("mayachain")
    }

    fn flavor(&self) -> NetworkFlavor {
        NetworkFlavor {
            path_prefix: "mayachain",
            settlement_asset: CACAO,
            native_decimals: CACAO_DECIMALS,
        }
    }

    fn settlement_asset(&self) -> Asset {
        Asset::known_native(chains::MAYA, "CACAO")
    }

    fn default_native_fee(&self) -> u128 {
        DEFAULT_NATIVE_FEE
    }

    fn memo_aliases(&self) -> AliasTable {
        MAYACHAIN_ASSET_ALIASES
    }

    fn support_override(&self, asset: &Asset) -> Option<bool> {
        if asset.is_trade() {
            Some(false)
        } else if asset.is_synth() || self.is_settlement(asset) {
            Some(true)
        } else {
            None
        }
    }

    fn dust_threshold(&self, chain: &Chain, inbound: Option<&InboundDetail>) -> BaseAmount {
        DUST_THRESHOLDS
            .iter()
            .find(|(id, _, _)| chain.is(id))
            .map(|(_, amount, decimals)| BaseAmount::new(*amount, *decimals))
            .unwrap_or_else(|| {
                BaseAmount::new(inbound.map_or(0, |d| d.dust_threshold), POOL_DECIMALS)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm::{ClpAdapter, ClpSettings};
    use pool_cache::{
        keys, NetworkValues, Pool, PoolDataSource, PoolStatus, ProtocolStateCache,
        StaticPoolSource,
    };
    use std::sync::Arc;
    use xroute_core::{CacheConfig, CryptoAmount, ProtocolAdapter, SwapRequest, ValidationError};

    const ONE: u128 = 100_000_000;
    const ONE_CACAO: u128 = 10_000_000_000;

    fn chain(id: &str) -> Chain {
        Chain::new(id).unwrap()
    }

    fn pool(asset: &str, asset_depth: u128, cacao_depth: u128, status: PoolStatus) -> Pool {
        Pool {
            asset: asset.parse().unwrap(),
            asset_balance: BaseAmount::new(asset_depth, POOL_DECIMALS),
            native_balance: BaseAmount::new(cacao_depth, CACAO_DECIMALS),
            asset_decimals: 8,
            status,
        }
    }

    fn inbound(id: &str, dust: u128) -> InboundDetail {
        InboundDetail {
            chain: chain(id),
            address: format!("{}-vault", id.to_lowercase()),
            router: None,
            halted_chain: false,
            halted_trading: false,
            halted_lp: false,
            gas_rate: 10,
            gas_rate_units: "satsperbyte".into(),
            outbound_tx_size: 1000,
            outbound_fee: 0,
            dust_threshold: dust,
        }
    }

    fn adapter() -> ClpAdapter<MayachainNetwork> {
        let mut network = NetworkValues::new();
        network.insert(keys::NATIVE_TX_FEE, 0);
        let source = StaticPoolSource::new(
            "fixture",
            vec![
                pool("BTC.BTC", 110 * ONE, 100 * ONE_CACAO, PoolStatus::Available),
                pool("DASH.DASH", 10 * ONE, 10 * ONE_CACAO, PoolStatus::Staged),
            ],
            vec![inbound("BTC", 99_999), inbound("DASH", 0)],
            network,
        );
        let cache = ProtocolStateCache::new(
            "mayachain",
            vec![Arc::new(source) as Arc<dyn PoolDataSource>],
            &CacheConfig::default(),
        );
        ClpAdapter::new(MayachainNetwork, cache, ClpSettings::default())
    }

    fn request(from: &str, to: &str, amount: u128, decimals: u8) -> SwapRequest {
        let from: Asset = from.parse().unwrap();
        SwapRequest::new(
            from.clone(),
            to.parse().unwrap(),
            CryptoAmount::new(from, BaseAmount::new(amount, decimals)),
            "maya1dest",
        )
    }

    #[test]
    fn test_support_overrides() {
        let network = MayachainNetwork;
        assert_eq!(network.support_override(&"BTC~BTC".parse().unwrap()), Some(false));
        assert_eq!(network.support_override(&"BTC/BTC".parse().unwrap()), Some(true));
        assert_eq!(network.support_override(&"MAYA.CACAO".parse().unwrap()), Some(true));
        assert_eq!(network.support_override(&"BTC.BTC".parse().unwrap()), None);
    }

    #[test]
    fn test_memos_use_full_notation() {
        let network = MayachainNetwork;
        assert!(network.memo_aliases().is_empty());
        assert!(amm::constants::resolve_alias(network.memo_aliases(), "b").is_none());
    }

    #[test]
    fn test_dust_table() {
        let network = MayachainNetwork;
        let detail = inbound("BTC", 99_999);
        assert_eq!(
            network.dust_threshold(&chain("BTC"), Some(&detail)),
            BaseAmount::new(10_000, 8)
        );
        assert_eq!(
            network.dust_threshold(&chain("ETH"), None),
            BaseAmount::new(0, 18)
        );
        assert_eq!(
            network.dust_threshold(&chain("KUJI"), None),
            BaseAmount::new(0, 6)
        );

        let gaia = inbound("GAIA", 500);
        assert_eq!(
            network.dust_threshold(&chain("GAIA"), Some(&gaia)),
            BaseAmount::new(500, 8)
        );
        assert_eq!(
            network.dust_threshold(&chain("GAIA"), None),
            BaseAmount::new(0, 8)
        );
    }

    async fn supported(adapter: &ClpAdapter<MayachainNetwork>, asset: &str) -> bool {
        adapter
            .is_asset_supported(&asset.parse().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_asset_support() {
        let adapter = adapter();
        assert!(supported(&adapter, "BTC.BTC").await);
        assert!(supported(&adapter, "MAYA.CACAO").await);
        // synths are always supported, even without a pool
        assert!(supported(&adapter, "ETH/ETH").await);
        assert!(!supported(&adapter, "BTC~BTC").await);
        assert!(!supported(&adapter, "DASH.DASH").await);
        assert!(!supported(&adapter, "ETH.ETH").await);
    }

    #[tokio::test]
    async fn test_btc_to_cacao_uses_ten_decimals() {
        let adapter = adapter();
        let quote = adapter
            .estimate_swap(&request("BTC.BTC", "MAYA.CACAO", ONE, 8))
            .await
            .unwrap();

        assert!(quote.can_swap, "errors: {:?}", quote.errors);
        // 100 CACAO * 1 / (110 + 1)
        assert_eq!(
            quote.expected_amount.amount,
            BaseAmount::new(9_009_009_009, CACAO_DECIMALS)
        );
        assert_eq!(quote.slip_bps, 90);
        assert_eq!(quote.dust_threshold.amount, BaseAmount::new(10_000, 8));
        assert_eq!(quote.memo, "=:MAYA.CACAO:maya1dest");
    }

    #[tokio::test]
    async fn test_cacao_to_btc_rescales_input() {
        let adapter = adapter();
        let quote = adapter
            .estimate_swap(&request("MAYA.CACAO", "BTC.BTC", 100 * ONE_CACAO, CACAO_DECIMALS))
            .await
            .unwrap();

        assert!(quote.can_swap, "errors: {:?}", quote.errors);
        // 110 BTC * 100 / (100 + 100)
        assert_eq!(quote.expected_amount.amount, BaseAmount::new(55 * ONE, 8));
        assert!(quote.to_address.is_empty());
    }

    #[tokio::test]
    async fn test_trade_asset_rejected_in_quote() {
        let adapter = adapter();
        let quote = adapter
            .estimate_swap(&request("BTC~BTC", "MAYA.CACAO", ONE, 8))
            .await
            .unwrap();
        assert!(!quote.can_swap);
        assert_eq!(
            quote.errors,
            vec![ValidationError::UnsupportedAsset {
                asset: "BTC~BTC".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_staged_pool_blocks_swap() {
        let adapter = adapter();
        let quote = adapter
            .estimate_swap(&request("DASH.DASH", "MAYA.CACAO", ONE, 8))
            .await
            .unwrap();
        assert!(quote.errors.contains(&ValidationError::PoolUnavailable {
            asset: "DASH.DASH".into(),
            status: "staged".into(),
        }));
    }
}
