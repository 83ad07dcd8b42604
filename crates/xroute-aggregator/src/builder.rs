//! Adapter construction from configuration

use std::sync::Arc;
use std::time::Duration;

use amm::ClpSettings;
use chainflip::ChainflipAdapter;
use xroute_core::{AffiliateParams, AggregatorConfig, ProtocolAdapter, Wallet};

/// One adapter per enabled protocol, in THORChain, MAYAChain, Chainflip order.
///
/// The AMM adapters get `affiliate` as their default affiliate; Chainflip
/// charges its configured broker commission instead.
pub fn build_adapters(
    config: &AggregatorConfig,
    client: &reqwest::Client,
    wallet: Option<Arc<dyn Wallet>>,
    affiliate: Option<AffiliateParams>,
) -> Vec<Arc<dyn ProtocolAdapter>> {
    let execution_timeout = Duration::from_millis(config.execution_timeout_ms);
    let mut adapters: Vec<Arc<dyn ProtocolAdapter>> = Vec::new();

    if let Some(amm) = &config.thorchain {
        let settings = ClpSettings::from_config(amm)
            .with_default_affiliate(affiliate.clone())
            .with_execution_timeout(execution_timeout);
        let mut adapter = thorchain::adapter(amm, client).with_settings(settings);
        if let Some(wallet) = &wallet {
            adapter = adapter.with_wallet(Arc::clone(wallet));
        }
        adapters.push(Arc::new(adapter));
    }

    if let Some(amm) = &config.mayachain {
        let settings = ClpSettings::from_config(amm)
            .with_default_affiliate(affiliate.clone())
            .with_execution_timeout(execution_timeout);
        let mut adapter = mayachain::adapter(amm, client).with_settings(settings);
        if let Some(wallet) = &wallet {
            adapter = adapter.with_wallet(Arc::clone(wallet));
        }
        adapters.push(Arc::new(adapter));
    }

    if let Some(cf) = &config.chainflip {
        let mut adapter =
            ChainflipAdapter::from_config(cf, client).with_execution_timeout(execution_timeout);
        if let Some(wallet) = &wallet {
            adapter = adapter.with_wallet(Arc::clone(wallet));
        }
        adapters.push(Arc::new(adapter));
    }

    adapters
}
