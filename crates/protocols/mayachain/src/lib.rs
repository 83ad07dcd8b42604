//! MAYAChain Protocol Implementation
//!
//! MAYAChain pairs every pool against CACAO, which carries 10 decimals while
//! the asset side of each pool stays at 8. Trade assets do not exist on
//! MAYAChain; synths settle on MAYAChain itself.

pub mod network;

pub use network::{MayachainNetwork, CACAO, CACAO_DECIMALS};

use amm::ClpAdapter;
use xroute_core::AmmProtocolConfig;

pub type MayachainAdapter = ClpAdapter<MayachainNetwork>;

/// Adapter reading from the indexer and node URLs in `config`
pub fn adapter(config: &AmmProtocolConfig, client: &reqwest::Client) -> MayachainAdapter {
    tracing::debug!(
        indexers = config.indexer_urls.len(),
        nodes = config.node_urls.len(),
        "Building MAYAChain adapter"
    );
    ClpAdapter::from_config(MayachainNetwork, config, client)
}
