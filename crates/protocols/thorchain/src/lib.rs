//! THORChain Protocol Implementation
//!
//! THORChain pairs every pool against RUNE. Synthetic (`BTC/BTC`) and trade
//! (`BTC~BTC`) assets settle on THORChain itself and resolve to their L1
//! pools. All swap logic lives in the `amm` crate; this crate supplies the
//! network rules.
//!
//! # Example
//!
//! ```ignore
//! let client = pool_cache::build_client()?;
//! let adapter = thorchain::adapter(&AmmProtocolConfig::thorchain(), &client);
//! let quote = adapter.estimate_swap(&request).await?;
//! ```

pub mod network;

pub use network::{ThorchainNetwork, RUNE, RUNE_DECIMALS};

use amm::ClpAdapter;
use xroute_core::AmmProtocolConfig;

pub type ThorchainAdapter = ClpAdapter<ThorchainNetwork>;

/// Adapter reading from the indexer and node URLs in `config`
pub fn adapter(config: &AmmProtocolConfig, client: &reqwest::Client) -> ThorchainAdapter {
    tracing::debug!(
        indexers = config.indexer_urls.len(),
        nodes = config.node_urls.len(),
        "Building THORChain adapter"
    );
    ClpAdapter::from_config(ThorchainNetwork, config, client)
}
