//! Chainflip Protocol Implementation
//!
//! Chainflip quotes come from its backend API; executing a swap opens a
//! deposit channel through a broker and sends the funds there without a
//! memo. Only L1 assets on the mapped chains are supported.
//!
//! # Example
//!
//! ```ignore
//! let client = pool_cache::build_client()?;
//! let adapter = chainflip::ChainflipAdapter::from_config(&ChainflipConfig::default(), &client);
//! let quote = adapter.estimate_swap(&request).await?;
//! ```

pub mod adapter;
pub mod api;
pub mod assets;

pub use adapter::{AssetRegistry, ChainflipAdapter, StaticRegistry, PROTOCOL};
pub use api::{
    select_quote, AssetRef, BackendClient, BackendQuote, BrokerClient, ChainflipApi,
    ChainflipAsset, ChannelRequest, DepositChannel, HttpChainflipApi, QuoteQuery, QuoteType,
};
pub use assets::{chainflip_chain, find_asset, registry_chains, xroute_chain};
