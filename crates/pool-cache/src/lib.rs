//! pool-cache: AMM network state with multi-source fallback
//!
//! Data sources (indexers and consensus nodes) are normalized into
//! [`Pool`], [`InboundDetail`] and [`NetworkValues`], then served through a
//! [`ResilientCache`] that keeps answering when the primary source degrades.
//! Indexers also answer swap history lookups through [`ActionSource`].

pub mod actions;
pub mod cache;
pub mod http;
pub mod indexer;
pub mod node;
pub mod pool;
pub mod source;
pub mod state;
mod wire;

pub use actions::{ActionCoin, ActionSource, ActionTx, ActionsPage, SwapAction};
pub use cache::{CacheEntry, CacheError, CachePolicy, Cached, ResilientCache};
pub use http::{build_client, timed_request};
pub use indexer::IndexerSource;
pub use node::NodeSource;
pub use pool::{keys, InboundDetail, NetworkFlavor, NetworkValues, Pool, PoolStatus, POOL_DECIMALS};
pub use source::{DataSource, PoolDataSource, SourceError, StaticPoolSource};
pub use state::{ProtocolStateCache, StateKey, StateSnapshot, StateValue};
