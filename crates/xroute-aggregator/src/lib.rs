//! xroute-aggregator: cross-protocol swap quotes
//!
//! Fans a [`SwapRequest`](xroute_core::SwapRequest) out to every configured
//! protocol adapter, ranks what comes back, and executes a chosen quote on
//! exactly one protocol. Swap history is collected from every protocol with
//! an indexer.
//!
//! # Example
//!
//! ```ignore
//! xroute_aggregator::init_tracing("xroute=debug,info");
//! let config = xroute_aggregator::load_config("xroute.json")?;
//! let client = pool_cache::build_client()?;
//! let aggregator = Aggregator::from_config(&config, &client, Some(wallet))?;
//!
//! let result = aggregator.estimate_swap(&request).await;
//! if let Some(best) = result.best() {
//!     aggregator.do_swap(&best.protocol, &request).await?;
//! }
//! ```

pub mod aggregator;
pub mod builder;
pub mod config;
pub mod error;
pub mod telemetry;

pub use aggregator::{
    rank_quotes, AdapterFailure, AggregatedHistory, AggregatedQuotes, Aggregator,
};
pub use builder::build_adapters;
pub use config::{load_config, parse_config};
pub use error::AggregatorError;
pub use telemetry::init_tracing;
