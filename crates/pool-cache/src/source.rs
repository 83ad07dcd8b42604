//! Data source traits and errors

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;
use xroute_core::Chain;

use crate::pool::{InboundDetail, NetworkValues, Pool};

/// Errors from a single backing service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{source_name} timed out after {after_ms}ms")]
    Timeout { source_name: String, after_ms: u64 },

    #[error("{source_name} unreachable: {message}")]
    Transport {
        source_name: String,
        message: String,
    },

    #[error("{source_name} returned HTTP {status} for {url}")]
    Http {
        source_name: String,
        status: u16,
        url: String,
    },

    #[error("Failed to parse {source_name} response: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("{what} not found at {source_name}")]
    NotFound { source_name: String, what: String },
}

impl SourceError {
    /// Errors worth retrying against the same source
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Parse { .. } | Self::NotFound { .. } => false,
        }
    }
}

/// A keyed fetch from one backing service, as seen by [`ResilientCache`](crate::ResilientCache)
#[async_trait]
pub trait DataSource<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send,
{
    fn name(&self) -> &str;

    async fn fetch(&self, key: &K) -> Result<V, SourceError>;
}

/// Accessor over one indexer or consensus node of an AMM network.
///
/// Implementations map their own response schema into [`Pool`],
/// [`InboundDetail`] and [`NetworkValues`] before anything is cached.
#[async_trait]
pub trait PoolDataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn pools(&self) -> Result<Vec<Pool>, SourceError>;

    async fn inbound_addresses(&self) -> Result<Vec<InboundDetail>, SourceError>;

    async fn inbound_address(&self, chain: &Chain) -> Result<InboundDetail, SourceError> {
        self.inbound_addresses()
            .await?
            .into_iter()
            .find(|detail| &detail.chain == chain)
            .ok_or_else(|| SourceError::NotFound {
                source_name: self.name().to_string(),
                what: format!("inbound address for {}", chain),
            })
    }

    async fn network_values(&self) -> Result<NetworkValues, SourceError>;
}

/// In-memory source serving a fixed snapshot.
///
/// Useful for pinned fixtures and for exercising adapters without a network.
/// `calls` counts every trait method invocation.
#[derive(Debug, Default)]
pub struct StaticPoolSource {
    name: String,
    pools: RwLock<Vec<Pool>>,
    inbound: RwLock<Vec<InboundDetail>>,
    network: RwLock<NetworkValues>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticPoolSource {
    pub fn new(
        name: impl Into<String>,
        pools: Vec<Pool>,
        inbound: Vec<InboundDetail>,
        network: NetworkValues,
    ) -> Self {
        Self {
            name: name.into(),
            pools: RwLock::new(pools),
            inbound: RwLock::new(inbound),
            network: RwLock::new(network),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call fail with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_pools(&self, pools: Vec<Pool>) {
        *self.pools.write().unwrap_or_else(|e| e.into_inner()) = pools;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Transport {
                source_name: self.name.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PoolDataSource for StaticPoolSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pools(&self) -> Result<Vec<Pool>, SourceError> {
        self.check()?;
        Ok(self.pools.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn inbound_addresses(&self) -> Result<Vec<InboundDetail>, SourceError> {
        self.check()?;
        Ok(self.inbound.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn network_values(&self) -> Result<NetworkValues, SourceError> {
        self.check()?;
        Ok(self.network.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = SourceError::Timeout {
            source_name: "midgard".into(),
            after_ms: 100,
        };
        assert!(timeout.is_transient());

        let server = SourceError::Http {
            source_name: "midgard".into(),
            status: 503,
            url: "/v2/pools".into(),
        };
        assert!(server.is_transient());

        let client = SourceError::Http {
            source_name: "midgard".into(),
            status: 404,
            url: "/v2/pools".into(),
        };
        assert!(!client.is_transient());

        let parse = SourceError::Parse {
            source_name: "thornode".into(),
            message: "expected array".into(),
        };
        assert!(!parse.is_transient());
    }

    #[tokio::test]
    async fn test_static_source_inbound_lookup() {
        let btc = Chain::new("BTC").unwrap();
        let detail = InboundDetail {
            chain: btc.clone(),
            address: "bc1qvault".into(),
            router: None,
            halted_chain: false,
            halted_trading: false,
            halted_lp: false,
            gas_rate: 10,
            gas_rate_units: "satsperbyte".into(),
            outbound_tx_size: 1000,
            outbound_fee: 30_000,
            dust_threshold: 10_000,
        };
        let source = StaticPoolSource::new("fixture", vec![], vec![detail], NetworkValues::new());

        let found = source.inbound_address(&btc).await.unwrap();
        assert_eq!(found.address, "bc1qvault");

        let missing = source.inbound_address(&Chain::new("ETH").unwrap()).await;
        assert!(matches!(missing, Err(SourceError::NotFound { .. })));

        source.set_failing(true);
        assert!(source.pools().await.unwrap_err().is_transient());
        assert_eq!(source.calls(), 3);
    }
}
