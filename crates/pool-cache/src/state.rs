//! Typed facade over the resilient cache for one AMM network

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use xroute_core::{Asset, CacheConfig, Chain};

use crate::cache::{CacheError, CachePolicy, Cached, ResilientCache};
use crate::pool::{InboundDetail, NetworkValues, Pool};
use crate::source::{DataSource, PoolDataSource, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Pools,
    InboundAddresses,
    NetworkValues,
}

#[derive(Debug, Clone)]
pub enum StateValue {
    Pools(Arc<Vec<Pool>>),
    InboundAddresses(Arc<Vec<InboundDetail>>),
    NetworkValues(Arc<NetworkValues>),
}

/// Exposes a [`PoolDataSource`] as a keyed [`DataSource`]
struct PoolSourceAdapter(Arc<dyn PoolDataSource>);

#[async_trait]
impl DataSource<StateKey, StateValue> for PoolSourceAdapter {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn fetch(&self, key: &StateKey) -> Result<StateValue, SourceError> {
        Ok(match key {
            StateKey::Pools => StateValue::Pools(Arc::new(self.0.pools().await?)),
            StateKey::InboundAddresses => {
                StateValue::InboundAddresses(Arc::new(self.0.inbound_addresses().await?))
            }
            StateKey::NetworkValues => {
                StateValue::NetworkValues(Arc::new(self.0.network_values().await?))
            }
        })
    }
}

/// Everything an estimate reads, loaded together
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub pools: Arc<Vec<Pool>>,
    pub inbound: Arc<Vec<InboundDetail>>,
    pub network: Arc<NetworkValues>,
    /// At least one part was served stale
    pub stale: bool,
}

impl StateSnapshot {
    pub fn pool_for(&self, asset: &Asset) -> Option<&Pool> {
        self.pools.iter().find(|pool| pool.matches(asset))
    }

    pub fn inbound_for(&self, chain: &Chain) -> Option<&InboundDetail> {
        self.inbound.iter().find(|detail| &detail.chain == chain)
    }
}

#[derive(Debug, Clone)]
pub struct ProtocolStateCache {
    cache: ResilientCache<StateKey, StateValue>,
}

impl ProtocolStateCache {
    /// `sources` are in priority order (indexers first, then nodes)
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Arc<dyn PoolDataSource>>,
        config: &CacheConfig,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| Arc::new(PoolSourceAdapter(source)) as Arc<dyn DataSource<_, _>>)
            .collect();
        let policy = CachePolicy {
            ttl: Duration::from_secs(config.pools_ttl_secs),
            source_timeout: Duration::from_millis(config.source_timeout_ms),
            retries_per_source: config.retries_per_source,
        };
        let overrides = HashMap::from([
            (
                StateKey::InboundAddresses,
                Duration::from_secs(config.inbound_ttl_secs),
            ),
            (
                StateKey::NetworkValues,
                Duration::from_secs(config.network_ttl_secs),
            ),
        ]);
        Self {
            cache: ResilientCache::with_ttl_overrides(name, sources, policy, overrides),
        }
    }

    pub fn source_count(&self) -> usize {
        self.cache.source_count()
    }

    async fn load(&self, key: StateKey) -> Result<Cached<StateValue>, CacheError> {
        self.cache.get(&key).await
    }

    fn unexpected(&self, key: StateKey) -> CacheError {
        CacheError::UnexpectedValue {
            key: format!("{}/{:?}", self.cache.name(), key),
        }
    }

    async fn pools_cached(&self) -> Result<(Arc<Vec<Pool>>, bool), CacheError> {
        let cached = self.load(StateKey::Pools).await?;
        match cached.value {
            StateValue::Pools(pools) => Ok((pools, cached.stale)),
            _ => Err(self.unexpected(StateKey::Pools)),
        }
    }

    async fn inbound_cached(&self) -> Result<(Arc<Vec<InboundDetail>>, bool), CacheError> {
        let cached = self.load(StateKey::InboundAddresses).await?;
        match cached.value {
            StateValue::InboundAddresses(inbound) => Ok((inbound, cached.stale)),
            _ => Err(self.unexpected(StateKey::InboundAddresses)),
        }
    }

    async fn network_cached(&self) -> Result<(Arc<NetworkValues>, bool), CacheError> {
        let cached = self.load(StateKey::NetworkValues).await?;
        match cached.value {
            StateValue::NetworkValues(values) => Ok((values, cached.stale)),
            _ => Err(self.unexpected(StateKey::NetworkValues)),
        }
    }

    pub async fn pools(&self) -> Result<Arc<Vec<Pool>>, CacheError> {
        Ok(self.pools_cached().await?.0)
    }

    /// Pool backing `asset`; synth and trade assets resolve to their L1 pool
    pub async fn pool_for(&self, asset: &Asset) -> Result<Option<Pool>, CacheError> {
        let pools = self.pools().await?;
        Ok(pools.iter().find(|pool| pool.matches(asset)).cloned())
    }

    pub async fn inbound_details(&self) -> Result<Arc<Vec<InboundDetail>>, CacheError> {
        Ok(self.inbound_cached().await?.0)
    }

    pub async fn inbound_for(&self, chain: &Chain) -> Result<Option<InboundDetail>, CacheError> {
        let inbound = self.inbound_details().await?;
        Ok(inbound.iter().find(|detail| &detail.chain == chain).cloned())
    }

    pub async fn network_values(&self) -> Result<Arc<NetworkValues>, CacheError> {
        Ok(self.network_cached().await?.0)
    }

    pub async fn snapshot(&self) -> Result<StateSnapshot, CacheError> {
        let ((pools, pools_stale), (inbound, inbound_stale), (network, network_stale)) = tokio::try_join!(
            self.pools_cached(),
            self.inbound_cached(),
            self.network_cached(),
        )?;
        Ok(StateSnapshot {
            pools,
            inbound,
            network,
            stale: pools_stale || inbound_stale || network_stale,
        })
    }

    pub fn invalidate(&self, key: StateKey) {
        self.cache.invalidate(&key);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
