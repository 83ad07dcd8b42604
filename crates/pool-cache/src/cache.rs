//! TTL cache with ordered multi-source fallback and single-flight fetches
//!
//! On a miss every source is queried concurrently, each under its own
//! timeout, and the results are taken in priority order: the lowest-index
//! success wins. When every source fails the last known value is served as
//! stale; without one the caller gets [`CacheError::DataUnavailable`].
//!
//! All mutable state is per key (`DashMap`) and no map guard is held across
//! an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

use crate::source::{DataSource, SourceError};

/// Pause before retrying a transient source error
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    /// Budget for one source, retries included
    pub source_timeout: Duration,
    pub retries_per_source: u32,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(6),
            source_timeout: Duration::from_secs(3),
            retries_per_source: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    /// Index of the source that produced the value
    pub source_index: usize,
}

impl<V> CacheEntry<V> {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// A value returned by [`ResilientCache::get`]
#[derive(Debug, Clone)]
pub struct Cached<V> {
    pub value: V,
    pub source_index: usize,
    pub fetched_at: Instant,
    /// Served from an expired entry because every source failed
    pub stale: bool,
}

impl<V> Cached<V> {
    fn from_entry(entry: CacheEntry<V>, stale: bool) -> Self {
        Self {
            value: entry.value,
            source_index: entry.source_index,
            fetched_at: entry.fetched_at,
            stale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Data unavailable for {key}: {}", .attempts.join("; "))]
    DataUnavailable { key: String, attempts: Vec<String> },

    #[error("Unexpected value cached for {key}")]
    UnexpectedValue { key: String },
}

impl From<CacheError> for xroute_core::AdapterError {
    fn from(err: CacheError) -> Self {
        Self::QuoteUnavailable {
            reason: err.to_string(),
        }
    }
}

type FetchOutcome<V> = Result<CacheEntry<V>, Vec<String>>;
type SharedFetch<V> = Shared<BoxFuture<'static, FetchOutcome<V>>>;

/// Cache over an ordered list of data sources
pub struct ResilientCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

struct CacheInner<K, V> {
    name: String,
    sources: Vec<Arc<dyn DataSource<K, V>>>,
    policy: CachePolicy,
    ttl_overrides: HashMap<K, Duration>,
    entries: DashMap<K, CacheEntry<V>>,
    in_flight: DashMap<K, SharedFetch<V>>,
}

impl<K, V> Clone for ResilientCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Send + Sync, V: Send> fmt::Debug for ResilientCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.inner.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("ResilientCache")
            .field("name", &self.inner.name)
            .field("sources", &sources)
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl<K, V> ResilientCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Sources are in priority order; index 0 is the primary
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Arc<dyn DataSource<K, V>>>,
        policy: CachePolicy,
    ) -> Self {
        Self::with_ttl_overrides(name, sources, policy, HashMap::new())
    }

    /// Like [`new`](Self::new) with a different TTL for some keys
    pub fn with_ttl_overrides(
        name: impl Into<String>,
        sources: Vec<Arc<dyn DataSource<K, V>>>,
        policy: CachePolicy,
        ttl_overrides: HashMap<K, Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name: name.into(),
                sources,
                policy,
                ttl_overrides,
                entries: DashMap::new(),
                in_flight: DashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn source_count(&self) -> usize {
        self.inner.sources.len()
    }

    pub async fn get(&self, key: &K) -> Result<Cached<V>, CacheError> {
        let ttl = self.inner.ttl_for(key);
        if let Some(entry) = self.inner.fresh_entry(key, ttl) {
            return Ok(Cached::from_entry(entry, false));
        }

        match self.join_or_start(key, ttl).await {
            Ok(entry) => Ok(Cached::from_entry(entry, false)),
            Err(attempts) => {
                let last_known = self.inner.entries.get(key).map(|e| e.value().clone());
                match last_known {
                    Some(entry) => {
                        tracing::warn!(
                            cache = %self.inner.name,
                            key = ?key,
                            age_ms = entry.fetched_at.elapsed().as_millis() as u64,
                            "All sources failed, serving stale entry"
                        );
                        Ok(Cached::from_entry(entry, true))
                    }
                    None => Err(CacheError::DataUnavailable {
                        key: format!("{}/{:?}", self.inner.name, key),
                        attempts,
                    }),
                }
            }
        }
    }

    /// Force the next `get` for `key` to refetch
    pub fn invalidate(&self, key: &K) {
        self.inner.entries.remove(key);
    }

    pub fn invalidate_all(&self) {
        self.inner.entries.clear();
    }

    /// Current entry without triggering a fetch
    pub fn peek(&self, key: &K) -> Option<CacheEntry<V>> {
        self.inner.entries.get(key).map(|e| e.value().clone())
    }

    fn join_or_start(&self, key: &K, ttl: Duration) -> SharedFetch<V> {
        match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                tracing::debug!(cache = %self.inner.name, key = ?key, "Joining in-flight fetch");
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => {
                // A fetch may have landed between the freshness check and here
                if let Some(entry) = self.inner.fresh_entry(key, ttl) {
                    return futures::future::ready(Ok(entry)).boxed().shared();
                }
                let fetch = CacheInner::fetch(Arc::clone(&self.inner), key.clone())
                    .boxed()
                    .shared();
                vacant.insert(fetch.clone());
                fetch
            }
        }
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn ttl_for(&self, key: &K) -> Duration {
        self.ttl_overrides
            .get(key)
            .copied()
            .unwrap_or(self.policy.ttl)
    }

    fn fresh_entry(&self, key: &K, ttl: Duration) -> Option<CacheEntry<V>> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| entry.value().clone())
    }

    async fn fetch(self: Arc<Self>, key: K) -> FetchOutcome<V> {
        let outcome = self.fetch_from_sources(&key).await;
        if let Ok(entry) = &outcome {
            self.entries.insert(key.clone(), entry.clone());
        }
        self.in_flight.remove(&key);
        outcome
    }

    async fn fetch_from_sources(&self, key: &K) -> FetchOutcome<V> {
        if self.sources.is_empty() {
            return Err(vec!["no data sources configured".to_string()]);
        }

        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let key = key.clone();
                let policy = self.policy.clone();
                tokio::spawn(async move { fetch_with_retry(source.as_ref(), &key, &policy).await })
            })
            .collect();

        let mut attempts = Vec::new();
        let mut winner = None;
        for (index, handle) in handles.into_iter().enumerate() {
            if winner.is_some() {
                handle.abort();
                continue;
            }
            let source_name = self.sources[index].name();
            match handle.await {
                Ok(Ok(value)) => {
                    if index > 0 {
                        tracing::info!(
                            cache = %self.name,
                            key = ?key,
                            source = source_name,
                            "Served by fallback source"
                        );
                    }
                    winner = Some(CacheEntry {
                        value,
                        fetched_at: Instant::now(),
                        source_index: index,
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        cache = %self.name,
                        key = ?key,
                        source = source_name,
                        error = %e,
                        "Source fetch failed"
                    );
                    attempts.push(e.to_string());
                }
                Err(e) => {
                    attempts.push(format!("{}: fetch task failed: {}", source_name, e));
                }
            }
        }

        winner.ok_or(attempts)
    }
}

async fn fetch_with_retry<K, V>(
    source: &dyn DataSource<K, V>,
    key: &K,
    policy: &CachePolicy,
) -> Result<V, SourceError>
where
    K: Send + Sync,
    V: Send,
{
    let attempts = async {
        let mut retries = 0;
        loop {
            match source.fetch(key).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < policy.retries_per_source => {
                    retries += 1;
                    tracing::debug!(
                        source = source.name(),
                        error = %e,
                        retry = retries,
                        "Retrying transient source error"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * retries).await;
                }
                Err(e) => return Err(e),
            }
        }
    };

    tokio::time::timeout(policy.source_timeout, attempts)
        .await
        .map_err(|_| SourceError::Timeout {
            source_name: source.name().to_string(),
            after_ms: policy.source_timeout.as_millis() as u64,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum Mode {
        Value(u64),
        Fail(SourceError),
        /// Fail once with the error, then return the value
        FailOnce(SourceError, u64),
    }

    struct MockSource {
        name: &'static str,
        calls: AtomicUsize,
        delay: Duration,
        mode: Mutex<Mode>,
    }

    impl MockSource {
        fn new(name: &'static str, mode: Mode) -> Arc<Self> {
            Self::with_delay(name, mode, Duration::ZERO)
        }

        fn with_delay(name: &'static str, mode: Mode, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                delay,
                mode: Mutex::new(mode),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_mode(&self, mode: Mode) {
            *self.mode.lock().unwrap() = mode;
        }
    }

    #[async_trait]
    impl DataSource<&'static str, u64> for MockSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _key: &&'static str) -> Result<u64, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut mode = self.mode.lock().unwrap();
            match mode.clone() {
                Mode::Value(v) => Ok(v),
                Mode::Fail(e) => Err(e),
                Mode::FailOnce(e, v) => {
                    *mode = Mode::Value(v);
                    Err(e)
                }
            }
        }
    }

    fn server_error(name: &str) -> SourceError {
        SourceError::Http {
            source_name: name.to_string(),
            status: 500,
            url: "/pools".to_string(),
        }
    }

    fn policy(ttl: Duration) -> CachePolicy {
        CachePolicy {
            ttl,
            source_timeout: Duration::from_millis(500),
            retries_per_source: 0,
        }
    }

    fn cache(
        sources: Vec<Arc<MockSource>>,
        policy: CachePolicy,
    ) -> ResilientCache<&'static str, u64> {
        let sources = sources
            .into_iter()
            .map(|s| s as Arc<dyn DataSource<&'static str, u64>>)
            .collect();
        ResilientCache::new("test", sources, policy)
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary_and_caches() {
        let primary = MockSource::new("primary", Mode::Fail(server_error("primary")));
        let secondary = MockSource::new("secondary", Mode::Value(42));
        let cache = cache(
            vec![primary.clone(), secondary.clone()],
            policy(Duration::from_secs(60)),
        );

        let first = cache.get(&"pools").await.unwrap();
        assert_eq!(first.value, 42);
        assert_eq!(first.source_index, 1);
        assert!(!first.stale);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);

        let second = cache.get(&"pools").await.unwrap();
        assert_eq!(second.value, 42);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_prefers_primary_when_healthy() {
        let primary = MockSource::new("primary", Mode::Value(1));
        let secondary = MockSource::new("secondary", Mode::Value(2));
        let cache = cache(vec![primary, secondary], policy(Duration::from_secs(60)));

        let cached = cache.get(&"pools").await.unwrap();
        assert_eq!(cached.value, 1);
        assert_eq!(cached.source_index, 0);
    }

    #[tokio::test]
    async fn test_slow_primary_does_not_block_fallback_beyond_timeout() {
        let primary =
            MockSource::with_delay("primary", Mode::Value(1), Duration::from_secs(10));
        let secondary = MockSource::new("secondary", Mode::Value(2));
        let cache = cache(
            vec![primary, secondary],
            CachePolicy {
                ttl: Duration::from_secs(60),
                source_timeout: Duration::from_millis(100),
                retries_per_source: 0,
            },
        );

        let started = Instant::now();
        let cached = cache.get(&"pools").await.unwrap();
        assert_eq!(cached.value, 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_serves_stale_entry_when_all_sources_fail() {
        let source = MockSource::new("only", Mode::Value(7));
        let cache = cache(vec![source.clone()], policy(Duration::ZERO));

        let fresh = cache.get(&"pools").await.unwrap();
        assert!(!fresh.stale);

        source.set_mode(Mode::Fail(server_error("only")));
        let stale = cache.get(&"pools").await.unwrap();
        assert_eq!(stale.value, 7);
        assert!(stale.stale);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_data_unavailable_without_entry() {
        let primary = MockSource::new("primary", Mode::Fail(server_error("primary")));
        let secondary = MockSource::new("secondary", Mode::Fail(server_error("secondary")));
        let cache = cache(vec![primary, secondary], policy(Duration::from_secs(60)));

        match cache.get(&"pools").await {
            Err(CacheError::DataUnavailable { key, attempts }) => {
                assert_eq!(key, "test/\"pools\"");
                assert_eq!(attempts.len(), 2);
            }
            other => panic!("expected DataUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let source =
            MockSource::with_delay("slow", Mode::Value(9), Duration::from_millis(50));
        let cache = cache(vec![source.clone()], policy(Duration::from_secs(60)));

        let gets = (0..8).map(|_| cache.get(&"pools"));
        let results = futures::future::join_all(gets).await;

        assert!(results.iter().all(|r| r.as_ref().map(|c| c.value) == Ok(9)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let source = MockSource::new("only", Mode::Value(3));
        let cache = cache(vec![source.clone()], policy(Duration::from_secs(60)));

        cache.get(&"pools").await.unwrap();
        cache.get(&"pools").await.unwrap();
        assert_eq!(source.calls(), 1);

        cache.invalidate(&"pools");
        assert!(cache.peek(&"pools").is_none());
        cache.get(&"pools").await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_transient_errors_on_same_source() {
        let primary = MockSource::new("primary", Mode::FailOnce(server_error("primary"), 5));
        let cache = cache(
            vec![primary.clone()],
            CachePolicy {
                ttl: Duration::from_secs(60),
                source_timeout: Duration::from_secs(2),
                retries_per_source: 1,
            },
        );

        let cached = cache.get(&"pools").await.unwrap();
        assert_eq!(cached.value, 5);
        assert_eq!(cached.source_index, 0);
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let not_found = SourceError::NotFound {
            source_name: "primary".into(),
            what: "pools".into(),
        };
        let primary = MockSource::new("primary", Mode::Fail(not_found));
        let cache = cache(
            vec![primary.clone()],
            CachePolicy {
                ttl: Duration::from_secs(60),
                source_timeout: Duration::from_secs(2),
                retries_per_source: 3,
            },
        );

        assert!(cache.get(&"pools").await.is_err());
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_ttl_override_per_key() {
        let source = MockSource::new("only", Mode::Value(1));
        let sources: Vec<Arc<dyn DataSource<&'static str, u64>>> = vec![source.clone()];
        let cache = ResilientCache::with_ttl_overrides(
            "test",
            sources,
            policy(Duration::ZERO),
            HashMap::from([("network", Duration::from_secs(600))]),
        );

        cache.get(&"pools").await.unwrap();
        cache.get(&"pools").await.unwrap();
        assert_eq!(source.calls(), 2);

        cache.get(&"network").await.unwrap();
        cache.get(&"network").await.unwrap();
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn test_debug_lists_source_names() {
        let cache = cache(
            vec![
                MockSource::new("midgard", Mode::Value(1)),
                MockSource::new("thornode", Mode::Value(2)),
            ],
            policy(Duration::from_secs(5)),
        );
        let rendered = format!("{cache:?}");
        assert!(rendered.contains("ResilientCache"));
        assert!(rendered.contains("\"test\""));
        assert!(rendered.contains("[\"midgard\", \"thornode\"]"));
    }

    #[test]
    fn test_cache_error_maps_to_quote_unavailable() {
        let err = CacheError::DataUnavailable {
            key: "thorchain/Pools".into(),
            attempts: vec!["midgard timed out after 100ms".into()],
        };
        let adapter_err: xroute_core::AdapterError = err.into();
        assert!(adapter_err.is_unavailable());
    }
}
