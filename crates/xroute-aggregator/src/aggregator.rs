//! Quote fan-out across protocols
//!
//! Every adapter gets its own task: a support check for both assets, then an
//! estimate, bounded by the per-adapter timeout. The whole fan-out is bounded
//! by the aggregate deadline; whatever finished by then is kept, the rest is
//! reported as failed. Failures never turn into an error of the aggregate.
//!
//! Swap history fans out the same way; protocols without an indexer are
//! left out silently.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};
use xroute_core::{
    AdapterError, AffiliateParams, AggregatorConfig, Asset, BaseAmount, Chain, ChainAddress,
    CryptoAmount, ProtocolAdapter, ProtocolId, SwapQuote, SwapRecord, SwapRequest, TxSubmitted,
    Wallet,
};

use crate::builder::build_adapters;
use crate::error::AggregatorError;

/// A protocol that produced no quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterFailure {
    pub protocol: ProtocolId,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedQuotes {
    /// Ranked: swappable first, then by expected output
    pub quotes: Vec<SwapQuote>,
    pub failures: Vec<AdapterFailure>,
    pub partial_failure: bool,
}

impl AggregatedQuotes {
    /// Top-ranked quote, if it can be executed
    pub fn best(&self) -> Option<&SwapQuote> {
        self.quotes.first().filter(|quote| quote.can_swap)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedHistory {
    /// Newest first
    pub swaps: Vec<SwapRecord>,
    /// Sum of the totals reported per protocol
    pub count: u64,
    pub failures: Vec<AdapterFailure>,
}

enum Outcome {
    Quote(SwapQuote),
    Excluded,
    Failed { code: &'static str, message: String },
}

pub struct Aggregator {
    adapters: Vec<Arc<dyn ProtocolAdapter>>,
    adapter_timeout: Duration,
    deadline: Duration,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<ProtocolId> = self.adapters.iter().map(|a| a.id()).collect();
        f.debug_struct("Aggregator")
            .field("adapters", &ids)
            .field("adapter_timeout", &self.adapter_timeout)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Aggregator {
    pub fn new(
        adapters: Vec<Arc<dyn ProtocolAdapter>>,
        adapter_timeout: Duration,
        deadline: Duration,
    ) -> Result<Self, AggregatorError> {
        if adapter_timeout >= deadline {
            return Err(AggregatorError::Config(format!(
                "adapter timeout ({}ms) must be below the aggregate deadline ({}ms)",
                adapter_timeout.as_millis(),
                deadline.as_millis()
            )));
        }
        Ok(Self {
            adapters,
            adapter_timeout,
            deadline,
        })
    }

    /// Aggregator over every protocol enabled in `config`
    pub fn from_config(
        config: &AggregatorConfig,
        client: &reqwest::Client,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> Result<Self, AggregatorError> {
        config.validate()?;
        let affiliate = config.affiliate.as_ref().map(|a| AffiliateParams {
            address: a.address.clone(),
            bps: a.bps,
        });
        let adapters = build_adapters(config, client, wallet, affiliate);
        info!(
            adapters = adapters.len(),
            deadline_ms = config.aggregate_deadline_ms,
            "Aggregator configured"
        );
        Self::new(
            adapters,
            Duration::from_millis(config.adapter_timeout_ms),
            Duration::from_millis(config.aggregate_deadline_ms),
        )
    }

    pub fn adapters(&self) -> &[Arc<dyn ProtocolAdapter>] {
        &self.adapters
    }

    pub fn adapter(&self, protocol: &ProtocolId) -> Option<&Arc<dyn ProtocolAdapter>> {
        self.adapters.iter().find(|adapter| &adapter.id() == protocol)
    }

    /// Quote `request` on every protocol that supports both assets
    pub async fn estimate_swap(&self, request: &SwapRequest) -> AggregatedQuotes {
        info!(
            from = %request.from_asset,
            to = %request.destination_asset,
            amount = %request.amount.amount,
            adapters = self.adapters.len(),
            "Fetching quotes"
        );
        let deadline = Instant::now() + self.deadline;

        let mut pending = FuturesUnordered::new();
        let mut aborts = Vec::with_capacity(self.adapters.len());
        let mut remaining = BTreeSet::new();
        for adapter in &self.adapters {
            let id = adapter.id();
            let handle = tokio::spawn(evaluate(
                Arc::clone(adapter),
                request.clone(),
                self.adapter_timeout,
            ));
            aborts.push(handle.abort_handle());
            remaining.insert(id.clone());
            pending.push(async move { (id, handle.await) });
        }

        let mut result = AggregatedQuotes::default();
        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((id, joined))) => {
                    remaining.remove(&id);
                    match joined {
                        Ok(Outcome::Quote(quote)) => result.quotes.push(quote),
                        Ok(Outcome::Excluded) => {}
                        Ok(Outcome::Failed { code, message }) => {
                            warn!(protocol = %id, code, error = %message, "Adapter failed");
                            result.failures.push(AdapterFailure {
                                protocol: id,
                                code: code.to_string(),
                                message,
                            });
                        }
                        Err(e) => {
                            warn!(protocol = %id, error = %e, "Adapter task aborted");
                            result.failures.push(AdapterFailure {
                                protocol: id,
                                code: "task_failed".to_string(),
                                message: e.to_string(),
                            });
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        deadline_ms = self.deadline.as_millis() as u64,
                        unfinished = remaining.len(),
                        "Aggregate deadline reached"
                    );
                    for handle in &aborts {
                        handle.abort();
                    }
                    for id in std::mem::take(&mut remaining) {
                        result.failures.push(AdapterFailure {
                            protocol: id,
                            code: "timeout".to_string(),
                            message: format!(
                                "no answer before the {}ms deadline",
                                self.deadline.as_millis()
                            ),
                        });
                    }
                    break;
                }
            }
        }

        rank_quotes(&mut result.quotes);
        result.failures.sort_by(|a, b| a.protocol.cmp(&b.protocol));
        result.partial_failure = !result.failures.is_empty();
        info!(
            quotes = result.quotes.len(),
            failures = result.failures.len(),
            "Quote aggregation completed"
        );
        result
    }

    fn require(
        &self,
        protocol: &ProtocolId,
    ) -> Result<&Arc<dyn ProtocolAdapter>, AggregatorError> {
        self.adapter(protocol)
            .ok_or_else(|| AggregatorError::UnknownProtocol {
                protocol: protocol.to_string(),
            })
    }

    /// Execute on exactly one protocol
    pub async fn do_swap(
        &self,
        protocol: &ProtocolId,
        request: &SwapRequest,
    ) -> Result<TxSubmitted, AggregatorError> {
        Ok(self.require(protocol)?.do_swap(request).await?)
    }

    /// Whether `protocol`'s router needs an allowance from `address` first
    pub async fn should_be_approved(
        &self,
        protocol: &ProtocolId,
        amount: &CryptoAmount,
        address: &str,
    ) -> Result<bool, AggregatorError> {
        Ok(self
            .require(protocol)?
            .should_be_approved(amount, address)
            .await?)
    }

    /// Grant `protocol`'s router an allowance; `None` approves the maximum
    pub async fn approve_router_to_spend(
        &self,
        protocol: &ProtocolId,
        asset: &Asset,
        amount: Option<BaseAmount>,
    ) -> Result<TxSubmitted, AggregatorError> {
        Ok(self
            .require(protocol)?
            .approve_router_to_spend(asset, amount)
            .await?)
    }

    /// Swaps of `addresses` across every protocol with an indexer
    pub async fn swap_history(&self, addresses: &[ChainAddress]) -> AggregatedHistory {
        let lookups = self.adapters.iter().map(|adapter| async move {
            let id = adapter.id();
            let outcome = timeout(self.adapter_timeout, adapter.swap_history(addresses)).await;
            (id, outcome)
        });

        let mut result = AggregatedHistory::default();
        for (id, outcome) in join_all(lookups).await {
            match outcome {
                Ok(Ok(history)) => {
                    result.count += history.count;
                    result.swaps.extend(history.swaps);
                }
                Ok(Err(AdapterError::NotSupported { .. })) => {
                    debug!(protocol = %id, "Swap history not supported");
                }
                Ok(Err(e)) => {
                    warn!(protocol = %id, error = %e, "Swap history failed");
                    result.failures.push(AdapterFailure {
                        protocol: id,
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(protocol = %id, "Swap history timed out");
                    result.failures.push(AdapterFailure {
                        protocol: id,
                        code: "timeout".to_string(),
                        message: format!(
                            "no answer within {}ms",
                            self.adapter_timeout.as_millis()
                        ),
                    });
                }
            }
        }
        result.swaps.sort_by(|a, b| b.date_ms.cmp(&a.date_ms));
        info!(
            swaps = result.swaps.len(),
            failures = result.failures.len(),
            "Swap history collected"
        );
        result
    }

    /// Sorted union of every adapter's chains; failing adapters are skipped
    pub async fn supported_chains(&self) -> Vec<Chain> {
        let lookups = self.adapters.iter().map(|adapter| async move {
            match timeout(self.adapter_timeout, adapter.supported_chains()).await {
                Ok(Ok(chains)) => chains,
                Ok(Err(e)) => {
                    warn!(protocol = %adapter.id(), error = %e, "Skipping supported chains");
                    Vec::new()
                }
                Err(_) => {
                    warn!(protocol = %adapter.id(), "Supported chains lookup timed out");
                    Vec::new()
                }
            }
        });
        let chains: BTreeSet<Chain> = join_all(lookups).await.into_iter().flatten().collect();
        chains.into_iter().collect()
    }
}

async fn evaluate(
    adapter: Arc<dyn ProtocolAdapter>,
    request: SwapRequest,
    limit: Duration,
) -> Outcome {
    let id = adapter.id();
    let work = async {
        let (from, to) = tokio::join!(
            adapter.is_asset_supported(&request.from_asset),
            adapter.is_asset_supported(&request.destination_asset),
        );
        for (asset, supported) in [(&request.from_asset, from), (&request.destination_asset, to)] {
            match supported {
                Ok(true) => {}
                Ok(false) => {
                    debug!(protocol = %id, asset = %asset, "Asset not supported");
                    return Outcome::Excluded;
                }
                Err(e) => {
                    warn!(
                        protocol = %id,
                        asset = %asset,
                        error = %e,
                        "Support check failed, keeping candidate"
                    );
                }
            }
        }
        match adapter.estimate_swap(&request).await {
            Ok(quote) => Outcome::Quote(quote),
            Err(e) => Outcome::Failed {
                code: e.error_code(),
                message: e.to_string(),
            },
        }
    };

    match timeout(limit, work).await {
        Ok(outcome) => outcome,
        Err(_) => Outcome::Failed {
            code: "timeout",
            message: format!("no answer within {}ms", limit.as_millis()),
        },
    }
}

/// Swappable first, then larger output, then protocol id
pub fn rank_quotes(quotes: &mut [SwapQuote]) {
    quotes.sort_by(|a, b| {
        b.can_swap
            .cmp(&a.can_swap)
            .then_with(|| b.expected_amount.amount.cmp_value(&a.expected_amount.amount))
            .then_with(|| a.protocol.cmp(&b.protocol))
    });
}
