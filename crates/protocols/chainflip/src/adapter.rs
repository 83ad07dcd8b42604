//! Chainflip protocol adapter
//!
//! Chainflip has no pools to model locally: quotes come from the backend and
//! funds go to a per-swap deposit channel opened through a broker. The
//! asset registry is cached for a day.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pool_cache::{CachePolicy, DataSource, ResilientCache, SourceError};
use xroute_core::{
    AdapterError, AdapterState, Asset, BaseAmount, Chain, ChainflipConfig, CryptoAmount,
    FeeBreakdown, Lifecycle, ProtocolAdapter, ProtocolId, StreamingParams, SwapQuote,
    SwapRequest, TransferParams, TxSubmitted, ValidationError, Wallet, WalletError,
};

use crate::api::{
    select_quote, BackendClient, BackendQuote, BrokerClient, ChainflipApi, ChainflipAsset,
    ChannelRequest, HttpChainflipApi, QuoteQuery,
};
use crate::assets::{find_asset, registry_chains};

pub const PROTOCOL: &str = "chainflip";

const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);

const EXPIRY_WARNING: &str = "Do not cache this response. Do not send funds after the expiry.";

const LOW_LIQUIDITY_WARNING: &str = "Do not cache this response. Do not send funds after the \
expiry. The difference in the chainflip swap rate (excluding fees) is lower than the global \
index rate of the swap by more than a certain threshold (currently set to 5%)";

pub type AssetRegistry = ResilientCache<(), Vec<ChainflipAsset>>;

pub struct ChainflipAdapter {
    api: Arc<dyn ChainflipApi>,
    registry: AssetRegistry,
    lifecycle: Lifecycle,
    wallet: Option<Arc<dyn Wallet>>,
    broker_commission_bps: u32,
    execution_timeout: Duration,
}

impl fmt::Debug for ChainflipAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainflipAdapter")
            .field("registry", &self.registry)
            .field("state", &self.lifecycle.state())
            .field("wallet", &self.wallet.is_some())
            .field("broker_commission_bps", &self.broker_commission_bps)
            .field("execution_timeout", &self.execution_timeout)
            .finish()
    }
}

impl ChainflipAdapter {
    pub fn new(api: Arc<dyn ChainflipApi>, registry: AssetRegistry) -> Self {
        Self {
            api,
            registry,
            lifecycle: Lifecycle::new(),
            wallet: None,
            broker_commission_bps: 0,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    /// Adapter over the configured backends and broker
    pub fn from_config(config: &ChainflipConfig, client: &reqwest::Client) -> Self {
        let source_timeout = Duration::from_millis(config.source_timeout_ms);
        let backends = config
            .backend_urls
            .iter()
            .map(|url| {
                BackendClient::new(url.clone(), client.clone()).with_request_timeout(source_timeout)
            })
            .collect();
        let broker = config
            .broker_url
            .as_ref()
            .map(|url| BrokerClient::new(url.clone(), client.clone()));
        let api = HttpChainflipApi::new(backends, broker);

        let policy = CachePolicy {
            ttl: Duration::from_secs(config.registry_ttl_secs),
            source_timeout,
            retries_per_source: config.retries_per_source,
        };
        let registry = ResilientCache::new("chainflip/assets", api.registry_sources(), policy);

        Self::new(Arc::new(api), registry).with_broker_commission_bps(config.broker_commission_bps)
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Commission used when a request carries no affiliate
    pub fn with_broker_commission_bps(mut self, bps: u32) -> Self {
        self.broker_commission_bps = bps;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    fn commission_bps(&self, request: &SwapRequest) -> u32 {
        request
            .affiliate
            .as_ref()
            .map_or(self.broker_commission_bps, |affiliate| affiliate.bps)
    }

    async fn registry(&self) -> Result<Vec<ChainflipAsset>, AdapterError> {
        let cached = self.registry.get(&()).await?;
        self.lifecycle.mark_ready();
        Ok(cached.value)
    }

    async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote, AdapterError> {
        let _phase = self.lifecycle.begin_estimate();
        let protocol = self.id();

        let mut errors = request.shape_errors();
        for asset in [&request.from_asset, &request.destination_asset] {
            if asset.is_synth() || asset.is_trade() {
                errors.push(unsupported(asset));
            }
        }
        if !errors.is_empty() {
            return Ok(SwapQuote::rejected(protocol, request, request.amount.decimals(), errors));
        }

        let registry = self.registry().await?;
        let source = find_asset(&registry, &request.from_asset);
        let destination = find_asset(&registry, &request.destination_asset);
        let (source, destination) = match (source, destination) {
            (Some(source), Some(destination)) => (source, destination),
            (source, destination) => {
                let output_decimals = destination.map_or(request.amount.decimals(), |d| d.decimals);
                let mut errors = Vec::new();
                if source.is_none() {
                    errors.push(unsupported(&request.from_asset));
                }
                if destination.is_none() {
                    errors.push(unsupported(&request.destination_asset));
                }
                return Ok(SwapQuote::rejected(protocol, request, output_decimals, errors));
            }
        };

        let dust = BaseAmount::new(source.minimum_swap_amount, source.decimals);
        let rejected = |errors: Vec<ValidationError>| {
            let mut quote =
                SwapQuote::rejected(protocol.clone(), request, destination.decimals, errors);
            quote.dust_threshold = CryptoAmount::new(request.from_asset.clone(), dust);
            quote
        };

        let input = match request.amount.amount.rescale_floor(source.decimals) {
            Ok(input) if input.is_zero() => return Ok(rejected(vec![ValidationError::ZeroAmount])),
            Ok(input) => input,
            Err(e) => return Ok(rejected(vec![rejection(e.to_string())])),
        };
        if input.cmp_value(&dust).is_lt() {
            return Ok(rejected(vec![ValidationError::BelowDust {
                amount: input.to_string(),
                threshold: dust.to_string(),
            }]));
        }

        let query = QuoteQuery {
            source: source.into(),
            destination: destination.into(),
            amount: input.amount,
            broker_commission_bps: self.commission_bps(request),
        };
        let quotes = match self.api.quote(&query).await {
            Ok(quotes) => quotes,
            Err(e) if e.is_transient() => {
                return Err(AdapterError::QuoteUnavailable {
                    reason: e.to_string(),
                })
            }
            Err(e) => return Ok(rejected(vec![rejection(e.to_string())])),
        };
        let Some(backend_quote) = select_quote(quotes) else {
            return Ok(rejected(vec![rejection("Chainflip returned no quote")]));
        };

        let quote = build_quote(protocol, request, destination, dust, &backend_quote);
        tracing::debug!(
            protocol = PROTOCOL,
            from = %request.from_asset,
            to = %request.destination_asset,
            expected = %quote.expected_amount,
            kind = ?backend_quote.kind,
            can_swap = quote.can_swap,
            "Estimated swap"
        );
        Ok(quote)
    }

    async fn timed<T, E>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, AdapterError>
    where
        AdapterError: From<E>,
    {
        let limit = self.execution_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(AdapterError::from),
            Err(_) => Err(AdapterError::Execution(WalletError::Broadcast {
                message: format!("{} did not finish within {}ms", what, limit.as_millis()),
            })),
        }
    }

    async fn open_channel(&self, request: ChannelRequest) -> Result<String, AdapterError> {
        let channel = self
            .timed("deposit channel request", async {
                self.api
                    .open_deposit_channel(&request)
                    .await
                    .map_err(channel_error)
            })
            .await?;
        tracing::debug!(
            address = %channel.address,
            channel_id = ?channel.channel_id,
            expiry_block = ?channel.source_chain_expiry_block,
            "Opened deposit channel"
        );
        Ok(channel.address)
    }
}

fn unsupported(asset: &Asset) -> ValidationError {
    ValidationError::UnsupportedAsset {
        asset: asset.to_string(),
    }
}

fn rejection(reason: impl Into<String>) -> ValidationError {
    ValidationError::QuoteRejected {
        reason: reason.into(),
    }
}

fn channel_error(err: SourceError) -> AdapterError {
    if err.is_transient() {
        AdapterError::QuoteUnavailable {
            reason: err.to_string(),
        }
    } else {
        AdapterError::CannotSwap {
            errors: vec![rejection(err.to_string())],
        }
    }
}

fn ceil_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.ceil() as u64
    } else {
        0
    }
}

fn build_quote(
    protocol: ProtocolId,
    request: &SwapRequest,
    destination: &ChainflipAsset,
    dust: BaseAmount,
    backend: &BackendQuote,
) -> SwapQuote {
    let decimals = destination.decimals;
    let (mut outbound, mut affiliate, mut liquidity) = (0u128, 0u128, 0u128);
    for fee in &backend.included_fees {
        let in_destination = fee.chain.eq_ignore_ascii_case(&destination.chain)
            && fee.asset.eq_ignore_ascii_case(&destination.asset);
        if !in_destination {
            tracing::debug!(
                kind = %fee.kind,
                asset = %fee.asset,
                amount = %fee.amount,
                "Skipping fee outside the destination asset"
            );
            continue;
        }
        let bucket = match fee.kind.to_ascii_uppercase().as_str() {
            "EGRESS" => &mut outbound,
            "BROKER" => &mut affiliate,
            _ => &mut liquidity,
        };
        *bucket = bucket.saturating_add(fee.amount);
    }

    let mut errors = Vec::new();
    if backend.egress_amount == 0 {
        errors.push(ValidationError::FeesExceedOutput);
    }

    let (inbound_seconds, outbound_seconds) = backend
        .estimated_durations_seconds
        .map_or((0, 0), |d| (ceil_seconds(d.deposit), ceil_seconds(d.egress)));
    let warning = if backend.low_liquidity_warning {
        LOW_LIQUIDITY_WARNING
    } else {
        EXPIRY_WARNING
    };

    SwapQuote {
        protocol,
        to_address: String::new(),
        memo: String::new(),
        expected_amount: CryptoAmount::new(
            request.destination_asset.clone(),
            BaseAmount::new(backend.egress_amount, decimals),
        ),
        dust_threshold: CryptoAmount::new(request.from_asset.clone(), dust),
        fees: FeeBreakdown {
            asset: request.destination_asset.clone(),
            inbound_fee: BaseAmount::zero(decimals),
            outbound_fee: BaseAmount::new(outbound, decimals),
            affiliate_fee: BaseAmount::new(affiliate, decimals),
            liquidity_fee: BaseAmount::new(liquidity, decimals),
        },
        slip_bps: 0,
        inbound_confirmation_seconds: inbound_seconds,
        outbound_delay_seconds: outbound_seconds,
        total_swap_seconds: ceil_seconds(backend.estimated_duration_seconds),
        streaming: backend.dca_params.map(|dca| StreamingParams {
            interval: dca.chunk_interval_blocks,
            quantity: dca.number_of_chunks,
        }),
        expires_in_seconds: None,
        can_swap: false,
        errors,
        warning: Some(warning.to_string()),
    }
    .finalize()
}

#[async_trait]
impl ProtocolAdapter for ChainflipAdapter {
    fn id(&self) -> ProtocolId {
        ProtocolId::new(PROTOCOL)
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    async fn is_asset_supported(&self, asset: &Asset) -> Result<bool, AdapterError> {
        if asset.is_synth() || asset.is_trade() {
            return Ok(false);
        }
        let registry = self.registry().await?;
        Ok(find_asset(&registry, asset).is_some())
    }

    async fn supported_chains(&self) -> Result<Vec<Chain>, AdapterError> {
        let registry = self.registry().await?;
        Ok(registry_chains(&registry))
    }

    async fn estimate_swap(&self, request: &SwapRequest) -> Result<SwapQuote, AdapterError> {
        self.quote(request).await
    }

    async fn do_swap(&self, request: &SwapRequest) -> Result<TxSubmitted, AdapterError> {
        let quote = self.quote(request).await?;
        if !quote.can_swap {
            return Err(AdapterError::CannotSwap {
                errors: quote.errors,
            });
        }
        let wallet = self
            .wallet
            .as_deref()
            .ok_or(AdapterError::WalletNotConfigured)?;

        let _phase = self.lifecycle.begin_execute();
        let registry = self.registry().await?;
        let (Some(source), Some(destination)) = (
            find_asset(&registry, &request.from_asset),
            find_asset(&registry, &request.destination_asset),
        ) else {
            return Err(AdapterError::QuoteUnavailable {
                reason: "asset registry changed during the swap".to_string(),
            });
        };

        let chain = request.from_asset.chain().clone();
        let refund_address = match &request.from_address {
            Some(address) => address.clone(),
            None => self.timed("wallet address", wallet.address(&chain)).await?,
        };
        let deposit_address = self
            .open_channel(ChannelRequest {
                source: source.into(),
                destination: destination.into(),
                destination_address: request.destination_address.clone(),
                broker_commission_bps: self.commission_bps(request),
                refund_address: Some(refund_address),
            })
            .await?;

        let hash = self
            .timed(
                "wallet transfer",
                wallet.transfer(TransferParams {
                    amount: request.amount.clone(),
                    recipient: deposit_address,
                    memo: String::new(),
                    router: None,
                }),
            )
            .await?;
        // funds are already in flight; a missing link must not hide the hash
        let url = wallet.explorer_tx_url(&chain, &hash).unwrap_or_else(|e| {
            tracing::warn!(
                protocol = PROTOCOL,
                chain = %chain,
                hash = %hash,
                error = %e,
                "No explorer URL for submitted swap"
            );
            String::new()
        });
        tracing::info!(protocol = PROTOCOL, chain = %chain, hash = %hash, "Swap submitted");
        Ok(TxSubmitted {
            hash: hash.to_string(),
            url,
        })
    }
}

/// Registry source serving a fixed asset list
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    assets: Vec<ChainflipAsset>,
}

impl StaticRegistry {
    pub fn new(assets: Vec<ChainflipAsset>) -> Self {
        Self { assets }
    }

    pub fn into_cache(self) -> AssetRegistry {
        ResilientCache::new(
            "chainflip/assets",
            vec![Arc::new(self) as Arc<dyn DataSource<(), Vec<ChainflipAsset>>>],
            CachePolicy::default(),
        )
    }
}

#[async_trait]
impl DataSource<(), Vec<ChainflipAsset>> for StaticRegistry {
    fn name(&self) -> &str {
        "static registry"
    }

    async fn fetch(&self, _key: &()) -> Result<Vec<ChainflipAsset>, SourceError> {
        Ok(self.assets.clone())
    }
}
