//! Protocol adapter shared by the constant-product networks
//!
//! [`ClpAdapter`] owns the cached network state, the indexers used for swap
//! history and an optional wallet, and delegates everything network-specific
//! to its [`ClpNetwork`]. Inbound deposits on router chains go through the
//! router contract; contract tokens need a router allowance first.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use pool_cache::{
    ActionSource, ActionsPage, IndexerSource, NodeSource, PoolDataSource, ProtocolStateCache,
    StateKey,
};
use xroute_core::{
    AdapterError, AdapterState, AffiliateParams, AllowanceQuery, AmmProtocolConfig,
    ApproveParams, Asset, AssetKind, BaseAmount, Chain, ChainAddress, CryptoAmount,
    DepositParams, Lifecycle, ProtocolAdapter, ProtocolId, RouterDeposit, SwapHistory, SwapQuote,
    SwapRequest, TransferParams, TxHash, TxSubmitted, ValidationError, Wallet, WalletError,
};

use crate::constants::{gas_model, GasModel, ROUTER_DEPOSIT_TTL_SECS};
use crate::estimator::{estimate, EstimateContext};
use crate::history::swap_records;
use crate::state::ClpNetwork;

/// Default deadline for a single wallet call
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Fee and execution settings of one adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClpSettings {
    pub liquidity_fee_bps: u32,
    pub interface_tag: Option<u16>,
    /// Applied to requests that carry no affiliate
    pub default_affiliate: Option<AffiliateParams>,
    pub execution_timeout: Duration,
}

impl Default for ClpSettings {
    fn default() -> Self {
        Self {
            liquidity_fee_bps: 0,
            interface_tag: None,
            default_affiliate: None,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }
}

impl ClpSettings {
    pub fn from_config(config: &AmmProtocolConfig) -> Self {
        Self {
            liquidity_fee_bps: config.liquidity_fee_bps,
            interface_tag: config.interface_tag,
            ..Self::default()
        }
    }

    pub fn with_default_affiliate(mut self, affiliate: Option<AffiliateParams>) -> Self {
        self.default_affiliate = affiliate;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }
}

/// Indexer sources first, then node sources, in configuration order
pub fn sources_from_config<N: ClpNetwork>(
    network: &N,
    config: &AmmProtocolConfig,
    client: &reqwest::Client,
) -> Vec<Arc<dyn PoolDataSource>> {
    let flavor = network.flavor();
    let indexers = config.indexer_urls.iter().map(|url| {
        Arc::new(IndexerSource::new(url.clone(), flavor, client.clone())) as Arc<dyn PoolDataSource>
    });
    let nodes = config.node_urls.iter().map(|url| {
        Arc::new(NodeSource::new(url.clone(), flavor, client.clone())) as Arc<dyn PoolDataSource>
    });
    indexers.chain(nodes).collect()
}

/// Indexers answering swap history, in configuration order
pub fn history_sources_from_config<N: ClpNetwork>(
    network: &N,
    config: &AmmProtocolConfig,
    client: &reqwest::Client,
) -> Vec<Arc<dyn ActionSource>> {
    let flavor = network.flavor();
    config
        .indexer_urls
        .iter()
        .map(|url| {
            Arc::new(IndexerSource::new(url.clone(), flavor, client.clone()))
                as Arc<dyn ActionSource>
        })
        .collect()
}

/// Contract tokens on EVM chains move through the router and need an allowance
fn needs_allowance(asset: &Asset) -> bool {
    asset.kind() == AssetKind::Token && gas_model(asset.chain()) == GasModel::Evm
}

fn router_expiry() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    now + ROUTER_DEPOSIT_TTL_SECS
}

pub struct ClpAdapter<N: ClpNetwork> {
    network: N,
    cache: ProtocolStateCache,
    history_sources: Vec<Arc<dyn ActionSource>>,
    lifecycle: Lifecycle,
    wallet: Option<Arc<dyn Wallet>>,
    settings: ClpSettings,
}

impl<N: ClpNetwork> fmt::Debug for ClpAdapter<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClpAdapter")
            .field("network", &self.network)
            .field("cache", &self.cache)
            .field("history_sources", &self.history_sources.len())
            .field("state", &self.lifecycle.state())
            .field("wallet", &self.wallet.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl<N: ClpNetwork> ClpAdapter<N> {
    pub fn new(network: N, cache: ProtocolStateCache, settings: ClpSettings) -> Self {
        Self {
            network,
            cache,
            history_sources: Vec::new(),
            lifecycle: Lifecycle::new(),
            wallet: None,
            settings,
        }
    }

    /// Adapter backed by the indexer and node URLs of `config`
    pub fn from_config(network: N, config: &AmmProtocolConfig, client: &reqwest::Client) -> Self {
        let sources = sources_from_config(&network, config, client);
        let history = history_sources_from_config(&network, config, client);
        let cache = ProtocolStateCache::new(network.protocol_id().0, sources, &config.cache);
        Self::new(network, cache, ClpSettings::from_config(config)).with_history_sources(history)
    }

    pub fn with_history_sources(mut self, sources: Vec<Arc<dyn ActionSource>>) -> Self {
        self.history_sources = sources;
        self
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_settings(mut self, settings: ClpSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn cache(&self) -> &ProtocolStateCache {
        &self.cache
    }

    pub fn settings(&self) -> &ClpSettings {
        &self.settings
    }

    fn effective_request(&self, request: &SwapRequest) -> SwapRequest {
        let mut request = request.clone();
        if request.affiliate.is_none() {
            request.affiliate = self.settings.default_affiliate.clone();
        }
        request
    }

    async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote, AdapterError> {
        let _phase = self.lifecycle.begin_estimate();
        let snapshot = self.cache.snapshot().await?;
        self.lifecycle.mark_ready();

        let ctx = EstimateContext {
            network: &self.network,
            snapshot: &snapshot,
            liquidity_fee_bps: self.settings.liquidity_fee_bps,
            interface_tag: self.settings.interface_tag,
        };
        let mut quote = estimate(&ctx, request);
        if let Some(error) = self.allowance_error(request).await {
            quote.errors.push(error);
            quote = quote.finalize();
        }
        tracing::debug!(
            protocol = %quote.protocol,
            from = %request.from_asset,
            to = %request.destination_asset,
            expected = %quote.expected_amount,
            can_swap = quote.can_swap,
            "Estimated swap"
        );
        Ok(quote)
    }

    /// Reported on quotes for contract tokens the router may not spend yet
    async fn allowance_error(&self, request: &SwapRequest) -> Option<ValidationError> {
        let owner = request.from_address.as_deref()?;
        if self.wallet.is_none() || !needs_allowance(&request.from_asset) {
            return None;
        }
        match self.missing_allowance(&request.amount, owner).await {
            Ok(router) => router.map(|router| ValidationError::RouterNotApproved { router }),
            Err(e) => {
                tracing::warn!(
                    protocol = %self.network.protocol_id(),
                    asset = %request.from_asset,
                    error = %e,
                    "Router allowance check failed"
                );
                None
            }
        }
    }

    /// The router still lacking an allowance over `amount` from `owner`
    async fn missing_allowance(
        &self,
        amount: &CryptoAmount,
        owner: &str,
    ) -> Result<Option<String>, AdapterError> {
        let wallet = self
            .wallet
            .as_deref()
            .ok_or(AdapterError::WalletNotConfigured)?;
        let router = self.router_for(amount.asset.chain()).await?;
        let approved = self
            .wallet_call(wallet.is_approved(AllowanceQuery {
                amount: amount.clone(),
                owner: owner.to_string(),
                spender: router.clone(),
            }))
            .await?;
        Ok((!approved).then_some(router))
    }

    async fn router_for(&self, chain: &Chain) -> Result<String, AdapterError> {
        self.cache
            .inbound_for(chain)
            .await?
            .and_then(|inbound| inbound.router)
            .ok_or_else(|| AdapterError::QuoteUnavailable {
                reason: format!("Unknown router for {}", chain),
            })
    }

    /// First indexer that answers, in configuration order
    async fn swap_actions(&self, addresses: &[String]) -> Result<ActionsPage, AdapterError> {
        let mut attempts = Vec::with_capacity(self.history_sources.len());
        for source in &self.history_sources {
            match source.swap_actions(addresses).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "Swap history lookup failed");
                    attempts.push(e.to_string());
                }
            }
        }
        Err(AdapterError::QuoteUnavailable {
            reason: format!("swap history unavailable: {}", attempts.join("; ")),
        })
    }

    /// The hash is reported even when the wallet cannot build an explorer link
    fn submitted(&self, wallet: &dyn Wallet, chain: &Chain, hash: TxHash) -> TxSubmitted {
        let url = wallet.explorer_tx_url(chain, &hash).unwrap_or_else(|e| {
            tracing::warn!(
                protocol = %self.network.protocol_id(),
                chain = %chain,
                hash = %hash,
                error = %e,
                "No explorer URL for submitted transaction"
            );
            String::new()
        });
        TxSubmitted {
            hash: hash.to_string(),
            url,
        }
    }

    async fn wallet_call<T>(
        &self,
        fut: impl Future<Output = Result<T, WalletError>>,
    ) -> Result<T, WalletError> {
        let limit = self.settings.execution_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(WalletError::Broadcast {
                message: format!("wallet did not answer within {}ms", limit.as_millis()),
            }),
        }
    }

    /// Send the swap to the vault currently serving the source chain,
    /// through its router where the chain has one
    async fn transfer_to_vault(
        &self,
        wallet: &dyn Wallet,
        request: &SwapRequest,
        memo: String,
    ) -> Result<(Chain, TxHash), AdapterError> {
        let chain = request.from_asset.chain().clone();
        // vaults rotate; never broadcast to an address older than this call
        self.cache.invalidate(StateKey::InboundAddresses);
        let inbound = self
            .cache
            .inbound_for(&chain)
            .await?
            .ok_or_else(|| AdapterError::QuoteUnavailable {
                reason: format!("No inbound address for {}", chain),
            })?;
        if inbound.halted_chain || inbound.halted_trading {
            return Err(AdapterError::CannotSwap {
                errors: vec![ValidationError::TradingHalted {
                    chain: chain.to_string(),
                }],
            });
        }

        let router = match inbound.router {
            Some(router) => Some(RouterDeposit {
                router,
                expiry: router_expiry(),
            }),
            None if gas_model(&chain) == GasModel::Evm => {
                return Err(AdapterError::QuoteUnavailable {
                    reason: format!("Unknown router for {}", chain),
                });
            }
            None => None,
        };

        let hash = self
            .wallet_call(wallet.transfer(TransferParams {
                amount: request.amount.clone(),
                recipient: inbound.address,
                memo,
                router,
            }))
            .await?;
        Ok((chain, hash))
    }
}

#[async_trait]
impl<N: ClpNetwork> ProtocolAdapter for ClpAdapter<N> {
    fn id(&self) -> ProtocolId {
        self.network.protocol_id()
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    async fn is_asset_supported(&self, asset: &Asset) -> Result<bool, AdapterError> {
        if let Some(answer) = self.network.support_override(asset) {
            return Ok(answer);
        }
        if self.network.is_settlement(asset) {
            return Ok(true);
        }
        let pool = self.cache.pool_for(asset).await?;
        self.lifecycle.mark_ready();
        Ok(pool.is_some_and(|pool| pool.is_available()))
    }

    async fn supported_chains(&self) -> Result<Vec<Chain>, AdapterError> {
        let pools = self.cache.pools().await?;
        self.lifecycle.mark_ready();
        let mut chains: BTreeSet<Chain> = pools
            .iter()
            .filter(|pool| pool.is_available())
            .map(|pool| pool.asset.chain().clone())
            .collect();
        chains.insert(self.network.settlement_chain());
        Ok(chains.into_iter().collect())
    }

    async fn estimate_swap(&self, request: &SwapRequest) -> Result<SwapQuote, AdapterError> {
        self.quote(&self.effective_request(request)).await
    }

    async fn do_swap(&self, request: &SwapRequest) -> Result<TxSubmitted, AdapterError> {
        let request = self.effective_request(request);
        let quote = self.quote(&request).await?;
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
        let (chain, hash) = if self.network.is_settlement_side(&request.from_asset) {
            let chain = self.network.settlement_chain();
            let hash = self
                .wallet_call(wallet.deposit(DepositParams {
                    chain: chain.clone(),
                    amount: request.amount.clone(),
                    memo: quote.memo,
                }))
                .await?;
            (chain, hash)
        } else {
            self.transfer_to_vault(wallet, &request, quote.memo).await?
        };

        tracing::info!(
            protocol = %self.id(),
            chain = %chain,
            hash = %hash,
            "Swap submitted"
        );
        Ok(self.submitted(wallet, &chain, hash))
    }

    async fn should_be_approved(
        &self,
        amount: &CryptoAmount,
        address: &str,
    ) -> Result<bool, AdapterError> {
        if !needs_allowance(&amount.asset) {
            return Ok(false);
        }
        Ok(self.missing_allowance(amount, address).await?.is_some())
    }

    async fn approve_router_to_spend(
        &self,
        asset: &Asset,
        amount: Option<BaseAmount>,
    ) -> Result<TxSubmitted, AdapterError> {
        if !needs_allowance(asset) {
            return Err(AdapterError::InvalidRequest {
                message: format!("{} needs no router approval", asset),
            });
        }
        let wallet = self
            .wallet
            .as_deref()
            .ok_or(AdapterError::WalletNotConfigured)?;

        let _phase = self.lifecycle.begin_execute();
        let chain = asset.chain().clone();
        let router = self.router_for(&chain).await?;
        let hash = self
            .wallet_call(wallet.approve(ApproveParams {
                asset: asset.clone(),
                amount,
                spender: router.clone(),
            }))
            .await?;
        tracing::info!(
            protocol = %self.id(),
            asset = %asset,
            router = %router,
            hash = %hash,
            "Router approval submitted"
        );
        Ok(self.submitted(wallet, &chain, hash))
    }

    async fn swap_history(&self, addresses: &[ChainAddress]) -> Result<SwapHistory, AdapterError> {
        if self.history_sources.is_empty() {
            return Err(AdapterError::NotSupported {
                protocol: self.id().to_string(),
                operation: "swap history without an indexer",
            });
        }
        let addresses = SwapHistory::unique_addresses(addresses);
        if addresses.is_empty() {
            return Ok(SwapHistory::default());
        }
        let page = self.swap_actions(&addresses).await?;
        let pools = self.cache.pools().await?;
        self.lifecycle.mark_ready();
        Ok(SwapHistory {
            count: page.count,
            swaps: swap_records(&self.network, &pools, page),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_cache::{
        ActionCoin, ActionTx, InboundDetail, NetworkFlavor, NetworkValues, Pool, PoolStatus,
        SourceError, StaticPoolSource, SwapAction, POOL_DECIMALS,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use xroute_core::{BaseAmount, CacheConfig, CryptoAmount};

    const ONE: u128 = 100_000_000;
    const USDC: &str = "ETH.USDC-0XA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48";

    #[derive(Debug)]
    struct TestNetwork;

    impl ClpNetwork for TestNetwork {
        fn protocol_id(&self) -> ProtocolId {
            ProtocolId::new("thorchain")
        }

        fn flavor(&self) -> NetworkFlavor {
            NetworkFlavor {
                path_prefix: "thorchain",
                settlement_asset: "THOR.RUNE",
                native_decimals: 8,
            }
        }

        fn settlement_asset(&self) -> Asset {
            "THOR.RUNE".parse().unwrap()
        }

        fn default_native_fee(&self) -> u128 {
            0
        }
    }

    #[derive(Default)]
    struct MockWallet {
        deposits: AtomicUsize,
        transfers: AtomicUsize,
        last_recipient: Mutex<Option<String>>,
        last_memo: Mutex<Option<String>>,
        last_router: Mutex<Option<RouterDeposit>>,
        approved: AtomicBool,
        approvals: Mutex<Vec<ApproveParams>>,
        explorer_down: AtomicBool,
    }

    #[async_trait]
    impl Wallet for MockWallet {
        async fn address(&self, chain: &Chain) -> Result<String, WalletError> {
            Ok(format!("{}-sender", chain))
        }

        async fn deposit(&self, params: DepositParams) -> Result<TxHash, WalletError> {
            self.deposits.fetch_add(1, Ordering::SeqCst);
            *self.last_memo.lock().unwrap() = Some(params.memo);
            Ok(TxHash::new("DEPOSITHASH"))
        }

        async fn transfer(&self, params: TransferParams) -> Result<TxHash, WalletError> {
            self.transfers.fetch_add(1, Ordering::SeqCst);
            *self.last_recipient.lock().unwrap() = Some(params.recipient);
            *self.last_memo.lock().unwrap() = Some(params.memo);
            *self.last_router.lock().unwrap() = params.router;
            Ok(TxHash::new("TRANSFERHASH"))
        }

        async fn is_approved(&self, query: AllowanceQuery) -> Result<bool, WalletError> {
            assert_eq!(query.spender, "0xrouter");
            Ok(self.approved.load(Ordering::SeqCst))
        }

        async fn approve(&self, params: ApproveParams) -> Result<TxHash, WalletError> {
            self.approvals.lock().unwrap().push(params);
            Ok(TxHash::new("APPROVEHASH"))
        }

        fn explorer_tx_url(&self, chain: &Chain, hash: &TxHash) -> Result<String, WalletError> {
            if self.explorer_down.load(Ordering::SeqCst) {
                return Err(WalletError::Rejected {
                    message: "no explorer".into(),
                });
            }
            Ok(format!("https://explorer.example/{}/{}", chain, hash))
        }
    }

    struct MockActions {
        page: Option<ActionsPage>,
        calls: AtomicUsize,
    }

    impl MockActions {
        fn new(page: Option<ActionsPage>) -> Arc<Self> {
            Arc::new(Self {
                page,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ActionSource for MockActions {
        fn name(&self) -> &str {
            "mock-indexer"
        }

        async fn swap_actions(&self, addresses: &[String]) -> Result<ActionsPage, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(addresses, ["thor1sender".to_string()]);
            self.page.clone().ok_or_else(|| SourceError::Transport {
                source_name: "mock-indexer".into(),
                message: "connection refused".into(),
            })
        }
    }

    fn pool(asset: &str, asset_depth: u128, native_depth: u128) -> Pool {
        Pool {
            asset: asset.parse().unwrap(),
            asset_balance: BaseAmount::new(asset_depth, POOL_DECIMALS),
            native_balance: BaseAmount::new(native_depth, 8),
            asset_decimals: 8,
            status: PoolStatus::Available,
        }
    }

    fn btc_inbound() -> InboundDetail {
        InboundDetail {
            chain: Chain::new("BTC").unwrap(),
            address: "bc1qvault".into(),
            router: None,
            halted_chain: false,
            halted_trading: false,
            halted_lp: false,
            gas_rate: 10,
            gas_rate_units: "satsperbyte".into(),
            outbound_tx_size: 1000,
            outbound_fee: 10_000,
            dust_threshold: 10_000,
        }
    }

    fn eth_inbound(router: Option<&str>) -> InboundDetail {
        InboundDetail {
            chain: Chain::new("ETH").unwrap(),
            address: "0xvault".into(),
            router: router.map(Into::into),
            halted_chain: false,
            halted_trading: false,
            halted_lp: false,
            gas_rate: 1,
            gas_rate_units: "gwei".into(),
            outbound_tx_size: 80_000,
            outbound_fee: 0,
            dust_threshold: 0,
        }
    }

    fn source_with(eth_router: Option<&str>) -> Arc<StaticPoolSource> {
        Arc::new(StaticPoolSource::new(
            "static",
            vec![
                pool("BTC.BTC", ONE, 99 * ONE),
                pool("ETH.ETH", 2_000 * ONE, 100 * ONE),
                pool(USDC, 1_000_000 * ONE, 1_000 * ONE),
            ],
            vec![btc_inbound(), eth_inbound(eth_router)],
            NetworkValues::new(),
        ))
    }

    fn source() -> Arc<StaticPoolSource> {
        source_with(Some("0xrouter"))
    }

    fn adapter(source: Arc<StaticPoolSource>) -> ClpAdapter<TestNetwork> {
        let cache = ProtocolStateCache::new(
            "thorchain",
            vec![source as Arc<dyn PoolDataSource>],
            &CacheConfig::default(),
        );
        ClpAdapter::new(TestNetwork, cache, ClpSettings::default())
    }

    fn request(from: &str, to: &str, amount: u128) -> SwapRequest {
        let from: Asset = from.parse().unwrap();
        SwapRequest::new(
            from.clone(),
            to.parse().unwrap(),
            CryptoAmount::new(from, BaseAmount::new(amount, 8)),
            "dest-address",
        )
    }

    #[tokio::test]
    async fn test_estimate_is_idempotent_and_marks_ready() {
        let adapter = adapter(source());
        assert_eq!(adapter.state(), AdapterState::Uninitialized);

        let req = request("THOR.RUNE", "BTC.BTC", ONE);
        let first = adapter.estimate_swap(&req).await.unwrap();
        let second = adapter.estimate_swap(&req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert_eq!(first.protocol, ProtocolId::new("thorchain"));
    }

    #[tokio::test]
    async fn test_affiliate_fee_on_quote() {
        let adapter = adapter(source());
        let req = request("THOR.RUNE", "BTC.BTC", ONE).with_affiliate("thor1aff", 300);
        let quote = adapter.estimate_swap(&req).await.unwrap();
        assert_eq!(quote.fees.affiliate_fee, BaseAmount::new(30_000, 8));
        assert_eq!(quote.expected_amount.amount, BaseAmount::new(960_000, 8));
    }

    #[tokio::test]
    async fn test_default_affiliate_applies_when_missing() {
        let settings = ClpSettings::default().with_default_affiliate(Some(AffiliateParams {
            address: "thor1house".into(),
            bps: 300,
        }));
        let adapter = adapter(source()).with_settings(settings);

        let quote = adapter
            .estimate_swap(&request("THOR.RUNE", "BTC.BTC", ONE))
            .await
            .unwrap();
        assert_eq!(quote.fees.affiliate_fee, BaseAmount::new(30_000, 8));

        let explicit = request("THOR.RUNE", "BTC.BTC", ONE).with_affiliate("thor1own", 0);
        let quote = adapter.estimate_swap(&explicit).await.unwrap();
        assert!(quote.fees.affiliate_fee.is_zero());
    }

    #[tokio::test]
    async fn test_identical_assets_quote_not_error() {
        let adapter = adapter(source());
        let quote = adapter
            .estimate_swap(&request("BTC.BTC", "BTC.BTC", ONE))
            .await
            .unwrap();
        assert!(!quote.can_swap);
        assert!(quote.fees.is_zero());
    }

    #[tokio::test]
    async fn test_unreachable_sources_are_unavailable() {
        let source = source();
        source.set_failing(true);
        let adapter = adapter(source);
        let err = adapter
            .estimate_swap(&request("BTC.BTC", "THOR.RUNE", ONE))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(adapter.state(), AdapterState::Uninitialized);
    }

    #[tokio::test]
    async fn test_asset_support_and_chains() {
        let adapter = adapter(source());
        assert!(adapter
            .is_asset_supported(&"THOR.RUNE".parse().unwrap())
            .await
            .unwrap());
        assert!(adapter
            .is_asset_supported(&"btc/btc".parse().unwrap())
            .await
            .unwrap());
        assert!(!adapter
            .is_asset_supported(&"DOGE.DOGE".parse().unwrap())
            .await
            .unwrap());

        let chains = adapter.supported_chains().await.unwrap();
        let names: Vec<&str> = chains.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["BTC", "ETH", "THOR"]);
    }

    #[tokio::test]
    async fn test_do_swap_without_wallet() {
        let adapter = adapter(source());
        let err = adapter
            .do_swap(&request("THOR.RUNE", "BTC.BTC", ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::WalletNotConfigured));
    }

    #[tokio::test]
    async fn test_do_swap_refuses_unswappable_quote() {
        let wallet = Arc::new(MockWallet::default());
        let adapter = adapter(source()).with_wallet(wallet.clone());
        let err = adapter
            .do_swap(&request("DOGE.DOGE", "THOR.RUNE", ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::CannotSwap { .. }));
        assert_eq!(wallet.transfers.load(Ordering::SeqCst), 0);
        assert_eq!(wallet.deposits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_do_swap_deposits_settlement_asset() {
        let wallet = Arc::new(MockWallet::default());
        let adapter = adapter(source()).with_wallet(wallet.clone());
        let submitted = adapter
            .do_swap(&request("THOR.RUNE", "BTC.BTC", ONE))
            .await
            .unwrap();

        assert_eq!(submitted.hash, "DEPOSITHASH");
        assert_eq!(submitted.url, "https://explorer.example/THOR/DEPOSITHASH");
        assert_eq!(wallet.deposits.load(Ordering::SeqCst), 1);
        assert_eq!(wallet.transfers.load(Ordering::SeqCst), 0);
        assert_eq!(
            wallet.last_memo.lock().unwrap().as_deref(),
            Some("=:BTC.BTC:dest-address")
        );
        assert_eq!(adapter.state(), AdapterState::Ready);
    }

    #[tokio::test]
    async fn test_do_swap_transfers_to_fresh_vault() {
        let source = source();
        let wallet = Arc::new(MockWallet::default());
        let adapter = adapter(source.clone()).with_wallet(wallet.clone());

        let submitted = adapter
            .do_swap(&request("BTC.BTC", "THOR.RUNE", ONE))
            .await
            .unwrap();
        assert_eq!(submitted.hash, "TRANSFERHASH");
        assert_eq!(wallet.transfers.load(Ordering::SeqCst), 1);
        assert_eq!(
            wallet.last_recipient.lock().unwrap().as_deref(),
            Some("bc1qvault")
        );
        // pools, inbound and network for the estimate, then inbound again
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_hash_survives_missing_explorer_url() {
        let wallet = Arc::new(MockWallet::default());
        wallet.explorer_down.store(true, Ordering::SeqCst);
        let adapter = adapter(source()).with_wallet(wallet.clone());

        let submitted = adapter
            .do_swap(&request("BTC.BTC", "THOR.RUNE", ONE))
            .await
            .unwrap();
        assert_eq!(submitted.hash, "TRANSFERHASH");
        assert!(submitted.url.is_empty());

        let submitted = adapter
            .do_swap(&request("THOR.RUNE", "BTC.BTC", ONE))
            .await
            .unwrap();
        assert_eq!(submitted.hash, "DEPOSITHASH");
        assert!(submitted.url.is_empty());
        assert_eq!(wallet.transfers.load(Ordering::SeqCst), 1);
        assert_eq!(wallet.deposits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_evm_deposit_goes_through_router() {
        let wallet = Arc::new(MockWallet::default());
        let adapter = adapter(source()).with_wallet(wallet.clone());

        adapter
            .do_swap(&request("ETH.ETH", "THOR.RUNE", ONE))
            .await
            .unwrap();
        assert_eq!(
            wallet.last_recipient.lock().unwrap().as_deref(),
            Some("0xvault")
        );
        let router = wallet.last_router.lock().unwrap().clone().unwrap();
        assert_eq!(router.router, "0xrouter");
        assert!(router.expiry > ROUTER_DEPOSIT_TTL_SECS);

        adapter
            .do_swap(&request("BTC.BTC", "THOR.RUNE", ONE))
            .await
            .unwrap();
        assert!(wallet.last_router.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evm_deposit_without_router_is_refused() {
        let wallet = Arc::new(MockWallet::default());
        let adapter = adapter(source_with(None)).with_wallet(wallet.clone());

        let err = adapter
            .do_swap(&request("ETH.ETH", "THOR.RUNE", ONE))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(wallet.transfers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_allowance_checks() {
        let wallet = Arc::new(MockWallet::default());
        let adapter = adapter(source()).with_wallet(wallet.clone());
        let usdc: Asset = USDC.parse().unwrap();
        let amount = CryptoAmount::new(usdc.clone(), BaseAmount::new(100 * ONE, 8));

        assert!(adapter.should_be_approved(&amount, "0xowner").await.unwrap());
        let eth = CryptoAmount::new("ETH.ETH".parse().unwrap(), BaseAmount::new(ONE, 8));
        assert!(!adapter.should_be_approved(&eth, "0xowner").await.unwrap());

        let req = request(USDC, "THOR.RUNE", 100 * ONE).with_from_address("0xowner");
        let quote = adapter.estimate_swap(&req).await.unwrap();
        assert!(!quote.can_swap);
        assert!(quote.errors.contains(&ValidationError::RouterNotApproved {
            router: "0xrouter".into()
        }));

        wallet.approved.store(true, Ordering::SeqCst);
        assert!(!adapter.should_be_approved(&amount, "0xowner").await.unwrap());
        let quote = adapter.estimate_swap(&req).await.unwrap();
        assert!(!quote
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::RouterNotApproved { .. })));
    }

    #[tokio::test]
    async fn test_approve_router_to_spend() {
        let wallet = Arc::new(MockWallet::default());
        let adapter = adapter(source()).with_wallet(wallet.clone());
        let usdc: Asset = USDC.parse().unwrap();

        let submitted = adapter.approve_router_to_spend(&usdc, None).await.unwrap();
        assert_eq!(submitted.hash, "APPROVEHASH");
        assert_eq!(submitted.url, "https://explorer.example/ETH/APPROVEHASH");
        let approvals = wallet.approvals.lock().unwrap().clone();
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].spender, "0xrouter");
        assert_eq!(approvals[0].amount, None);

        let err = adapter
            .approve_router_to_spend(&"BTC.BTC".parse().unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest { .. }));
    }

    fn history_page() -> ActionsPage {
        ActionsPage {
            count: 7,
            actions: vec![SwapAction {
                date_ns: 1_700_000_000_000_000_000,
                pending: false,
                inbound: vec![ActionTx {
                    hash: "IN".into(),
                    address: "thor1sender".into(),
                    coins: vec![ActionCoin {
                        asset: "THOR.RUNE".parse().unwrap(),
                        amount: ONE,
                    }],
                }],
                outbound: vec![ActionTx {
                    hash: "OUT".into(),
                    address: "bc1qdest".into(),
                    coins: vec![ActionCoin {
                        asset: "BTC.BTC".parse().unwrap(),
                        amount: 990_000,
                    }],
                }],
                memo: "=:b:bc1qdest".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_swap_history_falls_back_across_indexers() {
        let down = MockActions::new(None);
        let up = MockActions::new(Some(history_page()));
        let adapter = adapter(source()).with_history_sources(vec![
            down.clone() as Arc<dyn ActionSource>,
            up.clone() as Arc<dyn ActionSource>,
        ]);
        let thor = Chain::new("THOR").unwrap();
        let addresses = [
            ChainAddress::new(thor.clone(), "thor1sender"),
            ChainAddress::new(thor, "thor1sender"),
        ];

        let history = adapter.swap_history(&addresses).await.unwrap();
        assert_eq!(history.count, 7);
        assert_eq!(history.swaps.len(), 1);
        assert_eq!(history.swaps[0].protocol, ProtocolId::new("thorchain"));
        assert_eq!(history.swaps[0].to_asset, "BTC.BTC".parse().unwrap());
        assert_eq!(down.calls.load(Ordering::SeqCst), 1);
        assert_eq!(up.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_swap_history_errors() {
        let thor = Chain::new("THOR").unwrap();
        let addresses = [ChainAddress::new(thor, "thor1sender")];

        let err = adapter(source()).swap_history(&addresses).await.unwrap_err();
        assert_eq!(err.error_code(), "not_supported");

        let adapter = adapter(source())
            .with_history_sources(vec![MockActions::new(None) as Arc<dyn ActionSource>]);
        let err = adapter.swap_history(&addresses).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
