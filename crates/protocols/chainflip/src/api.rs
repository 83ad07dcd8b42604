//! Chainflip backend and broker clients
//!
//! The backend serves the asset registry (`/v2/assets`) and swap quotes
//! (`/v2/quote`). Deposit channels are opened through a broker's JSON-RPC
//! endpoint with `broker_requestSwapDepositAddress`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pool_cache::http::{get_json, join_url, post_json, DEFAULT_REQUEST_TIMEOUT};
use pool_cache::{DataSource, SourceError};
use serde::{Deserialize, Deserializer, Serialize};

/// One swappable asset as the backend describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainflipAsset {
    /// Chainflip chain name ("Ethereum", "Bitcoin", ...)
    pub chain: String,
    /// Chainflip asset symbol ("ETH", "USDC", ...)
    pub asset: String,
    pub decimals: u8,
    #[serde(deserialize_with = "de_u128")]
    pub minimum_swap_amount: u128,
    #[serde(default)]
    pub contract_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    assets: Vec<ChainflipAsset>,
}

/// Backend-side identity of an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub chain: String,
    pub asset: String,
}

impl From<&ChainflipAsset> for AssetRef {
    fn from(asset: &ChainflipAsset) -> Self {
        Self {
            chain: asset.chain.clone(),
            asset: asset.asset.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteQuery {
    pub source: AssetRef,
    pub destination: AssetRef,
    /// Input in the source asset's base units
    pub amount: u128,
    pub broker_commission_bps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteType {
    Regular,
    Dca,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedFee {
    /// EGRESS, BROKER, NETWORK, INGRESS, BOOST, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub chain: String,
    pub asset: String,
    #[serde(deserialize_with = "de_u128")]
    pub amount: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DurationBreakdown {
    #[serde(default)]
    pub deposit: f64,
    #[serde(default)]
    pub swap: f64,
    #[serde(default)]
    pub egress: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcaParams {
    pub number_of_chunks: u32,
    pub chunk_interval_blocks: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendQuote {
    #[serde(rename = "type")]
    pub kind: QuoteType,
    #[serde(deserialize_with = "de_u128")]
    pub egress_amount: u128,
    #[serde(default)]
    pub included_fees: Vec<IncludedFee>,
    #[serde(default)]
    pub estimated_duration_seconds: f64,
    #[serde(default)]
    pub estimated_durations_seconds: Option<DurationBreakdown>,
    #[serde(default)]
    pub low_liquidity_warning: bool,
    #[serde(default)]
    pub recommended_slippage_tolerance_percent: Option<f64>,
    #[serde(default)]
    pub dca_params: Option<DcaParams>,
}

impl BackendQuote {
    pub fn fee(&self, kind: &str) -> Option<&IncludedFee> {
        self.included_fees
            .iter()
            .find(|fee| fee.kind.eq_ignore_ascii_case(kind))
    }
}

/// Prefer a DCA quote, fall back to the regular one
pub fn select_quote(quotes: Vec<BackendQuote>) -> Option<BackendQuote> {
    let (dca, regular): (Vec<_>, Vec<_>) = quotes
        .into_iter()
        .partition(|quote| quote.kind == QuoteType::Dca);
    dca.into_iter().next().or_else(|| regular.into_iter().next())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    pub source: AssetRef,
    pub destination: AssetRef,
    pub destination_address: String,
    pub broker_commission_bps: u32,
    pub refund_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DepositChannel {
    pub address: String,
    #[serde(default)]
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub source_chain_expiry_block: Option<u64>,
}

/// Quote and channel operations the adapter needs
#[async_trait]
pub trait ChainflipApi: Send + Sync {
    async fn quote(&self, query: &QuoteQuery) -> Result<Vec<BackendQuote>, SourceError>;

    async fn open_deposit_channel(
        &self,
        request: &ChannelRequest,
    ) -> Result<DepositChannel, SourceError>;
}

/// One backend URL
#[derive(Debug, Clone)]
pub struct BackendClient {
    name: String,
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into();
        Self {
            name: format!("chainflip backend {}", base_url),
            base_url,
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn assets(&self) -> Result<Vec<ChainflipAsset>, SourceError> {
        let url = join_url(&self.base_url, "v2/assets");
        let response: AssetsResponse =
            get_json(&self.client, &self.name, &url, self.request_timeout).await?;
        Ok(response.assets)
    }

    pub async fn quote(&self, query: &QuoteQuery) -> Result<Vec<BackendQuote>, SourceError> {
        let url = format!(
            "{}?srcChain={}&srcAsset={}&destChain={}&destAsset={}&amount={}&brokerCommissionBps={}",
            join_url(&self.base_url, "v2/quote"),
            query.source.chain,
            query.source.asset,
            query.destination.chain,
            query.destination.asset,
            query.amount,
            query.broker_commission_bps,
        );
        get_json(&self.client, &self.name, &url, self.request_timeout).await
    }
}

#[async_trait]
impl DataSource<(), Vec<ChainflipAsset>> for BackendClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _key: &()) -> Result<Vec<ChainflipAsset>, SourceError> {
        self.assets().await
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// Broker JSON-RPC endpoint
#[derive(Debug, Clone)]
pub struct BrokerClient {
    name: String,
    url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl BrokerClient {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        let url = url.into();
        Self {
            name: format!("chainflip broker {}", url),
            url,
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub async fn request_swap_deposit_address(
        &self,
        request: &ChannelRequest,
    ) -> Result<DepositChannel, SourceError> {
        let refund = request.refund_address.as_ref().map(|address| {
            serde_json::json!({
                "retry_duration": 100,
                "refund_address": address,
                "min_price": "0x0",
            })
        });
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "broker_requestSwapDepositAddress",
            params: serde_json::json!([
                request.source,
                request.destination,
                request.destination_address,
                request.broker_commission_bps,
                null,
                null,
                null,
                refund,
            ]),
        };

        let response: RpcResponse<DepositChannel> =
            post_json(&self.client, &self.name, &self.url, &body, self.request_timeout).await?;
        match (response.result, response.error) {
            (Some(channel), _) => Ok(channel),
            (None, Some(error)) => Err(SourceError::Parse {
                source_name: self.name.clone(),
                message: format!("rpc error {}: {}", error.code, error.message),
            }),
            (None, None) => Err(SourceError::Parse {
                source_name: self.name.clone(),
                message: "rpc response has neither result nor error".to_string(),
            }),
        }
    }
}

/// Backends tried in order for quotes, plus an optional broker
#[derive(Debug, Clone)]
pub struct HttpChainflipApi {
    backends: Vec<BackendClient>,
    broker: Option<BrokerClient>,
}

impl HttpChainflipApi {
    pub fn new(backends: Vec<BackendClient>, broker: Option<BrokerClient>) -> Self {
        Self { backends, broker }
    }

    /// Registry sources, one per backend, in priority order
    pub fn registry_sources(&self) -> Vec<Arc<dyn DataSource<(), Vec<ChainflipAsset>>>> {
        self.backends
            .iter()
            .cloned()
            .map(|backend| Arc::new(backend) as Arc<dyn DataSource<(), Vec<ChainflipAsset>>>)
            .collect()
    }
}

#[async_trait]
impl ChainflipApi for HttpChainflipApi {
    async fn quote(&self, query: &QuoteQuery) -> Result<Vec<BackendQuote>, SourceError> {
        let mut last_error = None;
        for backend in &self.backends {
            match backend.quote(query).await {
                Ok(quotes) => return Ok(quotes),
                Err(e) if e.is_transient() => {
                    tracing::warn!(source = backend.name(), error = %e, "Quote request failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| SourceError::Transport {
            source_name: "chainflip".to_string(),
            message: "no backend configured".to_string(),
        }))
    }

    async fn open_deposit_channel(
        &self,
        request: &ChannelRequest,
    ) -> Result<DepositChannel, SourceError> {
        let broker = self.broker.as_ref().ok_or_else(|| SourceError::NotFound {
            source_name: "chainflip".to_string(),
            what: "broker endpoint".to_string(),
        })?;
        broker.request_swap_deposit_address(request).await
    }
}

/// Amounts arrive as decimal strings, hex strings or plain numbers
fn de_u128<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(u128::from(value)),
        Raw::Text(text) => {
            let parsed = match text.strip_prefix("0x") {
                Some(hex) => u128::from_str_radix(hex, 16),
                None => text.parse(),
            };
            parsed.map_err(|_| serde::de::Error::custom(format!("invalid amount {:?}", text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_registry_dto() {
        let json = r#"{"assets": [
            {"chain": "Ethereum", "asset": "USDC", "decimals": 6,
             "minimumSwapAmount": "20000000",
             "contractAddress": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"},
            {"chain": "Bitcoin", "asset": "BTC", "decimals": 8, "minimumSwapAmount": 70000}
        ]}"#;
        let response: AssetsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.assets.len(), 2);
        assert_eq!(response.assets[0].minimum_swap_amount, 20_000_000);
        assert_eq!(response.assets[1].minimum_swap_amount, 70_000);
        assert_eq!(response.assets[1].contract_address, None);
    }

    #[test]
    fn test_quote_dto_and_selection() {
        let json = r#"[
            {"type": "REGULAR", "egressAmount": "1000", "includedFees": [],
             "estimatedDurationSeconds": 90.5, "lowLiquidityWarning": false},
            {"type": "DCA", "egressAmount": "0x3e8",
             "includedFees": [{"type": "EGRESS", "chain": "Ethereum", "asset": "ETH", "amount": "7"}],
             "estimatedDurationSeconds": 300,
             "estimatedDurationsSeconds": {"deposit": 24, "swap": 240, "egress": 36},
             "dcaParams": {"numberOfChunks": 4, "chunkIntervalBlocks": 2}}
        ]"#;
        let quotes: Vec<BackendQuote> = serde_json::from_str(json).unwrap();
        let selected = select_quote(quotes.clone()).unwrap();
        assert_eq!(selected.kind, QuoteType::Dca);
        assert_eq!(selected.egress_amount, 1_000);
        assert_eq!(selected.fee("egress").map(|f| f.amount), Some(7));
        assert_eq!(selected.dca_params.map(|p| p.number_of_chunks), Some(4));

        let regular_only: Vec<_> = quotes
            .into_iter()
            .filter(|q| q.kind == QuoteType::Regular)
            .collect();
        assert_eq!(select_quote(regular_only).unwrap().kind, QuoteType::Regular);
        assert!(select_quote(Vec::new()).is_none());
    }

    #[test]
    fn test_rpc_response_dto() {
        let ok: RpcResponse<DepositChannel> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":{"address":"bc1qchannel","channel_id":42,"source_chain_expiry_block":900}}"#,
        )
        .unwrap();
        assert_eq!(ok.result.unwrap().address, "bc1qchannel");

        let err: RpcResponse<DepositChannel> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"unsupported asset"}}"#,
        )
        .unwrap();
        assert!(err.result.is_none());
        assert_eq!(err.error.unwrap().code, -32000);
    }

    #[tokio::test]
    async fn test_missing_broker_is_not_found() {
        let api = HttpChainflipApi::new(Vec::new(), None);
        let request = ChannelRequest {
            source: AssetRef {
                chain: "Bitcoin".into(),
                asset: "BTC".into(),
            },
            destination: AssetRef {
                chain: "Ethereum".into(),
                asset: "ETH".into(),
            },
            destination_address: "0xdest".into(),
            broker_commission_bps: 0,
            refund_address: None,
        };
        let err = api.open_deposit_channel(&request).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }
}
