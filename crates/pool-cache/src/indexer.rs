//! Indexer (Midgard-shaped) data source
//!
//! Pools come from the indexer's own `/v2/pools` and swap history from
//! `/v2/actions`; inbound addresses and network values from the node
//! endpoints it proxies under `/v2/<prefix>/`.

use std::time::Duration;

use async_trait::async_trait;

use crate::actions::{ActionSource, ActionsPage};
use crate::http::{get_json, join_url, DEFAULT_REQUEST_TIMEOUT};
use crate::pool::{InboundDetail, NetworkFlavor, NetworkValues, Pool};
use crate::source::{PoolDataSource, SourceError};
use crate::wire::{self, ActionsResponse, IndexerPool, InboundAddress, NetworkValueUrls};

#[derive(Debug, Clone)]
pub struct IndexerSource {
    name: String,
    base_url: String,
    flavor: NetworkFlavor,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl IndexerSource {
    pub fn new(base_url: impl Into<String>, flavor: NetworkFlavor, client: reqwest::Client) -> Self {
        let base_url = base_url.into();
        Self {
            name: format!("indexer {}", base_url),
            base_url,
            flavor,
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn proxied(&self, endpoint: &str) -> String {
        join_url(
            &self.base_url,
            &format!("v2/{}/{}", self.flavor.path_prefix, endpoint),
        )
    }

    fn swap_actions_url(&self, addresses: &[String]) -> String {
        join_url(
            &self.base_url,
            &format!("v2/actions?address={}&type=swap", addresses.join(",")),
        )
    }
}

#[async_trait]
impl PoolDataSource for IndexerSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pools(&self) -> Result<Vec<Pool>, SourceError> {
        let url = join_url(&self.base_url, "v2/pools");
        let dtos: Vec<IndexerPool> =
            get_json(&self.client, &self.name, &url, self.request_timeout).await?;
        wire::pools_from_indexer(dtos, &self.flavor, &self.name)
    }

    async fn inbound_addresses(&self) -> Result<Vec<InboundDetail>, SourceError> {
        let url = self.proxied("inbound_addresses");
        let dtos: Vec<InboundAddress> =
            get_json(&self.client, &self.name, &url, self.request_timeout).await?;
        wire::inbound_from_wire(dtos, &self.name)
    }

    async fn network_values(&self) -> Result<NetworkValues, SourceError> {
        let urls = NetworkValueUrls {
            constants: self.proxied("constants"),
            mimir: self.proxied("mimir"),
            queue: self.proxied("queue"),
        };
        wire::load_network_values(&self.client, &self.name, &urls, self.request_timeout).await
    }
}

#[async_trait]
impl ActionSource for IndexerSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn swap_actions(&self, addresses: &[String]) -> Result<ActionsPage, SourceError> {
        let url = self.swap_actions_url(addresses);
        let response: ActionsResponse =
            get_json(&self.client, &self.name, &url, self.request_timeout).await?;
        wire::actions_from_wire(response, &self.name)
    }
}
