//! Consensus node (Thornode-shaped) data source

use std::time::Duration;

use async_trait::async_trait;

use crate::http::{get_json, join_url, DEFAULT_REQUEST_TIMEOUT};
use crate::pool::{InboundDetail, NetworkFlavor, NetworkValues, Pool};
use crate::source::{PoolDataSource, SourceError};
use crate::wire::{self, InboundAddress, NetworkValueUrls, NodePool};

#[derive(Debug, Clone)]
pub struct NodeSource {
    name: String,
    base_url: String,
    flavor: NetworkFlavor,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl NodeSource {
    pub fn new(base_url: impl Into<String>, flavor: NetworkFlavor, client: reqwest::Client) -> Self {
        let base_url = base_url.into();
        Self {
            name: format!("node {}", base_url),
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

    fn endpoint(&self, path: &str) -> String {
        join_url(
            &self.base_url,
            &format!("{}/{}", self.flavor.path_prefix, path),
        )
    }
}

#[async_trait]
impl PoolDataSource for NodeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pools(&self) -> Result<Vec<Pool>, SourceError> {
        let url = self.endpoint("pools");
        let dtos: Vec<NodePool> =
            get_json(&self.client, &self.name, &url, self.request_timeout).await?;
        wire::pools_from_node(dtos, &self.flavor, &self.name)
    }

    async fn inbound_addresses(&self) -> Result<Vec<InboundDetail>, SourceError> {
        let url = self.endpoint("inbound_addresses");
        let dtos: Vec<InboundAddress> =
            get_json(&self.client, &self.name, &url, self.request_timeout).await?;
        wire::inbound_from_wire(dtos, &self.name)
    }

    async fn network_values(&self) -> Result<NetworkValues, SourceError> {
        let urls = NetworkValueUrls {
            constants: self.endpoint("constants"),
            mimir: self.endpoint("mimir"),
            queue: self.endpoint("queue"),
        };
        wire::load_network_values(&self.client, &self.name, &urls, self.request_timeout).await
    }
}
