//! Configuration types for xroute

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Cache behavior for one protocol's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_pools_ttl_secs")]
    pub pools_ttl_secs: u64,

    #[serde(default = "default_inbound_ttl_secs")]
    pub inbound_ttl_secs: u64,

    #[serde(default = "default_network_ttl_secs")]
    pub network_ttl_secs: u64,

    /// Timeout applied to each individual source call
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,

    /// Extra attempts per source on transient errors
    #[serde(default = "default_retries_per_source")]
    pub retries_per_source: u32,
}

fn default_pools_ttl_secs() -> u64 {
    6
}

fn default_inbound_ttl_secs() -> u64 {
    6
}

fn default_network_ttl_secs() -> u64 {
    600
}

fn default_source_timeout_ms() -> u64 {
    3_000
}

fn default_retries_per_source() -> u32 {
    1
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pools_ttl_secs: default_pools_ttl_secs(),
            inbound_ttl_secs: default_inbound_ttl_secs(),
            network_ttl_secs: default_network_ttl_secs(),
            source_timeout_ms: default_source_timeout_ms(),
            retries_per_source: default_retries_per_source(),
        }
    }
}

/// Endpoints and fee settings for a constant-product AMM network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmProtocolConfig {
    /// Indexer base URLs, tried first and in order
    #[serde(default)]
    pub indexer_urls: Vec<String>,

    /// Consensus node base URLs, tried after the indexers
    #[serde(default)]
    pub node_urls: Vec<String>,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Liquidity fee applied to each hop
    #[serde(default)]
    pub liquidity_fee_bps: u32,

    /// 3-digit tag packed into the memo limit
    #[serde(default)]
    pub interface_tag: Option<u16>,
}

impl AmmProtocolConfig {
    pub fn thorchain() -> Self {
        Self {
            indexer_urls: vec!["https://midgard.ninerealms.com".to_string()],
            node_urls: vec!["https://thornode.ninerealms.com".to_string()],
            cache: CacheConfig::default(),
            liquidity_fee_bps: 0,
            interface_tag: None,
        }
    }

    pub fn mayachain() -> Self {
        Self {
            indexer_urls: vec!["https://midgard.mayachain.info".to_string()],
            node_urls: vec!["https://mayanode.mayachain.info".to_string()],
            cache: CacheConfig::default(),
            liquidity_fee_bps: 0,
            interface_tag: None,
        }
    }

    pub fn source_count(&self) -> usize {
        self.indexer_urls.len() + self.node_urls.len()
    }
}

/// External streaming network settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainflipConfig {
    #[serde(default = "default_chainflip_backends")]
    pub backend_urls: Vec<String>,

    /// Broker JSON-RPC endpoint used to open deposit channels
    #[serde(default)]
    pub broker_url: Option<String>,

    #[serde(default)]
    pub broker_commission_bps: u32,

    #[serde(default = "default_registry_ttl_secs")]
    pub registry_ttl_secs: u64,

    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,

    #[serde(default = "default_retries_per_source")]
    pub retries_per_source: u32,
}

fn default_chainflip_backends() -> Vec<String> {
    vec!["https://chainflip-swap.chainflip.io".to_string()]
}

fn default_registry_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for ChainflipConfig {
    fn default() -> Self {
        Self {
            backend_urls: default_chainflip_backends(),
            broker_url: None,
            broker_commission_bps: 0,
            registry_ttl_secs: default_registry_ttl_secs(),
            source_timeout_ms: default_source_timeout_ms(),
            retries_per_source: default_retries_per_source(),
        }
    }
}

/// Default affiliate applied to requests that carry none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateConfig {
    pub address: String,
    pub bps: u32,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub thorchain: Option<AmmProtocolConfig>,

    #[serde(default)]
    pub mayachain: Option<AmmProtocolConfig>,

    #[serde(default)]
    pub chainflip: Option<ChainflipConfig>,

    #[serde(default)]
    pub affiliate: Option<AffiliateConfig>,

    /// Deadline for the whole quote fan-out
    #[serde(default = "default_aggregate_deadline_ms")]
    pub aggregate_deadline_ms: u64,

    /// Deadline for one adapter; must be below the aggregate deadline
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    /// Deadline for a wallet address lookup or broadcast
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
}

fn default_aggregate_deadline_ms() -> u64 {
    10_000
}

fn default_adapter_timeout_ms() -> u64 {
    8_000
}

fn default_execution_timeout_ms() -> u64 {
    60_000
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            thorchain: Some(AmmProtocolConfig::thorchain()),
            mayachain: Some(AmmProtocolConfig::mayachain()),
            chainflip: Some(ChainflipConfig::default()),
            affiliate: None,
            aggregate_deadline_ms: default_aggregate_deadline_ms(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
            execution_timeout_ms: default_execution_timeout_ms(),
        }
    }
}

impl AggregatorConfig {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), Error> {
        if self.adapter_timeout_ms >= self.aggregate_deadline_ms {
            return Err(Error::Config(format!(
                "adapter_timeout_ms ({}) must be below aggregate_deadline_ms ({})",
                self.adapter_timeout_ms, self.aggregate_deadline_ms
            )));
        }
        if let Some(affiliate) = &self.affiliate {
            if affiliate.bps > 10_000 {
                return Err(Error::Config(format!(
                    "affiliate bps {} is outside [0, 10000]",
                    affiliate.bps
                )));
            }
        }
        for (name, amm) in [("thorchain", &self.thorchain), ("mayachain", &self.mayachain)] {
            let Some(amm) = amm else { continue };
            if amm.source_count() == 0 {
                return Err(Error::Config(format!("{} has no data sources", name)));
            }
            if amm.liquidity_fee_bps > 10_000 {
                return Err(Error::Config(format!(
                    "{} liquidity_fee_bps {} is outside [0, 10000]",
                    name, amm.liquidity_fee_bps
                )));
            }
            if amm.interface_tag.is_some_and(|tag| tag > 999) {
                return Err(Error::Config(format!(
                    "{} interface_tag must have at most 3 digits",
                    name
                )));
            }
        }
        if let Some(chainflip) = &self.chainflip {
            if chainflip.backend_urls.is_empty() {
                return Err(Error::Config("chainflip has no backend urls".to_string()));
            }
            if chainflip.broker_commission_bps > 10_000 {
                return Err(Error::Config(format!(
                    "chainflip broker_commission_bps {} is outside [0, 10000]",
                    chainflip.broker_commission_bps
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AggregatorConfig::default();
        assert_eq!(config.aggregate_deadline_ms, 10_000);
        assert_eq!(config.adapter_timeout_ms, 8_000);
        let thorchain = config.thorchain.as_ref().unwrap();
        assert_eq!(thorchain.cache.pools_ttl_secs, 6);
        assert_eq!(thorchain.cache.network_ttl_secs, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AggregatorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AggregatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AggregatorConfig = serde_json::from_str(
            r#"{"thorchain": {"node_urls": ["http://127.0.0.1:1317"]}}"#,
        )
        .unwrap();
        let thorchain = parsed.thorchain.unwrap();
        assert!(thorchain.indexer_urls.is_empty());
        assert_eq!(thorchain.cache, CacheConfig::default());
        assert!(parsed.mayachain.is_none());
        assert_eq!(parsed.adapter_timeout_ms, 8_000);
    }

    #[test]
    fn test_validate_rejects_adapter_timeout_at_deadline() {
        let config = AggregatorConfig {
            adapter_timeout_ms: 10_000,
            ..AggregatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_fees_and_tags() {
        let mut config = AggregatorConfig {
            affiliate: Some(AffiliateConfig {
                address: "thor1aff".into(),
                bps: 10_001,
            }),
            ..AggregatorConfig::default()
        };
        assert!(config.validate().is_err());

        config.affiliate = None;
        if let Some(thorchain) = config.thorchain.as_mut() {
            thorchain.interface_tag = Some(1_000);
        }
        assert!(config.validate().is_err());
    }
}
