//! Aggregator errors

use thiserror::Error;
use xroute_core::AdapterError;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Unknown protocol: {protocol}")]
    UnknownProtocol { protocol: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AggregatorError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownProtocol { .. } => "unknown_protocol",
            Self::Adapter(e) => e.error_code(),
            Self::Config(_) => "config",
        }
    }
}

impl From<xroute_core::Error> for AggregatorError {
    fn from(err: xroute_core::Error) -> Self {
        match err {
            xroute_core::Error::Adapter(e) => Self::Adapter(e),
            other => Self::Config(other.to_string()),
        }
    }
}
