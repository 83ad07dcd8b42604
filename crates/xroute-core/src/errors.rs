//! Error types for xroute

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core errors that can occur in xroute
#[derive(Debug, Error)]
pub enum Error {
    #[error("Asset error: {0}")]
    Asset(#[from] AssetParseError),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Asset identifier parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetParseError {
    #[error("Asset string is empty")]
    Empty,

    #[error("Asset '{input}' has no chain separator ('.', '/' or '~')")]
    MissingSeparator { input: String },

    #[error("Chain identifier is empty")]
    EmptyChain,

    #[error("Invalid chain identifier: {chain}")]
    InvalidChain { chain: String },

    #[error("Asset '{input}' has an empty symbol")]
    EmptySymbol { input: String },

    #[error("Asset '{input}' has an empty contract")]
    EmptyContract { input: String },
}

/// Amount conversion and arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Amount overflow")]
    Overflow,

    #[error("Amount underflow: {left} - {right}")]
    Underflow { left: u128, right: u128 },

    #[error("Decimals {decimals} exceed the supported precision")]
    ScaleTooLarge { decimals: u32 },

    #[error("{value} cannot be represented with {decimals} decimals")]
    Inexact { value: String, decimals: u8 },

    #[error("Negative amount: {value}")]
    Negative { value: String },

    #[error("Decimal mismatch: {left} vs {right}")]
    DecimalMismatch { left: u8, right: u8 },
}

/// Problems with a swap request that keep a quote from being executable.
///
/// These never abort an estimate; they are collected into
/// [`SwapQuote::errors`](crate::SwapQuote) with `can_swap = false`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Source and destination asset are identical")]
    IdenticalAssets,

    #[error("Swap amount is zero")]
    ZeroAmount,

    #[error("Affiliate fee of {bps} bps is outside [0, 10000]")]
    AffiliateBpsOutOfRange { bps: u32 },

    #[error("Slip tolerance of {bps} bps is outside [0, 10000]")]
    ToleranceOutOfRange { bps: u32 },

    #[error("Asset {asset} is not supported")]
    UnsupportedAsset { asset: String },

    #[error("Pool {asset} is not available ({status})")]
    PoolUnavailable { asset: String, status: String },

    #[error("Chain {chain} is halted")]
    ChainHalted { chain: String },

    #[error("Trading is halted on {chain}")]
    TradingHalted { chain: String },

    #[error("Amount {amount} is below the dust threshold {threshold}")]
    BelowDust { amount: String, threshold: String },

    #[error("Expected slip of {slip_bps} bps exceeds the limit of {limit_bps} bps")]
    SlipLimitExceeded { slip_bps: u32, limit_bps: u32 },

    #[error("Fees exceed the swap output")]
    FeesExceedOutput,

    #[error("Memo of {len} bytes exceeds the {max} byte limit")]
    MemoTooLong { len: usize, max: usize },

    #[error("Quote rejected: {reason}")]
    QuoteRejected { reason: String },

    #[error("Router {router} has not been approved to spend this amount")]
    RouterNotApproved { router: String },
}

impl ValidationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::IdenticalAssets => "identical_assets",
            Self::ZeroAmount => "zero_amount",
            Self::AffiliateBpsOutOfRange { .. } => "affiliate_bps_out_of_range",
            Self::ToleranceOutOfRange { .. } => "tolerance_out_of_range",
            Self::UnsupportedAsset { .. } => "unsupported_asset",
            Self::PoolUnavailable { .. } => "pool_unavailable",
            Self::ChainHalted { .. } => "chain_halted",
            Self::TradingHalted { .. } => "trading_halted",
            Self::BelowDust { .. } => "below_dust",
            Self::SlipLimitExceeded { .. } => "slip_limit_exceeded",
            Self::FeesExceedOutput => "fees_exceed_output",
            Self::MemoTooLong { .. } => "memo_too_long",
            Self::QuoteRejected { .. } => "quote_rejected",
            Self::RouterNotApproved { .. } => "router_not_approved",
        }
    }
}

/// Errors reported by the wallet collaborator while signing or broadcasting
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("No client configured for chain {chain}")]
    ChainNotConfigured { chain: String },

    #[error("Address for {chain} unavailable: {message}")]
    AddressUnavailable { chain: String, message: String },

    #[error("Broadcast failed: {message}")]
    Broadcast { message: String },

    #[error("Transaction rejected: {message}")]
    Rejected { message: String },
}

/// Errors surfaced by a protocol adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    /// State needed for the quote could not be loaded from any source
    #[error("Quote unavailable: {reason}")]
    QuoteUnavailable { reason: String },

    #[error("Can not make swap: {}", join_errors(.errors))]
    CannotSwap { errors: Vec<ValidationError> },

    #[error("Wallet not configured, can not do swap")]
    WalletNotConfigured,

    /// Signing or broadcast failed; never retried
    #[error("Execution failed: {0}")]
    Execution(#[from] WalletError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("{protocol} does not support {operation}")]
    NotSupported {
        protocol: String,
        operation: &'static str,
    },
}

impl AdapterError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::QuoteUnavailable { .. } => "quote_unavailable",
            Self::CannotSwap { .. } => "cannot_swap",
            Self::WalletNotConfigured => "wallet_not_configured",
            Self::Execution(_) => "execution_failed",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::NotSupported { .. } => "not_supported",
        }
    }

    /// Whether the aggregator should treat this as "protocol cannot quote right now"
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::QuoteUnavailable { .. })
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for xroute operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_codes() {
        let err = ValidationError::AffiliateBpsOutOfRange { bps: 10001 };
        assert_eq!(err.code(), "affiliate_bps_out_of_range");
        assert_eq!(err.to_string(), "Affiliate fee of 10001 bps is outside [0, 10000]");

        let json = serde_json::to_value(&ValidationError::IdenticalAssets).unwrap();
        assert_eq!(json["code"], "identical_assets");
    }

    #[test]
    fn test_cannot_swap_lists_reasons() {
        let err = AdapterError::CannotSwap {
            errors: vec![
                ValidationError::ZeroAmount,
                ValidationError::ChainHalted {
                    chain: "BTC".into(),
                },
            ],
        };
        assert_eq!(err.error_code(), "cannot_swap");
        assert_eq!(
            err.to_string(),
            "Can not make swap: Swap amount is zero; Chain BTC is halted"
        );
        assert!(!err.is_unavailable());
    }
}
