//! The uniform capability surface every swap protocol implements

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::amount::{BaseAmount, CryptoAmount};
use crate::errors::AdapterError;
use crate::history::{ChainAddress, SwapHistory};
use crate::quote::{SwapQuote, SwapRequest, TxSubmitted};
use crate::types::{Asset, Chain, ProtocolId};

/// Lifecycle phase of an adapter (per adapter, not per request)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Uninitialized,
    Ready,
    Estimating,
    Executing,
}

impl AdapterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Estimating => "estimating",
            Self::Executing => "executing",
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the adapter phase across concurrent calls
#[derive(Debug, Default)]
pub struct Lifecycle {
    initialized: AtomicBool,
    estimating: AtomicUsize,
    executing: AtomicUsize,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executing wins over Estimating when both are in flight
    pub fn state(&self) -> AdapterState {
        if self.executing.load(Ordering::Acquire) > 0 {
            AdapterState::Executing
        } else if self.estimating.load(Ordering::Acquire) > 0 {
            AdapterState::Estimating
        } else if self.initialized.load(Ordering::Acquire) {
            AdapterState::Ready
        } else {
            AdapterState::Uninitialized
        }
    }

    /// Called once protocol state has been loaded successfully
    pub fn mark_ready(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn begin_estimate(&self) -> PhaseGuard<'_> {
        self.estimating.fetch_add(1, Ordering::AcqRel);
        PhaseGuard {
            counter: &self.estimating,
        }
    }

    pub fn begin_execute(&self) -> PhaseGuard<'_> {
        self.executing.fetch_add(1, Ordering::AcqRel);
        PhaseGuard {
            counter: &self.executing,
        }
    }
}

/// Leaves the phase when dropped
pub struct PhaseGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A swap protocol behind a uniform interface.
///
/// The aggregator only ever sees this trait; adding a protocol means adding
/// one implementation.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync + fmt::Debug {
    fn id(&self) -> ProtocolId;

    fn state(&self) -> AdapterState;

    /// Whether the protocol can swap from or into `asset`
    async fn is_asset_supported(&self, asset: &Asset) -> Result<bool, AdapterError>;

    async fn supported_chains(&self) -> Result<Vec<Chain>, AdapterError>;

    /// Quote a swap. Validation problems are reported inside the quote.
    async fn estimate_swap(&self, request: &SwapRequest) -> Result<SwapQuote, AdapterError>;

    /// Re-estimate and broadcast the swap through the configured wallet
    async fn do_swap(&self, request: &SwapRequest) -> Result<TxSubmitted, AdapterError>;

    /// Whether `address` must approve the protocol router before swapping `amount`
    async fn should_be_approved(
        &self,
        _amount: &CryptoAmount,
        _address: &str,
    ) -> Result<bool, AdapterError> {
        Ok(false)
    }

    /// Let the protocol router spend `asset` from the wallet; `None` approves the maximum
    async fn approve_router_to_spend(
        &self,
        _asset: &Asset,
        _amount: Option<BaseAmount>,
    ) -> Result<TxSubmitted, AdapterError> {
        Err(AdapterError::NotSupported {
            protocol: self.id().to_string(),
            operation: "router approvals",
        })
    }

    async fn swap_history(&self, _addresses: &[ChainAddress]) -> Result<SwapHistory, AdapterError> {
        Err(AdapterError::NotSupported {
            protocol: self.id().to_string(),
            operation: "swap history",
        })
    }
}
