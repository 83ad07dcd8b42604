//! AMM State Types
//!
//! Network rules and swap routes shared by the estimator and adapter.

use std::fmt;

use pool_cache::{InboundDetail, NetworkFlavor, Pool, POOL_DECIMALS};
use xroute_core::{Asset, BaseAmount, Chain, ProtocolId};

use crate::calculator::{apply_fee, double_swap_slip_bps, swap_output, swap_slip_bps};
use crate::constants::{AliasTable, THORCHAIN_ASSET_ALIASES};

/// What distinguishes one constant-product network from another
pub trait ClpNetwork: Send + Sync + fmt::Debug + 'static {
    fn protocol_id(&self) -> ProtocolId;

    fn flavor(&self) -> NetworkFlavor;

    /// The asset every pool is paired against
    fn settlement_asset(&self) -> Asset;

    fn settlement_chain(&self) -> Chain {
        self.settlement_asset().chain().clone()
    }

    /// Flat fee for settlement-chain transfers, in settlement base units
    fn default_native_fee(&self) -> u128;

    /// Gas asset aliases accepted in memos
    fn memo_aliases(&self) -> AliasTable {
        THORCHAIN_ASSET_ALIASES
    }

    /// Network-specific answer that short-circuits the pool lookup
    fn support_override(&self, _asset: &Asset) -> Option<bool> {
        None
    }

    /// Minimum inbound amount on `chain`
    fn dust_threshold(&self, _chain: &Chain, inbound: Option<&InboundDetail>) -> BaseAmount {
        BaseAmount::new(inbound.map_or(0, |d| d.dust_threshold), POOL_DECIMALS)
    }

    fn is_settlement(&self, asset: &Asset) -> bool {
        asset == &self.settlement_asset()
    }

    /// Assets moved with a settlement-chain deposit rather than an inbound transfer
    fn is_settlement_side(&self, asset: &Asset) -> bool {
        self.is_settlement(asset) || asset.is_synth() || asset.is_trade()
    }
}

/// Depths a swap travels through, in pool base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// One pool: `x` is the input-side depth, `y` the output-side depth
    Single { x: u128, y: u128 },
    /// Asset to settlement through the first pool, settlement to asset through the second
    Double { x1: u128, y1: u128, x2: u128, y2: u128 },
}

/// Result of running an input through a [`Route`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutput {
    /// Output after the liquidity fee on every hop
    pub output: u128,
    /// Output with no liquidity fee
    pub output_no_fee: u128,
    pub slip_bps: u32,
}

impl RouteOutput {
    pub fn liquidity_fee(&self) -> u128 {
        self.output_no_fee.saturating_sub(self.output)
    }
}

impl Route {
    /// Route from `from` to `to`, either of which may be the settlement asset
    pub fn between(from: Option<&Pool>, to: Option<&Pool>) -> Option<Self> {
        match (from, to) {
            (None, Some(to)) => Some(Self::Single {
                x: to.native_balance.amount,
                y: to.asset_balance.amount,
            }),
            (Some(from), None) => Some(Self::Single {
                x: from.asset_balance.amount,
                y: from.native_balance.amount,
            }),
            (Some(from), Some(to)) => Some(Self::Double {
                x1: from.asset_balance.amount,
                y1: from.native_balance.amount,
                x2: to.native_balance.amount,
                y2: to.asset_balance.amount,
            }),
            (None, None) => None,
        }
    }

    pub fn hops(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Double { .. } => 2,
        }
    }

    pub fn evaluate(&self, input: u128, fee_bps: u32) -> RouteOutput {
        match *self {
            Self::Single { x, y } => {
                let output_no_fee = swap_output(x, y, input);
                RouteOutput {
                    output: apply_fee(output_no_fee, fee_bps),
                    output_no_fee,
                    slip_bps: swap_slip_bps(x, input),
                }
            }
            Self::Double { x1, y1, x2, y2 } => {
                let mid_no_fee = swap_output(x1, y1, input);
                let mid = apply_fee(mid_no_fee, fee_bps);
                RouteOutput {
                    output: apply_fee(swap_output(x2, y2, mid), fee_bps),
                    output_no_fee: swap_output(x2, y2, mid_no_fee),
                    slip_bps: double_swap_slip_bps(x1, y1, x2, input),
                }
            }
        }
    }
}
