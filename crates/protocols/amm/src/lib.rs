//! Constant-product AMM engine
//!
//! Shared by every network that pairs its pools against a single settlement
//! asset: swap math, memo encoding, quote estimation, swap history and the generic
//! [`ClpAdapter`]. Network crates only describe their rules through
//! [`ClpNetwork`].

pub mod adapter;
pub mod calculator;
pub mod constants;
pub mod estimator;
pub mod history;
pub mod memo;
pub mod state;

// Re-exports
pub use adapter::{
    history_sources_from_config, sources_from_config, ClpAdapter, ClpSettings,
    DEFAULT_EXECUTION_TIMEOUT,
};
pub use calculator::{
    apply_fee, apply_tolerance, bps_of, double_swap_slip_bps, spot_value, swap_output,
    swap_slip_bps,
};
pub use constants::{chain_attributes, gas_asset, memo_limit, ChainAttributes, GasModel};
pub use estimator::{estimate, EstimateContext};
pub use history::swap_records;
pub use memo::{MemoBuilder, MemoError, MemoOp, ParsedMemo, SwapMemo};
pub use state::{ClpNetwork, Route, RouteOutput};
