//! xroute-core: Shared types, errors, and configuration
//!
//! This crate provides the foundational types used across the xroute workspace:
//! validated assets, exact amounts, swap requests, quotes and history, and the traits
//! that protocol adapters and wallets implement.

pub mod amount;
pub mod config;
pub mod errors;
pub mod history;
pub mod protocol;
pub mod quote;
pub mod types;
pub mod wallet;

pub use amount::*;
pub use config::*;
pub use errors::*;
pub use history::*;
pub use protocol::*;
pub use quote::*;
pub use types::*;
pub use wallet::*;
