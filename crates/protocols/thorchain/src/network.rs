//! THORChain network rules

use amm::ClpNetwork;
use pool_cache::NetworkFlavor;
use xroute_core::{chains, Asset, ProtocolId};

pub const RUNE: &str = "THOR.RUNE";
pub const RUNE_DECIMALS: u8 = 8;

/// 0.02 RUNE, used until the network reports NATIVETRANSACTIONFEE
const DEFAULT_NATIVE_FEE: u128 = 2_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct ThorchainNetwork;

impl ClpNetwork for ThorchainNetwork {
    fn protocol_id(&self) -> ProtocolId {
        ProtocolId::new("thorchain")
    }

    fn flavor(&self) -> NetworkFlavor {
        NetworkFlavor {
            path_prefix: "thorchain",
            settlement_asset: RUNE,
            native_decimals: RUNE_DECIMALS,
        }
    }

    fn settlement_asset(&self) -> Asset {
        Asset::known_native(chains::THOR, "RUNE")
    }

    fn default_native_fee(&self) -> u128 {
        DEFAULT_NATIVE_FEE
    }
}
