//! Core type definitions for xroute

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::AssetParseError;

/// Well-known chain identifiers
pub mod chains {
    pub const BTC: &str = "BTC";
    pub const BCH: &str = "BCH";
    pub const LTC: &str = "LTC";
    pub const DOGE: &str = "DOGE";
    pub const DASH: &str = "DASH";
    pub const ETH: &str = "ETH";
    pub const AVAX: &str = "AVAX";
    pub const BSC: &str = "BSC";
    pub const BASE: &str = "BASE";
    pub const ARB: &str = "ARB";
    pub const GAIA: &str = "GAIA";
    pub const KUJI: &str = "KUJI";
    pub const XRD: &str = "XRD";
    pub const DOT: &str = "DOT";
    pub const SOL: &str = "SOL";
    pub const THOR: &str = "THOR";
    pub const MAYA: &str = "MAYA";
}

/// Chain identifier, always upper-case ASCII alphanumeric
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chain(String);

impl Chain {
    pub fn new(id: impl AsRef<str>) -> Result<Self, AssetParseError> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(AssetParseError::EmptyChain);
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AssetParseError::InvalidChain {
                chain: id.to_string(),
            });
        }
        Ok(Self(id.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a well-known identifier
    pub fn is(&self, id: &str) -> bool {
        self.0.eq_ignore_ascii_case(id)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Chain {
    type Err = AssetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Chain {
    type Error = AssetParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Chain> for String {
    fn from(chain: Chain) -> Self {
        chain.0
    }
}

/// How an asset is held by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Gas asset of its chain (e.g. BTC.BTC)
    Native,
    /// Contract token on its chain (e.g. ETH.USDC-0xA0b8...)
    Token,
    /// Synthetic claim held on the settlement chain (e.g. BTC/BTC)
    Synth,
    /// Trade-account balance (e.g. BTC~BTC)
    Trade,
}

impl AssetKind {
    /// Separator between chain and symbol in string notation
    pub fn separator(&self) -> char {
        match self {
            Self::Native | Self::Token => '.',
            Self::Synth => '/',
            Self::Trade => '~',
        }
    }
}

/// A validated asset identifier.
///
/// Equality and hashing ignore ASCII case on every field, so
/// `eth.usdc-0xa0b8` and `ETH.USDC-0XA0B8` are the same asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    chain: Chain,
    symbol: String,
    ticker: String,
    kind: AssetKind,
}

impl Asset {
    /// Build a native (gas) asset such as `BTC.BTC`
    pub fn native(chain: &str, symbol: &str) -> Result<Self, AssetParseError> {
        format!("{}.{}", chain, symbol).parse()
    }

    /// Native asset from well-known identifiers, skipping validation
    pub fn known_native(chain: &str, symbol: &str) -> Self {
        let symbol = symbol.to_ascii_uppercase();
        Asset {
            chain: Chain(chain.to_ascii_uppercase()),
            ticker: symbol.clone(),
            symbol,
            kind: AssetKind::Native,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Contract address for token symbols (`TICKER-CONTRACT`)
    pub fn contract(&self) -> Option<&str> {
        self.symbol.split_once('-').map(|(_, contract)| contract)
    }

    pub fn is_synth(&self) -> bool {
        self.kind == AssetKind::Synth
    }

    pub fn is_trade(&self) -> bool {
        self.kind == AssetKind::Trade
    }

    /// The layer-1 asset backing a synth or trade asset (identity otherwise)
    pub fn to_l1(&self) -> Asset {
        let kind = match self.kind {
            AssetKind::Synth | AssetKind::Trade if self.contract().is_some() => AssetKind::Token,
            AssetKind::Synth | AssetKind::Trade => AssetKind::Native,
            other => other,
        };
        Asset {
            chain: self.chain.clone(),
            symbol: self.symbol.clone(),
            ticker: self.ticker.clone(),
            kind,
        }
    }

    /// Whether two assets share the same pool (same chain and symbol)
    pub fn same_pool(&self, other: &Asset) -> bool {
        self.chain == other.chain && self.symbol.eq_ignore_ascii_case(&other.symbol)
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.chain == other.chain
            && self.symbol.eq_ignore_ascii_case(&other.symbol)
            && self.ticker.eq_ignore_ascii_case(&other.ticker)
    }
}

impl Eq for Asset {}

impl Hash for Asset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain.hash(state);
        self.symbol.to_ascii_uppercase().hash(state);
        self.kind.hash(state);
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.chain, self.kind.separator(), self.symbol)
    }
}

impl FromStr for Asset {
    type Err = AssetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AssetParseError::Empty);
        }

        let (index, separator) = s
            .char_indices()
            .find(|(_, c)| matches!(c, '.' | '/' | '~'))
            .ok_or_else(|| AssetParseError::MissingSeparator {
                input: s.to_string(),
            })?;

        let chain = Chain::new(&s[..index])?;
        let symbol = &s[index + separator.len_utf8()..];
        if symbol.is_empty() {
            return Err(AssetParseError::EmptySymbol {
                input: s.to_string(),
            });
        }

        let (ticker, has_contract) = match symbol.split_once('-') {
            Some((ticker, contract)) => {
                if ticker.is_empty() {
                    return Err(AssetParseError::EmptySymbol {
                        input: s.to_string(),
                    });
                }
                if contract.is_empty() {
                    return Err(AssetParseError::EmptyContract {
                        input: s.to_string(),
                    });
                }
                (ticker, true)
            }
            None => (symbol, false),
        };

        let kind = match separator {
            '/' => AssetKind::Synth,
            '~' => AssetKind::Trade,
            _ if has_contract => AssetKind::Token,
            _ => AssetKind::Native,
        };

        Ok(Self {
            chain,
            symbol: symbol.to_string(),
            ticker: ticker.to_ascii_uppercase(),
            kind,
        })
    }
}

impl TryFrom<String> for Asset {
    type Error = AssetParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

/// Identifier of a swap protocol (e.g. "thorchain")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(pub String);

impl ProtocolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash as returned by a chain client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
