//! Transaction memos understood by the AMM networks
//!
//! Grammar: `OPCODE:ASSET:ADDRESS:LIMIT[/INTERVAL/QUANTITY]:AFFILIATE:BPS`.
//! Fields are colon-delimited; an empty field is kept when a later field is
//! present and trailing empty fields are dropped.

use thiserror::Error;
use xroute_core::{AffiliateParams, Asset, AssetKind, StreamingParams, ValidationError};

use crate::constants::{alias_for, resolve_alias, AliasTable, THORCHAIN_ASSET_ALIASES};

/// Characters of a token contract kept in the short form
const SHORT_CONTRACT_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoError {
    #[error("Memo of {len} bytes exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },

    #[error("Invalid memo {memo:?}: {reason}")]
    Invalid { memo: String, reason: String },
}

impl From<MemoError> for ValidationError {
    fn from(err: MemoError) -> Self {
        match err {
            MemoError::TooLong { len, max } => ValidationError::MemoTooLong { len, max },
            other => ValidationError::QuoteRejected {
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoOp {
    Swap,
    AddLiquidity,
    Withdraw,
    TradeDeposit,
}

impl MemoOp {
    pub fn opcode(&self) -> &'static str {
        match self {
            Self::Swap => "=",
            Self::AddLiquidity => "+",
            Self::Withdraw => "-",
            Self::TradeDeposit => "TRADE+",
        }
    }

    /// Accepts the canonical opcode and the long and short spellings
    pub fn parse(opcode: &str) -> Option<Self> {
        match opcode.to_ascii_uppercase().as_str() {
            "=" | "SWAP" | "S" => Some(Self::Swap),
            "+" | "ADD" | "A" => Some(Self::AddLiquidity),
            "-" | "WITHDRAW" | "WD" => Some(Self::Withdraw),
            "TRADE+" => Some(Self::TradeDeposit),
            _ => None,
        }
    }
}

/// An instruction to encode into a memo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapMemo {
    Swap {
        asset: Asset,
        destination: String,
        /// Minimum output in pool precision; 0 means no limit
        limit: u128,
        streaming: Option<StreamingParams>,
        affiliate: Option<AffiliateParams>,
    },
    AddLiquidity {
        pool: Asset,
        paired_address: Option<String>,
        affiliate: Option<AffiliateParams>,
    },
    Withdraw {
        pool: Asset,
        basis_points: u32,
        asset: Option<Asset>,
    },
    TradeDeposit {
        address: String,
    },
}

impl SwapMemo {
    pub fn op(&self) -> MemoOp {
        match self {
            Self::Swap { .. } => MemoOp::Swap,
            Self::AddLiquidity { .. } => MemoOp::AddLiquidity,
            Self::Withdraw { .. } => MemoOp::Withdraw,
            Self::TradeDeposit { .. } => MemoOp::TradeDeposit,
        }
    }
}

/// Encodes [`SwapMemo`]s for one carrying chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoBuilder {
    /// Byte limit of the chain carrying the memo
    pub max_len: Option<usize>,
    /// 3-digit tag written into the last digits of the swap limit
    pub interface_tag: Option<u16>,
    /// Gas asset aliases the receiving network understands
    pub aliases: AliasTable,
}

impl Default for MemoBuilder {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl MemoBuilder {
    pub fn new(max_len: Option<usize>, interface_tag: Option<u16>) -> Self {
        Self {
            max_len,
            interface_tag,
            aliases: THORCHAIN_ASSET_ALIASES,
        }
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn build(&self, memo: &SwapMemo) -> Result<String, MemoError> {
        let full = join_fields(self.fields(memo, false));
        let Some(max) = self.max_len else {
            return Ok(full);
        };
        if full.len() <= max {
            return Ok(full);
        }

        let short = join_fields(self.fields(memo, true));
        if short.len() > max {
            return Err(MemoError::TooLong {
                len: short.len(),
                max,
            });
        }
        Ok(short)
    }

    fn fields(&self, memo: &SwapMemo, short: bool) -> Vec<String> {
        let mut fields = vec![memo.op().opcode().to_string()];
        match memo {
            SwapMemo::Swap {
                asset,
                destination,
                limit,
                streaming,
                affiliate,
            } => {
                fields.push(self.memo_asset(asset, short));
                fields.push(destination.clone());
                fields.push(self.limit_field(*limit, streaming.as_ref()));
                if !short {
                    push_affiliate(&mut fields, affiliate.as_ref());
                }
            }
            SwapMemo::AddLiquidity {
                pool,
                paired_address,
                affiliate,
            } => {
                fields.push(self.memo_asset(pool, short));
                fields.push(paired_address.clone().unwrap_or_default());
                if !short {
                    push_affiliate(&mut fields, affiliate.as_ref());
                }
            }
            SwapMemo::Withdraw {
                pool,
                basis_points,
                asset,
            } => {
                fields.push(self.memo_asset(pool, short));
                fields.push(basis_points.to_string());
                fields.push(
                    asset
                        .as_ref()
                        .map(|a| self.memo_asset(a, short))
                        .unwrap_or_default(),
                );
            }
            SwapMemo::TradeDeposit { address } => {
                fields.push(address.clone());
            }
        }
        fields
    }

    fn memo_asset(&self, asset: &Asset, short: bool) -> String {
        if !short {
            return asset.to_string();
        }
        if let Some(alias) = alias_for(self.aliases, asset) {
            return alias.to_string();
        }
        match asset.contract() {
            Some(contract) if asset.kind() == AssetKind::Token => {
                let skip = contract.chars().count().saturating_sub(SHORT_CONTRACT_LEN);
                let tail: String = contract.chars().skip(skip).collect();
                format!("{}.{}-{}", asset.chain(), asset.ticker(), tail)
            }
            _ => asset.to_string(),
        }
    }

    fn limit_field(&self, limit: u128, streaming: Option<&StreamingParams>) -> String {
        let limit = match self.interface_tag {
            Some(tag) => tag_limit(limit, tag),
            None => limit.to_string(),
        };
        match streaming {
            Some(s) => format!("{}/{}/{}", limit, s.interval, s.quantity),
            None if limit == "0" => String::new(),
            None => limit,
        }
    }
}

/// Replace the last three digits of a limit with the interface tag
fn tag_limit(limit: u128, tag: u16) -> String {
    let digits = limit.to_string();
    if limit == 0 || digits.len() <= 3 {
        return digits;
    }
    format!("{}{:03}", &digits[..digits.len() - 3], tag % 1000)
}

fn push_affiliate(fields: &mut Vec<String>, affiliate: Option<&AffiliateParams>) {
    if let Some(affiliate) = affiliate {
        fields.push(affiliate.address.clone());
        fields.push(affiliate.bps.to_string());
    }
}

fn join_fields(mut fields: Vec<String>) -> String {
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields.join(":")
}

/// A memo decoded back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMemo {
    pub op: MemoOp,
    pub asset: Option<Asset>,
    pub address: Option<String>,
    pub limit: Option<u128>,
    pub streaming: Option<StreamingParams>,
    pub affiliate: Option<AffiliateParams>,
    /// Withdrawal share for `-` memos
    pub basis_points: Option<u32>,
}

impl ParsedMemo {
    /// Parse with the THORChain alias table
    pub fn parse(memo: &str) -> Result<Self, MemoError> {
        Self::parse_with(memo, THORCHAIN_ASSET_ALIASES)
    }

    pub fn parse_with(memo: &str, aliases: AliasTable) -> Result<Self, MemoError> {
        let invalid = |reason: &str| MemoError::Invalid {
            memo: memo.to_string(),
            reason: reason.to_string(),
        };
        let fields: Vec<&str> = memo.split(':').collect();
        let field = |i: usize| fields.get(i).copied().filter(|f| !f.is_empty());

        let op = field(0)
            .and_then(MemoOp::parse)
            .ok_or_else(|| invalid("unknown opcode"))?;

        let mut parsed = ParsedMemo {
            op,
            asset: None,
            address: None,
            limit: None,
            streaming: None,
            affiliate: None,
            basis_points: None,
        };

        match op {
            MemoOp::Swap => {
                parsed.asset = Some(parse_asset(aliases, field(1).ok_or_else(|| invalid("missing asset"))?)
                    .map_err(|reason| invalid(&reason))?);
                parsed.address = field(2).map(str::to_string);
                if let Some(limit) = field(3) {
                    let (limit, streaming) = parse_limit(limit).map_err(|reason| invalid(&reason))?;
                    parsed.limit = Some(limit);
                    parsed.streaming = streaming;
                }
                parsed.affiliate = parse_affiliate(field(4), field(5)).map_err(|reason| invalid(&reason))?;
            }
            MemoOp::AddLiquidity => {
                parsed.asset = Some(parse_asset(aliases, field(1).ok_or_else(|| invalid("missing pool"))?)
                    .map_err(|reason| invalid(&reason))?);
                parsed.address = field(2).map(str::to_string);
                parsed.affiliate = parse_affiliate(field(3), field(4)).map_err(|reason| invalid(&reason))?;
            }
            MemoOp::Withdraw => {
                parsed.asset = Some(parse_asset(aliases, field(1).ok_or_else(|| invalid("missing pool"))?)
                    .map_err(|reason| invalid(&reason))?);
                let bps = field(2).ok_or_else(|| invalid("missing basis points"))?;
                parsed.basis_points = Some(
                    bps.parse::<u32>()
                        .map_err(|_| invalid("basis points must be an integer"))?,
                );
            }
            MemoOp::TradeDeposit => {
                parsed.address = Some(
                    field(1)
                        .ok_or_else(|| invalid("missing address"))?
                        .to_string(),
                );
            }
        }

        Ok(parsed)
    }
}

fn parse_asset(aliases: AliasTable, raw: &str) -> Result<Asset, String> {
    let notation = resolve_alias(aliases, raw).unwrap_or(raw);
    notation.parse::<Asset>().map_err(|e| e.to_string())
}

fn parse_limit(raw: &str) -> Result<(u128, Option<StreamingParams>), String> {
    let mut parts = raw.split('/');
    let limit = match parts.next().filter(|p| !p.is_empty()) {
        Some(limit) => limit
            .parse::<u128>()
            .map_err(|_| format!("limit {:?} is not an integer", limit))?,
        None => 0,
    };
    let streaming = match (parts.next(), parts.next()) {
        (Some(interval), Some(quantity)) => Some(StreamingParams {
            interval: interval
                .parse()
                .map_err(|_| format!("interval {:?} is not an integer", interval))?,
            quantity: quantity
                .parse()
                .map_err(|_| format!("quantity {:?} is not an integer", quantity))?,
        }),
        (None, None) => None,
        _ => return Err("streaming parameters need an interval and a quantity".to_string()),
    };
    Ok((limit, streaming))
}

fn parse_affiliate(
    address: Option<&str>,
    bps: Option<&str>,
) -> Result<Option<AffiliateParams>, String> {
    match (address, bps) {
        (Some(address), bps) => {
            let bps = match bps {
                Some(bps) => bps
                    .parse()
                    .map_err(|_| format!("affiliate bps {:?} is not an integer", bps))?,
                None => 0,
            };
            Ok(Some(AffiliateParams {
                address: address.to_string(),
                bps,
            }))
        }
        (None, Some(_)) => Err("affiliate bps without an affiliate".to_string()),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MAYACHAIN_ASSET_ALIASES, UTXO_MEMO_LIMIT};

    const USDC: &str = "ETH.USDC-0XA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48";

    fn swap(asset: &str, limit: u128) -> SwapMemo {
        SwapMemo::Swap {
            asset: asset.parse().unwrap(),
            destination: "0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b".to_string(),
            limit,
            streaming: None,
            affiliate: None,
        }
    }

    #[test]
    fn test_basic_swap_memo() {
        let memo = MemoBuilder::default().build(&swap("ETH.ETH", 12_345)).unwrap();
        assert_eq!(
            memo,
            "=:ETH.ETH:0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b:12345"
        );
    }

    #[test]
    fn test_zero_limit_is_trimmed() {
        let memo = MemoBuilder::default().build(&swap("ETH.ETH", 0)).unwrap();
        assert_eq!(memo, "=:ETH.ETH:0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b");
    }

    #[test]
    fn test_empty_limit_kept_before_affiliate() {
        let memo = SwapMemo::Swap {
            asset: "BTC.BTC".parse().unwrap(),
            destination: "bc1qdest".to_string(),
            limit: 0,
            streaming: None,
            affiliate: Some(AffiliateParams {
                address: "thor1aff".to_string(),
                bps: 30,
            }),
        };
        assert_eq!(
            MemoBuilder::default().build(&memo).unwrap(),
            "=:BTC.BTC:bc1qdest::thor1aff:30"
        );
    }

    #[test]
    fn test_streaming_and_interface_tag() {
        let memo = SwapMemo::Swap {
            asset: "BTC.BTC".parse().unwrap(),
            destination: "bc1qdest".to_string(),
            limit: 1_234_567,
            streaming: Some(StreamingParams {
                interval: 3,
                quantity: 10,
            }),
            affiliate: None,
        };
        let builder = MemoBuilder::new(None, Some(42));
        assert_eq!(builder.build(&memo).unwrap(), "=:BTC.BTC:bc1qdest:1234042/3/10");
    }

    #[test]
    fn test_interface_tag_skips_short_limits() {
        assert_eq!(tag_limit(0, 42), "0");
        assert_eq!(tag_limit(999, 42), "999");
        assert_eq!(tag_limit(1_000, 7), "1007");
    }

    #[test]
    fn test_long_memo_is_shortened_for_utxo() {
        let memo = SwapMemo::Swap {
            asset: USDC.parse().unwrap(),
            destination: "0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b".to_string(),
            limit: 987_654_321,
            streaming: None,
            affiliate: Some(AffiliateParams {
                address: "thor1affiliate".to_string(),
                bps: 50,
            }),
        };
        let builder = MemoBuilder::new(Some(80), None);
        let built = builder.build(&memo).unwrap();
        assert_eq!(
            built,
            "=:ETH.USDC-6EB48:0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b:987654321"
        );
        assert!(built.len() <= 80);
    }

    #[test]
    fn test_gas_asset_alias_in_short_form() {
        let memo = SwapMemo::Swap {
            asset: "ETH.ETH".parse().unwrap(),
            destination: "0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b".to_string(),
            limit: 1,
            streaming: None,
            affiliate: Some(AffiliateParams {
                address: "thor1affiliate-address-that-is-long".to_string(),
                bps: 50,
            }),
        };
        let built = MemoBuilder::new(Some(80), None).build(&memo).unwrap();
        assert_eq!(built, "=:e:0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b:1");
    }

    #[test]
    fn test_short_form_drops_affiliate_and_parses_back() {
        let memo = SwapMemo::Swap {
            asset: USDC.parse().unwrap(),
            destination: "0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b".to_string(),
            limit: 123_456_789,
            streaming: None,
            affiliate: Some(AffiliateParams {
                address: "thor1xroute".to_string(),
                bps: 75,
            }),
        };
        let builder = MemoBuilder::new(Some(UTXO_MEMO_LIMIT), None);
        let full = MemoBuilder::default().build(&memo).unwrap();
        assert!(full.len() > UTXO_MEMO_LIMIT);

        let built = builder.build(&memo).unwrap();
        assert!(built.len() <= UTXO_MEMO_LIMIT);
        assert!(!built.contains("thor1xroute"));
        assert!(!built.ends_with(":75"));
        assert_eq!(built.split(':').nth(1), Some("ETH.USDC-6EB48"));

        let parsed = ParsedMemo::parse(&built).unwrap();
        assert_eq!(parsed.op, MemoOp::Swap);
        assert_eq!(
            parsed.address.as_deref(),
            Some("0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b")
        );
        assert_eq!(parsed.limit, Some(123_456_789));
        assert_eq!(parsed.affiliate, None);
        assert_eq!(parsed.asset.unwrap().contract(), Some("6EB48"));
    }

    #[test]
    fn test_mayachain_short_form_keeps_full_gas_notation() {
        let memo = SwapMemo::Swap {
            asset: "ETH.ETH".parse().unwrap(),
            destination: "0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b".to_string(),
            limit: 1,
            streaming: None,
            affiliate: Some(AffiliateParams {
                address: "maya1affiliate-address-that-is-long".to_string(),
                bps: 50,
            }),
        };
        let built = MemoBuilder::new(Some(UTXO_MEMO_LIMIT), None)
            .with_aliases(MAYACHAIN_ASSET_ALIASES)
            .build(&memo)
            .unwrap();
        assert_eq!(built, "=:ETH.ETH:0x3d9c2a6b1e7f0a5d4c8b9e2f1a0d3c4b5e6f7a8b:1");

        assert!(ParsedMemo::parse_with("=:e:0xabc", MAYACHAIN_ASSET_ALIASES).is_err());
        let parsed = ParsedMemo::parse_with("=:DASH.DASH:Xdest", MAYACHAIN_ASSET_ALIASES).unwrap();
        assert_eq!(parsed.asset, Some("DASH.DASH".parse().unwrap()));
    }

    #[test]
    fn test_memo_too_long_even_short() {
        let memo = SwapMemo::Swap {
            asset: "BTC.BTC".parse().unwrap(),
            destination: "x".repeat(90),
            limit: 1,
            streaming: None,
            affiliate: None,
        };
        let err = MemoBuilder::new(Some(80), None).build(&memo).unwrap_err();
        assert_eq!(err, MemoError::TooLong { len: 96, max: 80 });
        assert_eq!(
            ValidationError::from(err),
            ValidationError::MemoTooLong { len: 96, max: 80 }
        );
    }

    #[test]
    fn test_other_opcodes() {
        let builder = MemoBuilder::default();
        let add = SwapMemo::AddLiquidity {
            pool: "BTC.BTC".parse().unwrap(),
            paired_address: Some("thor1paired".to_string()),
            affiliate: None,
        };
        assert_eq!(builder.build(&add).unwrap(), "+:BTC.BTC:thor1paired");

        let withdraw = SwapMemo::Withdraw {
            pool: "BTC.BTC".parse().unwrap(),
            basis_points: 5_000,
            asset: None,
        };
        assert_eq!(builder.build(&withdraw).unwrap(), "-:BTC.BTC:5000");

        let trade = SwapMemo::TradeDeposit {
            address: "thor1owner".to_string(),
        };
        assert_eq!(builder.build(&trade).unwrap(), "TRADE+:thor1owner");
    }

    #[test]
    fn test_build_parse_round_trip() {
        let memo = SwapMemo::Swap {
            asset: "BTC/BTC".parse().unwrap(),
            destination: "thor1dest".to_string(),
            limit: 5_000_000,
            streaming: Some(StreamingParams {
                interval: 1,
                quantity: 0,
            }),
            affiliate: Some(AffiliateParams {
                address: "thor1aff".to_string(),
                bps: 25,
            }),
        };
        let built = MemoBuilder::default().build(&memo).unwrap();
        let parsed = ParsedMemo::parse(&built).unwrap();

        assert_eq!(parsed.op, MemoOp::Swap);
        assert_eq!(parsed.asset, Some("BTC/BTC".parse().unwrap()));
        assert_eq!(parsed.address.as_deref(), Some("thor1dest"));
        assert_eq!(parsed.limit, Some(5_000_000));
        assert_eq!(
            parsed.streaming,
            Some(StreamingParams {
                interval: 1,
                quantity: 0
            })
        );
        assert_eq!(parsed.affiliate.map(|a| a.bps), Some(25));
    }

    #[test]
    fn test_parse_aliases_and_long_opcodes() {
        let parsed = ParsedMemo::parse("SWAP:r:thor1dest:100").unwrap();
        assert_eq!(parsed.asset, Some("THOR.RUNE".parse().unwrap()));
        assert_eq!(parsed.limit, Some(100));

        let parsed = ParsedMemo::parse("=:b:bc1qdest").unwrap();
        assert_eq!(parsed.asset, Some("BTC.BTC".parse().unwrap()));
        assert_eq!(parsed.limit, None);

        let parsed = ParsedMemo::parse("-:ETH.ETH:2500").unwrap();
        assert_eq!(parsed.op, MemoOp::Withdraw);
        assert_eq!(parsed.basis_points, Some(2_500));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ParsedMemo::parse("").is_err());
        assert!(ParsedMemo::parse("NOOP:BTC.BTC").is_err());
        assert!(ParsedMemo::parse("=:BTC.BTC:addr:12/3").is_err());
        assert!(ParsedMemo::parse("=").is_err());
    }
}
