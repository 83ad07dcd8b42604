//! Swap estimation against a snapshot of pool and network state
//!
//! All pool math runs in pool units: the asset side of every pool at
//! [`POOL_DECIMALS`], the settlement side at the network's native decimals.
//! Results are rescaled to the destination asset's precision at the end.
//! Validation problems never abort an estimate; they land in the quote's
//! `errors` and clear `can_swap`.

use std::cmp::Ordering;

use pool_cache::{keys, InboundDetail, NetworkValues, Pool, StateSnapshot, POOL_DECIMALS};
use xroute_core::{
    Asset, BaseAmount, CryptoAmount, FeeBreakdown, ProtocolId, SwapQuote, SwapRequest,
    ValidationError,
};

use crate::calculator::{apply_tolerance, bps_of, div_ceil, spot_value};
use crate::constants::{
    chain_attributes, gas_asset, inbound_gas_fee, memo_limit, SETTLEMENT_BLOCK_SECS,
};
use crate::memo::{MemoBuilder, SwapMemo};
use crate::state::{ClpNetwork, Route};

/// Outbound queue cap when the network does not report one
const DEFAULT_MAX_TX_OUT_OFFSET: u128 = 720;

/// Everything an estimate reads
pub struct EstimateContext<'a> {
    pub network: &'a dyn ClpNetwork,
    pub snapshot: &'a StateSnapshot,
    /// Liquidity fee taken on every hop
    pub liquidity_fee_bps: u32,
    pub interface_tag: Option<u16>,
}

/// Estimate a swap. Pure: the same context and request give the same quote.
pub fn estimate(ctx: &EstimateContext<'_>, request: &SwapRequest) -> SwapQuote {
    Estimator::new(ctx).estimate(request)
}

enum PoolLookup<'p> {
    Settlement,
    Found(&'p Pool),
    Missing,
}

impl<'p> PoolLookup<'p> {
    /// `Some(None)` for the settlement asset, `None` when no pool exists
    fn pool(&self) -> Option<Option<&'p Pool>> {
        match self {
            Self::Settlement => Some(None),
            Self::Found(pool) => Some(Some(pool)),
            Self::Missing => None,
        }
    }
}

struct Estimator<'a> {
    ctx: &'a EstimateContext<'a>,
    protocol: ProtocolId,
    settlement: Asset,
    native_decimals: u8,
}

fn rejected(reason: impl Into<String>) -> ValidationError {
    ValidationError::QuoteRejected {
        reason: reason.into(),
    }
}

fn push_unique(errors: &mut Vec<ValidationError>, error: ValidationError) {
    if !errors.contains(&error) {
        errors.push(error);
    }
}

fn network_value(values: &NetworkValues, key: &str) -> Option<u128> {
    values.get(key).and_then(|v| u128::try_from(v).ok())
}

fn saturating_secs(blocks: u128, block_secs: u64) -> u64 {
    u64::try_from(blocks)
        .unwrap_or(u64::MAX)
        .saturating_mul(block_secs)
}

impl<'a> Estimator<'a> {
    fn new(ctx: &'a EstimateContext<'a>) -> Self {
        let flavor = ctx.network.flavor();
        Self {
            ctx,
            protocol: ctx.network.protocol_id(),
            settlement: ctx.network.settlement_asset(),
            native_decimals: flavor.native_decimals,
        }
    }

    fn snapshot(&self) -> &'a StateSnapshot {
        self.ctx.snapshot
    }

    fn is_settlement(&self, asset: &Asset) -> bool {
        asset == &self.settlement
    }

    fn lookup(&self, asset: &Asset) -> PoolLookup<'a> {
        if self.is_settlement(asset) {
            return PoolLookup::Settlement;
        }
        match self.snapshot().pool_for(asset) {
            Some(pool) => PoolLookup::Found(pool),
            None => PoolLookup::Missing,
        }
    }

    /// Precision of `asset` inside pool math
    fn pool_decimals(&self, asset: &Asset) -> u8 {
        if self.is_settlement(asset) {
            self.native_decimals
        } else {
            POOL_DECIMALS
        }
    }

    /// Precision the destination amount is reported in
    fn output_decimals(&self, asset: &Asset) -> u8 {
        if self.is_settlement(asset) {
            return self.native_decimals;
        }
        if asset.is_synth() || asset.is_trade() {
            return POOL_DECIMALS;
        }
        self.snapshot()
            .pool_for(asset)
            .map_or(POOL_DECIMALS, |pool| pool.asset_decimals)
    }

    fn native_fee(&self) -> u128 {
        network_value(&self.snapshot().network, keys::NATIVE_TX_FEE)
            .unwrap_or_else(|| self.ctx.network.default_native_fee())
    }

    fn to_native(&self, asset: &Asset, amount: u128) -> Option<u128> {
        if self.is_settlement(asset) {
            return Some(amount);
        }
        let pool = self.snapshot().pool_for(asset)?;
        Some(spot_value(
            amount,
            pool.asset_balance.amount,
            pool.native_balance.amount,
        ))
    }

    fn from_native(&self, asset: &Asset, amount: u128) -> Option<u128> {
        if self.is_settlement(asset) {
            return Some(amount);
        }
        let pool = self.snapshot().pool_for(asset)?;
        Some(spot_value(
            amount,
            pool.native_balance.amount,
            pool.asset_balance.amount,
        ))
    }

    /// Value `amount` of `from` in `to` at spot prices, both in pool units
    fn convert(&self, amount: u128, from: &Asset, to: &Asset) -> Option<u128> {
        if from.same_pool(to) {
            return Some(amount);
        }
        self.from_native(to, self.to_native(from, amount)?)
    }

    fn scale(
        &self,
        amount: u128,
        from_decimals: u8,
        to_decimals: u8,
    ) -> Result<BaseAmount, ValidationError> {
        BaseAmount::new(amount, from_decimals)
            .rescale_floor(to_decimals)
            .map_err(|e| rejected(e.to_string()))
    }

    fn check_halts(&self, asset: &Asset, errors: &mut Vec<ValidationError>) {
        if self.is_settlement(asset) {
            return;
        }
        let chain = asset.chain();
        let detail = self.snapshot().inbound_for(chain);
        let values = &self.snapshot().network;
        let touches_chain = !asset.is_synth() && !asset.is_trade();

        if touches_chain && (detail.is_some_and(|d| d.halted_chain) || values.is_chain_halted(chain)) {
            push_unique(
                errors,
                ValidationError::ChainHalted {
                    chain: chain.to_string(),
                },
            );
        }
        if detail.is_some_and(|d| d.halted_trading) || values.is_trading_halted(chain) {
            push_unique(
                errors,
                ValidationError::TradingHalted {
                    chain: chain.to_string(),
                },
            );
        }
    }

    /// Outbound fee in destination pool units
    fn outbound_fee(
        &self,
        to: &Asset,
        detail: Option<&InboundDetail>,
    ) -> Result<u128, ValidationError> {
        if self.ctx.network.is_settlement_side(to) {
            return self
                .from_native(to, self.native_fee())
                .ok_or_else(|| rejected(format!("No pool to price the outbound fee in {}", to)));
        }
        let detail =
            detail.ok_or_else(|| rejected(format!("No inbound address for {}", to.chain())))?;
        let gas = gas_asset(to.chain())
            .ok_or_else(|| rejected(format!("Unknown gas asset for {}", to.chain())))?;
        self.convert(detail.outbound_fee, &gas, to)
            .ok_or_else(|| rejected(format!("No pool for gas asset {}", gas)))
    }

    /// Inbound fee in destination pool units; reported, never deducted
    fn inbound_fee(&self, from: &Asset, to: &Asset, detail: Option<&InboundDetail>) -> u128 {
        let fee = if self.ctx.network.is_settlement_side(from) {
            self.from_native(to, self.native_fee())
        } else {
            match (detail, gas_asset(from.chain())) {
                (Some(detail), Some(gas)) => {
                    let fee = inbound_gas_fee(from, detail.gas_rate, detail.outbound_tx_size);
                    self.convert(fee, &gas, to)
                }
                _ => None,
            }
        };
        fee.unwrap_or_else(|| {
            tracing::debug!(from = %from, to = %to, "Inbound fee could not be priced");
            0
        })
    }

    fn confirmation_seconds(&self, from: &Asset, input: u128) -> u64 {
        if self.ctx.network.is_settlement_side(from) {
            return SETTLEMENT_BLOCK_SECS;
        }
        let attributes = chain_attributes(from.chain());
        if attributes.block_reward == 0 {
            return SETTLEMENT_BLOCK_SECS;
        }
        let in_gas = gas_asset(from.chain())
            .and_then(|gas| self.convert(input, from, &gas))
            .unwrap_or(0);
        let confirmations = div_ceil(in_gas, attributes.block_reward).max(1);
        saturating_secs(confirmations, attributes.block_time_secs)
    }

    /// Blocks the network holds the outbound back, by its scheduling rule
    fn outbound_delay_seconds(&self, to: &Asset, output: u128) -> u64 {
        let values = &self.snapshot().network;
        let value = self.to_native(to, output).unwrap_or(0);
        let threshold = network_value(values, keys::MIN_TX_OUT_VOLUME_THRESHOLD).unwrap_or(0);
        if threshold == 0 || value < threshold {
            return SETTLEMENT_BLOCK_SECS;
        }

        let scheduled = network_value(values, keys::SCHEDULED_OUTBOUND_VALUE).unwrap_or(0);
        let volume = value.saturating_add(scheduled) / threshold;
        let delay_rate = network_value(values, keys::TX_OUT_DELAY_RATE)
            .unwrap_or(0)
            .saturating_sub(volume)
            .max(1);
        let max_offset = network_value(values, keys::MAX_TX_OUT_OFFSET)
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_TX_OUT_OFFSET);

        let blocks = (value / delay_rate).clamp(1, max_offset.max(1));
        saturating_secs(blocks, SETTLEMENT_BLOCK_SECS)
    }

    fn estimate(&self, request: &SwapRequest) -> SwapQuote {
        let to = &request.destination_asset;
        let output_decimals = self.output_decimals(to);
        match self.try_estimate(request, output_decimals) {
            Ok(quote) => quote,
            Err(errors) => {
                SwapQuote::rejected(self.protocol.clone(), request, output_decimals, errors)
            }
        }
    }

    fn try_estimate(
        &self,
        request: &SwapRequest,
        output_decimals: u8,
    ) -> Result<SwapQuote, Vec<ValidationError>> {
        let from = &request.from_asset;
        let to = &request.destination_asset;
        let network = self.ctx.network;

        let shape = request.shape_errors();
        if !shape.is_empty() {
            return Err(shape);
        }

        let mut errors = Vec::new();
        for asset in [from, to] {
            if network.support_override(asset) == Some(false) {
                errors.push(ValidationError::UnsupportedAsset {
                    asset: asset.to_string(),
                });
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let from_lookup = self.lookup(from);
        let to_lookup = self.lookup(to);
        for (asset, lookup) in [(from, &from_lookup), (to, &to_lookup)] {
            match lookup {
                PoolLookup::Missing => push_unique(
                    &mut errors,
                    ValidationError::PoolUnavailable {
                        asset: asset.to_l1().to_string(),
                        status: "missing".to_string(),
                    },
                ),
                PoolLookup::Found(pool) if !pool.is_available() => push_unique(
                    &mut errors,
                    ValidationError::PoolUnavailable {
                        asset: pool.asset.to_string(),
                        status: pool.status.as_str().to_string(),
                    },
                ),
                _ => {}
            }
        }
        self.check_halts(from, &mut errors);
        self.check_halts(to, &mut errors);

        let (Some(from_pool), Some(to_pool)) = (from_lookup.pool(), to_lookup.pool()) else {
            return Err(errors);
        };
        let Some(route) = Route::between(from_pool, to_pool) else {
            errors.push(rejected("No route between the assets"));
            return Err(errors);
        };

        let from_detail = if network.is_settlement_side(from) {
            None
        } else {
            match self.snapshot().inbound_for(from.chain()) {
                Some(detail) => Some(detail),
                None => {
                    errors.push(rejected(format!("No inbound address for {}", from.chain())));
                    return Err(errors);
                }
            }
        };
        let to_detail = self.snapshot().inbound_for(to.chain());

        // Input in pool units
        let input = request
            .amount
            .amount
            .rescale_floor(self.pool_decimals(from))
            .map_err(|e| vec![rejected(e.to_string())])?;
        if input.is_zero() {
            return Err(vec![ValidationError::ZeroAmount]);
        }

        let dust = if network.is_settlement_side(from) {
            BaseAmount::zero(input.decimals)
        } else {
            network.dust_threshold(from.chain(), from_detail)
        };
        if input.cmp_value(&dust) == Ordering::Less {
            errors.push(ValidationError::BelowDust {
                amount: input.to_string(),
                threshold: dust.to_string(),
            });
        }

        let swap = route.evaluate(input.amount, self.ctx.liquidity_fee_bps);
        if let Some(tolerance) = request.tolerance_bps {
            if swap.slip_bps > tolerance {
                errors.push(ValidationError::SlipLimitExceeded {
                    slip_bps: swap.slip_bps,
                    limit_bps: tolerance,
                });
            }
        }

        // Fees in destination pool units; affiliate comes off before outbound
        let liquidity_fee = swap.liquidity_fee();
        let affiliate_fee = bps_of(swap.output, request.affiliate_bps());
        let outbound_fee = match self.outbound_fee(to, to_detail) {
            Ok(fee) => fee,
            Err(e) => {
                errors.push(e);
                return Err(errors);
            }
        };
        let inbound_fee = self.inbound_fee(from, to, from_detail);

        let deductions = affiliate_fee.saturating_add(outbound_fee);
        let expected = swap.output.saturating_sub(deductions);
        if expected == 0 {
            errors.push(ValidationError::FeesExceedOutput);
        }

        let limit = request
            .tolerance_bps
            .map_or(0, |tolerance| apply_tolerance(expected, tolerance));

        let carrying_chain = if network.is_settlement_side(from) {
            network.settlement_chain()
        } else {
            from.chain().clone()
        };
        let memo = MemoBuilder::new(memo_limit(&carrying_chain), self.ctx.interface_tag)
            .with_aliases(network.memo_aliases())
            .build(&SwapMemo::Swap {
                asset: to.clone(),
                destination: request.destination_address.clone(),
                limit,
                streaming: request.streaming,
                affiliate: request.affiliate.clone(),
            })
            .unwrap_or_else(|e| {
                errors.push(e.into());
                String::new()
            });

        let to_decimals = self.pool_decimals(to);
        let report = |amount: u128| {
            self.scale(amount, to_decimals, output_decimals)
                .map_err(|e| vec![e])
        };
        let fees = FeeBreakdown {
            asset: to.clone(),
            inbound_fee: report(inbound_fee)?,
            outbound_fee: report(outbound_fee)?,
            affiliate_fee: report(affiliate_fee)?,
            liquidity_fee: report(liquidity_fee)?,
        };

        let inbound_confirmation_seconds = self.confirmation_seconds(from, input.amount);
        let outbound_delay_seconds = self.outbound_delay_seconds(to, expected);
        let streaming_seconds = request.streaming.map_or(0, |s| {
            u64::from(s.interval)
                .saturating_mul(u64::from(s.quantity))
                .saturating_mul(SETTLEMENT_BLOCK_SECS)
        });

        let to_address = match from_detail {
            Some(detail) => detail.address.clone(),
            None => String::new(),
        };

        let warning = self
            .snapshot()
            .stale
            .then(|| "Pool data could not be refreshed; the estimate uses the last known state".to_string());

        Ok(SwapQuote {
            protocol: self.protocol.clone(),
            to_address,
            memo,
            expected_amount: CryptoAmount::new(to.clone(), report(expected)?),
            dust_threshold: CryptoAmount::new(from.clone(), dust),
            fees,
            slip_bps: swap.slip_bps,
            inbound_confirmation_seconds,
            outbound_delay_seconds,
            total_swap_seconds: inbound_confirmation_seconds
                .saturating_add(outbound_delay_seconds)
                .saturating_add(streaming_seconds),
            streaming: request.streaming,
            expires_in_seconds: None,
            can_swap: false,
            errors,
            warning,
        }
        .finalize())
    }
}
