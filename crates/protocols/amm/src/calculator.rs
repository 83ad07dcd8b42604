//! CLP Calculator
//!
//! Swap math for continuous-liquidity pools. Every function works on
//! integer base units and floors its result; intermediate products go
//! through `BigInt` so deep pools never overflow.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::constants::BPS_DENOM;

fn to_u128(value: BigInt) -> u128 {
    value.to_u128().unwrap_or(0)
}

fn to_bps(value: BigInt) -> u32 {
    value.to_u32().unwrap_or(BPS_DENOM).min(BPS_DENOM)
}

/// Output of a single swap before fees
///
/// Formula: output = (Y * x) / (X + x)
pub fn swap_output(input_depth: u128, output_depth: u128, input: u128) -> u128 {
    if input_depth == 0 || output_depth == 0 || input == 0 {
        return 0;
    }
    let numerator = BigInt::from(output_depth) * BigInt::from(input);
    let denominator = BigInt::from(input_depth) + BigInt::from(input);
    to_u128(numerator / denominator)
}

/// Reduce an output by a liquidity fee in basis points
pub fn apply_fee(output: u128, fee_bps: u32) -> u128 {
    let keep = BPS_DENOM.saturating_sub(fee_bps);
    to_u128(BigInt::from(output) * BigInt::from(keep) / BigInt::from(BPS_DENOM))
}

/// Slip of a single swap in basis points
///
/// Formula: slip = x / (X + x)
pub fn swap_slip_bps(input_depth: u128, input: u128) -> u32 {
    if input == 0 {
        return 0;
    }
    let numerator = BigInt::from(input) * BigInt::from(BPS_DENOM);
    let denominator = BigInt::from(input_depth) + BigInt::from(input);
    to_bps(numerator / denominator)
}

/// Combined slip of a double swap in basis points
///
/// Hop one trades `input` through (X1, Y1) into the settlement asset, hop two
/// trades that through a pool whose settlement depth is X2. With the hop-one
/// output left unrounded, `1 - (1 - s1)(1 - s2)` reduces to
/// `x (X2 + Y1) / (X2 (X1 + x) + Y1 x)`.
pub fn double_swap_slip_bps(x1: u128, y1: u128, x2: u128, input: u128) -> u32 {
    if input == 0 {
        return 0;
    }
    let x = BigInt::from(input);
    let numerator = &x * (BigInt::from(x2) + BigInt::from(y1)) * BigInt::from(BPS_DENOM);
    let denominator = BigInt::from(x2) * (BigInt::from(x1) + &x) + BigInt::from(y1) * &x;
    if denominator.is_zero() {
        return BPS_DENOM;
    }
    to_bps(numerator / denominator)
}

/// Value `amount` at the pool's spot price (`amount * to_depth / from_depth`)
pub fn spot_value(amount: u128, from_depth: u128, to_depth: u128) -> u128 {
    if from_depth == 0 {
        return 0;
    }
    to_u128(BigInt::from(amount) * BigInt::from(to_depth) / BigInt::from(from_depth))
}

/// `amount * bps / 10000`, floored
pub fn bps_of(amount: u128, bps: u32) -> u128 {
    to_u128(BigInt::from(amount) * BigInt::from(bps.min(BPS_DENOM)) / BigInt::from(BPS_DENOM))
}

/// Minimum accepted output for a slip tolerance
pub fn apply_tolerance(amount: u128, tolerance_bps: u32) -> u128 {
    apply_fee(amount, tolerance_bps)
}

/// `ceil(amount / unit)`
pub fn div_ceil(amount: u128, unit: u128) -> u128 {
    if unit == 0 {
        return 0;
    }
    amount / unit + u128::from(amount % unit != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = 100_000_000;

    #[test]
    fn test_swap_output_reference_scenario() {
        // X = 110, Y = 100, x = 1.0, all at 8 decimals
        let output = swap_output(110 * ONE, 100 * ONE, ONE);
        assert_eq!(output, 90_090_090);
    }

    #[test]
    fn test_swap_output_zero_inputs() {
        assert_eq!(swap_output(0, 100, 10), 0);
        assert_eq!(swap_output(100, 0, 10), 0);
        assert_eq!(swap_output(100, 100, 0), 0);
    }

    #[test]
    fn test_swap_output_is_monotonic_and_bounded() {
        let (x, y) = (1_000 * ONE, 5_000 * ONE);
        let mut previous = 0;
        for input in [1, ONE, 10 * ONE, 500 * ONE, 10_000 * ONE, 1_000_000 * ONE] {
            let output = swap_output(x, y, input);
            assert!(output >= previous);
            assert!(output < y);
            previous = output;
        }
    }

    #[test]
    fn test_swap_output_deep_pool_no_overflow() {
        let depth = u128::MAX / 4;
        let output = swap_output(depth, depth, depth);
        assert_eq!(output, depth / 2);
    }

    #[test]
    fn test_apply_fee() {
        assert_eq!(apply_fee(1_000_000, 0), 1_000_000);
        assert_eq!(apply_fee(1_000_000, 30), 997_000);
        assert_eq!(apply_fee(1_000_000, 10_000), 0);
    }

    #[test]
    fn test_swap_slip() {
        // 1 / 111 = 0.9009% -> 90 bps
        assert_eq!(swap_slip_bps(110 * ONE, ONE), 90);
        assert_eq!(swap_slip_bps(110 * ONE, 0), 0);
        assert_eq!(swap_slip_bps(0, ONE), 10_000);
    }

    #[test]
    fn test_double_slip_at_least_each_hop() {
        let (x1, y1) = (110 * ONE, 100 * ONE);
        let (x2, y2) = (2_000 * ONE, 50 * ONE);
        for input in [ONE / 100, ONE, 25 * ONE, 400 * ONE] {
            let hop1_out = swap_output(x1, y1, input);
            let s1 = swap_slip_bps(x1, input);
            let s2 = swap_slip_bps(x2, hop1_out);
            let total = double_swap_slip_bps(x1, y1, x2, input);
            assert!(total >= s1, "total {} < hop1 {}", total, s1);
            assert!(total >= s2, "total {} < hop2 {}", total, s2);
            assert!(swap_output(x2, y2, hop1_out) < y2);
        }
    }

    #[test]
    fn test_double_slip_matches_closed_form() {
        // s1 = 1/111, out1 = 100/111; s2 = out1 / (X2 + out1) with X2 = 100
        // 1 - (110/111) * (100 / (100 + 100/111)) = 1 - 11000/11200 = 178 bps
        let slip = double_swap_slip_bps(110 * ONE, 100 * ONE, 100 * ONE, ONE);
        assert_eq!(slip, 178);
    }

    #[test]
    fn test_spot_value_and_bps() {
        assert_eq!(spot_value(ONE, 110 * ONE, 100 * ONE), 90_909_090);
        assert_eq!(spot_value(ONE, 0, 100), 0);
        assert_eq!(bps_of(1_000_000, 300), 30_000);
        assert_eq!(apply_tolerance(1_000_000, 300), 970_000);
    }

    #[test]
    fn test_div_ceil() {
        assert_eq!(div_ceil(10, 5), 2);
        assert_eq!(div_ceil(11, 5), 3);
        assert_eq!(div_ceil(1, 625_000_000), 1);
        assert_eq!(div_ceil(0, 5), 0);
        assert_eq!(div_ceil(5, 0), 0);
    }
}
