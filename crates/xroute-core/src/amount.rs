//! Amount types
//!
//! Two layers: [`BaseAmount`] is the chain-precision integer a transaction
//! carries, and the human-decimal value is a [`rust_decimal::Decimal`].
//! Every conversion between them is exact or returns an [`AmountError`];
//! the only lossy operation is the explicitly named [`BaseAmount::rescale_floor`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::errors::AmountError;
use crate::types::Asset;

/// Largest precision a `Decimal` can carry
const MAX_DECIMAL_SCALE: u8 = 28;

fn pow10(exp: u8) -> Result<u128, AmountError> {
    10u128.checked_pow(exp as u32).ok_or(AmountError::Overflow)
}

/// Integer amount in the smallest unit of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseAmount {
    pub amount: u128,
    pub decimals: u8,
}

impl BaseAmount {
    pub fn new(amount: u128, decimals: u8) -> Self {
        Self { amount, decimals }
    }

    pub fn zero(decimals: u8) -> Self {
        Self::new(0, decimals)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Exact conversion from a human-decimal value
    pub fn from_decimal(value: Decimal, decimals: u8) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative {
                value: value.to_string(),
            });
        }
        let normalized = value.normalize();
        let scale = normalized.scale();
        if scale > decimals as u32 {
            return Err(AmountError::Inexact {
                value: value.to_string(),
                decimals,
            });
        }
        let mantissa = u128::try_from(normalized.mantissa()).map_err(|_| AmountError::Negative {
            value: value.to_string(),
        })?;
        let factor = pow10(decimals - scale as u8)?;
        let amount = mantissa.checked_mul(factor).ok_or(AmountError::Overflow)?;
        Ok(Self::new(amount, decimals))
    }

    /// Exact conversion to a human-decimal value
    pub fn to_decimal(&self) -> Result<Decimal, AmountError> {
        if self.decimals > MAX_DECIMAL_SCALE {
            return Err(AmountError::ScaleTooLarge {
                decimals: self.decimals as u32,
            });
        }
        let mantissa = i128::try_from(self.amount).map_err(|_| AmountError::Overflow)?;
        Decimal::try_from_i128_with_scale(mantissa, self.decimals as u32)
            .map_err(|_| AmountError::Overflow)
    }

    /// Change precision without losing information
    pub fn rescale(&self, decimals: u8) -> Result<Self, AmountError> {
        match decimals.cmp(&self.decimals) {
            Ordering::Equal => Ok(*self),
            Ordering::Greater => {
                let factor = pow10(decimals - self.decimals)?;
                let amount = self.amount.checked_mul(factor).ok_or(AmountError::Overflow)?;
                Ok(Self::new(amount, decimals))
            }
            Ordering::Less => {
                let factor = pow10(self.decimals - decimals)?;
                if self.amount % factor != 0 {
                    return Err(AmountError::Inexact {
                        value: self.to_string(),
                        decimals,
                    });
                }
                Ok(Self::new(self.amount / factor, decimals))
            }
        }
    }

    /// Change precision, truncating any digits that do not fit
    pub fn rescale_floor(&self, decimals: u8) -> Result<Self, AmountError> {
        if decimals >= self.decimals {
            return self.rescale(decimals);
        }
        let factor = pow10(self.decimals - decimals)?;
        Ok(Self::new(self.amount / factor, decimals))
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, AmountError> {
        self.ensure_same_decimals(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(AmountError::Overflow)?;
        Ok(Self::new(amount, self.decimals))
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, AmountError> {
        self.ensure_same_decimals(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(AmountError::Underflow {
                left: self.amount,
                right: other.amount,
            })?;
        Ok(Self::new(amount, self.decimals))
    }

    /// Subtract, clamping at zero
    pub fn saturating_sub(&self, other: &Self) -> Result<Self, AmountError> {
        self.ensure_same_decimals(other)?;
        Ok(Self::new(
            self.amount.saturating_sub(other.amount),
            self.decimals,
        ))
    }

    /// Compare two amounts that may use different precisions
    pub fn cmp_value(&self, other: &Self) -> Ordering {
        let decimals = self.decimals.max(other.decimals);
        match (self.rescale(decimals), other.rescale(decimals)) {
            (Ok(a), Ok(b)) => a.amount.cmp(&b.amount),
            // Only reachable when upscaling overflows u128; the overflowing side is larger
            (Err(_), Ok(_)) => Ordering::Greater,
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Err(_)) => Ordering::Equal,
        }
    }

    fn ensure_same_decimals(&self, other: &Self) -> Result<(), AmountError> {
        if self.decimals != other.decimals {
            return Err(AmountError::DecimalMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        Ok(())
    }
}

impl fmt::Display for BaseAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Ok(value) => write!(f, "{}", value),
            Err(_) => write!(f, "{}e-{}", self.amount, self.decimals),
        }
    }
}

/// An amount of a specific asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoAmount {
    pub asset: Asset,
    pub amount: BaseAmount,
}

impl CryptoAmount {
    pub fn new(asset: Asset, amount: BaseAmount) -> Self {
        Self { asset, amount }
    }

    pub fn zero(asset: Asset, decimals: u8) -> Self {
        Self::new(asset, BaseAmount::zero(decimals))
    }

    /// Build from a human-decimal value such as `1.5`
    pub fn from_decimal(asset: Asset, value: Decimal, decimals: u8) -> Result<Self, AmountError> {
        Ok(Self::new(asset, BaseAmount::from_decimal(value, decimals)?))
    }

    pub fn base(&self) -> u128 {
        self.amount.amount
    }

    pub fn decimals(&self) -> u8 {
        self.amount.decimals
    }

    pub fn to_decimal(&self) -> Result<Decimal, AmountError> {
        self.amount.to_decimal()
    }
}

impl fmt::Display for CryptoAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}
