//! Swap request and quote types shared by every protocol

use serde::{Deserialize, Serialize};

use crate::amount::{BaseAmount, CryptoAmount};
use crate::errors::{AmountError, ValidationError};
use crate::types::{Asset, ProtocolId};

/// Affiliate terms attached to a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateParams {
    pub address: String,
    /// Fee in basis points of the destination output
    pub bps: u32,
}

/// Streaming swap parameters (sub-swap interval in blocks, sub-swap count)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingParams {
    pub interval: u32,
    pub quantity: u32,
}

/// A request to quote or execute a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub from_asset: Asset,
    pub destination_asset: Asset,
    pub amount: CryptoAmount,
    pub destination_address: String,
    /// Sender / refund address, needed by protocols that open deposit channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate: Option<AffiliateParams>,
    /// Maximum accepted slip in basis points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_bps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamingParams>,
}

impl SwapRequest {
    pub fn new(
        from_asset: Asset,
        destination_asset: Asset,
        amount: CryptoAmount,
        destination_address: impl Into<String>,
    ) -> Self {
        Self {
            from_asset,
            destination_asset,
            amount,
            destination_address: destination_address.into(),
            from_address: None,
            affiliate: None,
            tolerance_bps: None,
            streaming: None,
        }
    }

    pub fn with_affiliate(mut self, address: impl Into<String>, bps: u32) -> Self {
        self.affiliate = Some(AffiliateParams {
            address: address.into(),
            bps,
        });
        self
    }

    pub fn with_tolerance_bps(mut self, bps: u32) -> Self {
        self.tolerance_bps = Some(bps);
        self
    }

    pub fn with_streaming(mut self, interval: u32, quantity: u32) -> Self {
        self.streaming = Some(StreamingParams { interval, quantity });
        self
    }

    pub fn with_from_address(mut self, address: impl Into<String>) -> Self {
        self.from_address = Some(address.into());
        self
    }

    pub fn affiliate_bps(&self) -> u32 {
        self.affiliate.as_ref().map(|a| a.bps).unwrap_or(0)
    }

    /// Protocol-independent shape checks
    pub fn shape_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.from_asset == self.destination_asset {
            errors.push(ValidationError::IdenticalAssets);
        }
        if self.amount.amount.is_zero() {
            errors.push(ValidationError::ZeroAmount);
        }
        if let Some(affiliate) = &self.affiliate {
            if affiliate.bps > 10_000 {
                errors.push(ValidationError::AffiliateBpsOutOfRange { bps: affiliate.bps });
            }
        }
        if let Some(bps) = self.tolerance_bps {
            if bps > 10_000 {
                errors.push(ValidationError::ToleranceOutOfRange { bps });
            }
        }
        errors
    }
}

/// Fees of a quote, all denominated in `asset` (the destination asset)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub asset: Asset,
    pub inbound_fee: BaseAmount,
    pub outbound_fee: BaseAmount,
    pub affiliate_fee: BaseAmount,
    pub liquidity_fee: BaseAmount,
}

impl FeeBreakdown {
    pub fn zero(asset: Asset, decimals: u8) -> Self {
        Self {
            asset,
            inbound_fee: BaseAmount::zero(decimals),
            outbound_fee: BaseAmount::zero(decimals),
            affiliate_fee: BaseAmount::zero(decimals),
            liquidity_fee: BaseAmount::zero(decimals),
        }
    }

    pub fn total(&self) -> Result<BaseAmount, AmountError> {
        self.inbound_fee
            .checked_add(&self.outbound_fee)?
            .checked_add(&self.affiliate_fee)?
            .checked_add(&self.liquidity_fee)
    }

    pub fn is_zero(&self) -> bool {
        self.inbound_fee.is_zero()
            && self.outbound_fee.is_zero()
            && self.affiliate_fee.is_zero()
            && self.liquidity_fee.is_zero()
    }
}

/// Result of one estimation against one protocol. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub protocol: ProtocolId,
    /// Where the funds must be sent (inbound vault or deposit channel)
    pub to_address: String,
    pub memo: String,
    pub expected_amount: CryptoAmount,
    pub dust_threshold: CryptoAmount,
    pub fees: FeeBreakdown,
    pub slip_bps: u32,
    pub inbound_confirmation_seconds: u64,
    pub outbound_delay_seconds: u64,
    pub total_swap_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamingParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
    pub can_swap: bool,
    pub errors: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SwapQuote {
    /// A quote that explains why the swap cannot happen, with zero output and fees
    pub fn rejected(
        protocol: ProtocolId,
        request: &SwapRequest,
        output_decimals: u8,
        errors: Vec<ValidationError>,
    ) -> Self {
        let dust_decimals = request.amount.decimals();
        Self {
            protocol,
            to_address: String::new(),
            memo: String::new(),
            expected_amount: CryptoAmount::zero(request.destination_asset.clone(), output_decimals),
            dust_threshold: CryptoAmount::zero(request.from_asset.clone(), dust_decimals),
            fees: FeeBreakdown::zero(request.destination_asset.clone(), output_decimals),
            slip_bps: 0,
            inbound_confirmation_seconds: 0,
            outbound_delay_seconds: 0,
            total_swap_seconds: 0,
            streaming: request.streaming,
            expires_in_seconds: None,
            can_swap: false,
            errors,
            warning: None,
        }
    }

    /// Re-derive `can_swap` from the error list
    pub fn finalize(mut self) -> Self {
        self.can_swap = self.errors.is_empty();
        self
    }
}

/// A broadcast swap transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSubmitted {
    pub hash: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(from: &str, to: &str, amount: u128) -> SwapRequest {
        let from: Asset = from.parse().unwrap();
        SwapRequest::new(
            from.clone(),
            to.parse().unwrap(),
            CryptoAmount::new(from, BaseAmount::new(amount, 8)),
            "bc1qdest",
        )
    }

    #[test]
    fn test_shape_errors() {
        assert!(request("BTC.BTC", "ETH.ETH", 1).shape_errors().is_empty());

        let same = request("BTC.BTC", "btc.btc", 1);
        assert_eq!(same.shape_errors(), vec![ValidationError::IdenticalAssets]);

        let bad = request("BTC.BTC", "ETH.ETH", 0)
            .with_affiliate("thor1aff", 10_001)
            .with_tolerance_bps(20_000);
        assert_eq!(
            bad.shape_errors(),
            vec![
                ValidationError::ZeroAmount,
                ValidationError::AffiliateBpsOutOfRange { bps: 10_001 },
                ValidationError::ToleranceOutOfRange { bps: 20_000 },
            ]
        );
    }

    #[test]
    fn test_rejected_quote_has_zero_fees() {
        let req = request("BTC.BTC", "BTC.BTC", 100);
        let quote = SwapQuote::rejected(
            ProtocolId::new("thorchain"),
            &req,
            8,
            vec![ValidationError::IdenticalAssets],
        );
        assert!(!quote.can_swap);
        assert!(quote.fees.is_zero());
        assert_eq!(quote.fees.total().unwrap(), BaseAmount::zero(8));
        assert!(quote.expected_amount.amount.is_zero());
    }

    #[test]
    fn test_finalize_sets_can_swap_from_errors() {
        let req = request("BTC.BTC", "ETH.ETH", 100);
        let quote = SwapQuote::rejected(ProtocolId::new("p"), &req, 8, Vec::new()).finalize();
        assert!(quote.can_swap);
    }
}
