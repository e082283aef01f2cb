use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::Reason;
use crate::swap::{LoopInQuote, LoopOutQuote, Restrictions};

const PPM_SCALE: u64 = 1_000_000;

pub fn ppm_to_sat(amount: u64, ppm: u64) -> u64 {
    (u128::from(amount) * u128::from(ppm) / u128::from(PPM_SCALE)) as u64
}

/// Amount gate applied before a candidate is quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    TooSmall,
    TooLarge,
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::TooSmall => write!(f, "swap amount too small"),
            AmountError::TooLarge => write!(f, "swap amount too large"),
        }
    }
}

impl From<AmountError> for Reason {
    fn from(value: AmountError) -> Self {
        match value {
            AmountError::TooSmall => Reason::AmountBelowMin,
            AmountError::TooLarge => Reason::AmountAboveMax,
        }
    }
}

/// Per-component routing and miner maxima derived for a loop out dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutFees {
    pub max_prepay_routing_fee: u64,
    pub max_swap_routing_fee: u64,
    pub max_miner_fee: u64,
}

/// Absolute and PPM caps applied per fee category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCategoryLimit {
    pub max_swap_fee_ppm: u64,
    pub max_routing_fee_ppm: u64,
    pub max_prepay_routing_fee_ppm: u64,
    pub max_miner_fee: u64,
    pub max_prepay: u64,
    pub max_total: u64,
}

/// A single spend cap as parts-per-million of the swap amount, allocated
/// across components by the quote's reported proportions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePortion {
    pub parts_per_million: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeLimit {
    Categories(FeeCategoryLimit),
    Portion(FeePortion),
}

impl FeeLimit {
    pub fn validate(&self) -> Result<()> {
        match self {
            FeeLimit::Categories(limit) => limit.validate(),
            FeeLimit::Portion(portion) => portion.validate(),
        }
    }

    /// Gate a candidate amount against the server restrictions before
    /// spending a quote on it. The caller clamps to the server maximum
    /// first, so `TooLarge` only fires when the server bounds are inverted.
    pub fn check_amount(
        &self,
        amount: u64,
        restrictions: &Restrictions,
    ) -> Result<(), AmountError> {
        if amount < restrictions.min_amount {
            return Err(AmountError::TooSmall);
        }
        if amount > restrictions.max_amount {
            return Err(AmountError::TooLarge);
        }

        if let FeeLimit::Portion(portion) = self
            && ppm_to_sat(amount, portion.parts_per_million) == 0
        {
            return Err(AmountError::TooSmall);
        }

        Ok(())
    }

    pub fn check_loop_out(&self, amount: u64, quote: &LoopOutQuote) -> Result<(), Reason> {
        match self {
            FeeLimit::Categories(limit) => limit.check_loop_out(amount, quote),
            FeeLimit::Portion(portion) => portion.check_loop_out(amount, quote),
        }
    }

    pub fn check_loop_in(&self, amount: u64, quote: &LoopInQuote) -> Result<(), Reason> {
        match self {
            FeeLimit::Categories(limit) => limit.check_loop_in(amount, quote),
            FeeLimit::Portion(portion) => portion.check_loop_in(amount, quote),
        }
    }

    /// Per-component maxima for a loop out that already passed
    /// [`check_loop_out`](Self::check_loop_out).
    pub fn loop_out_fees(&self, amount: u64, quote: &LoopOutQuote) -> LoopOutFees {
        match self {
            FeeLimit::Categories(limit) => limit.loop_out_fees(amount, quote),
            FeeLimit::Portion(portion) => portion.loop_out_fees(amount, quote),
        }
    }

    /// (max swap fee, max miner fee) for a loop in that already passed
    /// [`check_loop_in`](Self::check_loop_in).
    pub fn loop_in_fees(&self, quote: &LoopInQuote) -> (u64, u64) {
        match self {
            FeeLimit::Categories(limit) => (quote.swap_fee, limit.max_miner_fee),
            FeeLimit::Portion(_) => (quote.swap_fee, quote.miner_fee),
        }
    }
}

impl FeeCategoryLimit {
    pub fn new(
        max_swap_fee_ppm: u64,
        max_routing_fee_ppm: u64,
        max_prepay_routing_fee_ppm: u64,
        max_miner_fee: u64,
        max_prepay: u64,
        max_total: u64,
    ) -> Self {
        Self {
            max_swap_fee_ppm,
            max_routing_fee_ppm,
            max_prepay_routing_fee_ppm,
            max_miner_fee,
            max_prepay,
            max_total,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, ppm) in [
            ("swap fee", self.max_swap_fee_ppm),
            ("routing fee", self.max_routing_fee_ppm),
            ("prepay routing fee", self.max_prepay_routing_fee_ppm),
        ] {
            if ppm == 0 || ppm >= PPM_SCALE {
                anyhow::bail!("{name} ppm must be in (0, {PPM_SCALE})");
            }
        }
        if self.max_miner_fee == 0 {
            anyhow::bail!("miner fee cap must be non-zero");
        }
        if self.max_prepay == 0 {
            anyhow::bail!("prepay cap must be non-zero");
        }
        if self.max_total == 0 {
            anyhow::bail!("total cap must be non-zero");
        }
        Ok(())
    }

    fn check_loop_out(&self, amount: u64, quote: &LoopOutQuote) -> Result<(), Reason> {
        if quote.swap_fee > ppm_to_sat(amount, self.max_swap_fee_ppm) {
            return Err(Reason::SwapFeeTooHigh);
        }
        // The absolute prepay cap applies to the principal prepay amount;
        // its routing fee is capped separately by ppm below.
        if quote.prepay_amount > self.max_prepay {
            return Err(Reason::PrepayTooHigh);
        }
        if quote.miner_fee > self.max_miner_fee {
            return Err(Reason::MinerFeeTooHigh);
        }
        if quote.swap_fee + quote.prepay_amount + quote.miner_fee > self.max_total {
            return Err(Reason::SwapFeeTooHigh);
        }
        Ok(())
    }

    fn check_loop_in(&self, amount: u64, quote: &LoopInQuote) -> Result<(), Reason> {
        if quote.swap_fee > ppm_to_sat(amount, self.max_swap_fee_ppm) {
            return Err(Reason::SwapFeeTooHigh);
        }
        if quote.miner_fee > self.max_miner_fee {
            return Err(Reason::MinerFeeTooHigh);
        }
        if quote.swap_fee + quote.miner_fee > self.max_total {
            return Err(Reason::SwapFeeTooHigh);
        }
        Ok(())
    }

    fn loop_out_fees(&self, amount: u64, quote: &LoopOutQuote) -> LoopOutFees {
        LoopOutFees {
            max_prepay_routing_fee: ppm_to_sat(
                quote.prepay_amount,
                self.max_prepay_routing_fee_ppm,
            ),
            max_swap_routing_fee: ppm_to_sat(amount, self.max_routing_fee_ppm),
            // Dispatch with the configured cap rather than the quoted miner
            // fee, leaving slack for on-chain fee drift before broadcast.
            max_miner_fee: self.max_miner_fee,
        }
    }
}

impl FeePortion {
    pub fn new(parts_per_million: u64) -> Self {
        Self { parts_per_million }
    }

    fn validate(&self) -> Result<()> {
        if self.parts_per_million == 0 || self.parts_per_million >= PPM_SCALE {
            anyhow::bail!("fee portion ppm must be in (0, {PPM_SCALE})");
        }
        Ok(())
    }

    fn check_loop_out(&self, amount: u64, quote: &LoopOutQuote) -> Result<(), Reason> {
        let limit = ppm_to_sat(amount, self.parts_per_million);
        let quoted = quote.swap_fee + quote.prepay_amount + quote.miner_fee;
        // The quoted components must leave a non-zero routing allowance.
        if quoted >= limit {
            return Err(Reason::SwapFeeTooHigh);
        }
        Ok(())
    }

    fn check_loop_in(&self, amount: u64, quote: &LoopInQuote) -> Result<(), Reason> {
        let limit = ppm_to_sat(amount, self.parts_per_million);
        if quote.swap_fee + quote.miner_fee > limit {
            return Err(Reason::SwapFeeTooHigh);
        }
        Ok(())
    }

    /// Whatever the quote leaves of the total allowance becomes the routing
    /// budget, split between prepay and swap routing in proportion to their
    /// principals.
    fn loop_out_fees(&self, amount: u64, quote: &LoopOutQuote) -> LoopOutFees {
        let limit = ppm_to_sat(amount, self.parts_per_million);
        let available =
            limit.saturating_sub(quote.swap_fee + quote.prepay_amount + quote.miner_fee);

        let principal = amount + quote.prepay_amount;
        let max_prepay_routing_fee = if principal == 0 {
            0
        } else {
            (u128::from(available) * u128::from(quote.prepay_amount) / u128::from(principal)) as u64
        };

        LoopOutFees {
            max_prepay_routing_fee,
            max_swap_routing_fee: available - max_prepay_routing_fee,
            max_miner_fee: quote.miner_fee,
        }
    }
}
