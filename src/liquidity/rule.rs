use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::swap::SwapType;

/// Liquidity thresholds for a target, expressed as minimum percentages of
/// capacity that must be available in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub min_incoming_pct: u8,
    pub min_outgoing_pct: u8,
}

impl ThresholdRule {
    pub fn new(min_incoming_pct: u8, min_outgoing_pct: u8) -> Self {
        Self {
            min_incoming_pct,
            min_outgoing_pct,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_incoming_pct == 0 && self.min_outgoing_pct == 0 {
            anyhow::bail!("at least one threshold must be non-zero");
        }
        if self.min_incoming_pct >= 100 || self.min_outgoing_pct >= 100 {
            anyhow::bail!("thresholds must be below 100%");
        }
        if self.min_incoming_pct + self.min_outgoing_pct > 100 {
            anyhow::bail!("thresholds may not sum to more than 100%");
        }
        Ok(())
    }

    /// Recommend a swap for the aggregated balances of a target, or none if
    /// both thresholds are met. The amount restores the deficient side to
    /// the midpoint of its allowed band.
    pub fn suggest_amount(&self, local: u64, remote: u64) -> Option<(SwapType, u64)> {
        let capacity = local + remote;
        if capacity == 0 {
            return None;
        }

        let incoming_pct = remote * 100 / capacity;
        let outgoing_pct = local * 100 / capacity;

        let min_incoming = u64::from(self.min_incoming_pct);
        let min_outgoing = u64::from(self.min_outgoing_pct);

        if incoming_pct < min_incoming {
            let midpoint = (min_incoming + (100 - min_outgoing)) / 2;
            let target = capacity * midpoint / 100;
            let amount = target.saturating_sub(remote);
            if amount > 0 {
                return Some((SwapType::Out, amount));
            }
        } else if outgoing_pct < min_outgoing {
            let midpoint = (min_outgoing + (100 - min_incoming)) / 2;
            let target = capacity * midpoint / 100;
            let amount = target.saturating_sub(local);
            if amount > 0 {
                return Some((SwapType::In, amount));
            }
        }

        None
    }
}

/// A threshold rule bound to the swap type it is allowed to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRule {
    pub threshold: ThresholdRule,
    pub swap_type: SwapType,
}

impl SwapRule {
    pub fn new(threshold: ThresholdRule, swap_type: SwapType) -> Self {
        Self {
            threshold,
            swap_type,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.threshold.validate()
    }

    /// A recommendation in the other direction is discarded: an out rule
    /// never triggers a loop in, and vice versa.
    pub fn suggest(&self, local: u64, remote: u64) -> Option<(SwapType, u64)> {
        let (swap_type, amount) = self.threshold.suggest_amount(local, remote)?;
        if swap_type != self.swap_type {
            return None;
        }
        Some((swap_type, amount))
    }
}
