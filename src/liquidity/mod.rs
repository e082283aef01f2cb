pub mod autoloop;
pub mod backoff;
pub mod budget;
pub mod fees;
pub mod rule;
pub mod suggest;

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::lightning::{NodeId, ShortChannelId};
use crate::swap::{LoopInRequest, LoopOutRequest};

pub use autoloop::{Manager, ManagerConfig, interval_ticker};
pub use fees::{AmountError, FeeCategoryLimit, FeeLimit, FeePortion, LoopOutFees, ppm_to_sat};
pub use rule::{SwapRule, ThresholdRule};

const DEFAULT_FEE_PPM: u64 = 20_000;
const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_SWEEP_CONF_TARGET: u32 = 100;
const DEFAULT_HTLC_CONF_TARGET: u32 = 10;
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a target considered during a tick was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    BudgetInsufficient,
    InFlight,
    SwapFeeTooHigh,
    MinerFeeTooHigh,
    PrepayTooHigh,
    AmountBelowMin,
    AmountAboveMax,
    FailureBackoff,
    RuleSatisfied,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::BudgetInsufficient => "budget insufficient",
            Reason::InFlight => "swap in flight",
            Reason::SwapFeeTooHigh => "swap fee too high",
            Reason::MinerFeeTooHigh => "miner fee too high",
            Reason::PrepayTooHigh => "prepay too high",
            Reason::AmountBelowMin => "amount below server minimum",
            Reason::AmountAboveMax => "amount above server maximum",
            Reason::FailureBackoff => "failure backoff",
            Reason::RuleSatisfied => "rule satisfied",
        };
        write!(f, "{s}")
    }
}

/// A rule target: a single channel, or a peer aggregated over its channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwapTarget {
    Channel(ShortChannelId),
    Peer(NodeId),
}

impl fmt::Display for SwapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapTarget::Channel(id) => write!(f, "channel {id}"),
            SwapTarget::Peer(peer) => write!(f, "peer {peer}"),
        }
    }
}

/// The outcome of one suggestion pass: dispatchable requests in dispatch
/// order, plus a per-target explanation for everything that was held back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub out_swaps: Vec<LoopOutRequest>,
    pub in_swaps: Vec<LoopInRequest>,
    pub disqualified_chans: BTreeMap<ShortChannelId, Reason>,
    pub disqualified_peers: BTreeMap<NodeId, Reason>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.out_swaps.is_empty() && self.in_swaps.is_empty()
    }

    pub(crate) fn disqualify(&mut self, target: SwapTarget, reason: Reason) {
        match target {
            SwapTarget::Channel(id) => {
                self.disqualified_chans.insert(id, reason);
            }
            SwapTarget::Peer(peer) => {
                self.disqualified_peers.insert(peer, reason);
            }
        }
    }
}

/// Rejection returned when a parameter update fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Operator-facing configuration of the autolooper. Created once, replaced
/// atomically through the validated set operation, snapshotted per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub autoloop: bool,
    pub auto_fee_budget: u64,
    pub auto_fee_start_date: SystemTime,
    pub max_auto_in_flight: usize,
    pub failure_backoff: Duration,
    pub fee_limit: FeeLimit,
    pub channel_rules: BTreeMap<ShortChannelId, SwapRule>,
    pub peer_rules: BTreeMap<NodeId, SwapRule>,
    pub sweep_conf_target: u32,
    pub htlc_conf_target: u32,
    pub client_timeout: Duration,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            autoloop: false,
            auto_fee_budget: 0,
            auto_fee_start_date: UNIX_EPOCH,
            max_auto_in_flight: 1,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
            fee_limit: FeeLimit::Portion(FeePortion {
                parts_per_million: DEFAULT_FEE_PPM,
            }),
            channel_rules: BTreeMap::new(),
            peer_rules: BTreeMap::new(),
            sweep_conf_target: DEFAULT_SWEEP_CONF_TARGET,
            htlc_conf_target: DEFAULT_HTLC_CONF_TARGET,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

impl Parameters {
    pub fn validate(&self, now: SystemTime) -> Result<(), ValidationError> {
        if self.autoloop && self.max_auto_in_flight == 0 {
            return Err(ValidationError::new(
                "max_auto_in_flight",
                "must be at least 1 while autoloop is enabled",
            ));
        }

        if self.auto_fee_start_date > now {
            return Err(ValidationError::new(
                "auto_fee_start_date",
                "budget window may not start in the future",
            ));
        }

        for (channel, rule) in &self.channel_rules {
            if channel.0 == 0 {
                return Err(ValidationError::new(
                    "channel_rules",
                    "zero channel id cannot have a rule",
                ));
            }
            rule.validate().map_err(|e| {
                ValidationError::new("channel_rules", format!("channel {channel}: {e}"))
            })?;
        }

        for (peer, rule) in &self.peer_rules {
            rule.validate()
                .map_err(|e| ValidationError::new("peer_rules", format!("peer {peer}: {e}")))?;
        }

        self.fee_limit
            .validate()
            .map_err(|e| ValidationError::new("fee_limit", e.to_string()))?;

        if self.sweep_conf_target == 0 {
            return Err(ValidationError::new(
                "sweep_conf_target",
                "must be at least 1 block",
            ));
        }
        if self.htlc_conf_target == 0 {
            return Err(ValidationError::new(
                "htlc_conf_target",
                "must be at least 1 block",
            ));
        }
        if self.client_timeout.is_zero() {
            return Err(ValidationError::new(
                "client_timeout",
                "remote calls need a non-zero deadline",
            ));
        }

        Ok(())
    }
}
