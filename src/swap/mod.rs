pub mod client;

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::lightning::{NodeId, ShortChannelId};

/// Initiator string attached to every swap the autolooper dispatches.
pub const AUTOLOOP_INITIATOR: &str = "autoloop";

const LABEL_AUTOLOOP_OUT: &str = "autoloop-out";
const LABEL_AUTOLOOP_IN: &str = "autoloop-in";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapType {
    Out,
    In,
}

impl fmt::Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapType::Out => write!(f, "out"),
            SwapType::In => write!(f, "in"),
        }
    }
}

pub fn autoloop_label(swap_type: SwapType) -> &'static str {
    match swap_type {
        SwapType::Out => LABEL_AUTOLOOP_OUT,
        SwapType::In => LABEL_AUTOLOOP_IN,
    }
}

pub fn is_autoloop_label(label: &str) -> bool {
    label == LABEL_AUTOLOOP_OUT || label == LABEL_AUTOLOOP_IN
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    InFlight,
    Success,
    FailOffchain,
    FailOnchain,
    FailTimeout,
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SwapState::InFlight)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SwapState::FailOffchain | SwapState::FailOnchain | SwapState::FailTimeout
        )
    }
}

/// Realized cost of a finished swap, decomposed the way the swap store
/// records it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapCost {
    pub server: u64,
    pub onchain: u64,
    pub offchain: u64,
}

impl SwapCost {
    pub fn total(&self) -> u64 {
        self.server + self.onchain + self.offchain
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    pub timestamp: SystemTime,
    pub state: SwapState,
    pub cost: SwapCost,
}

/// The immutable terms a loop out swap was dispatched under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopOutContract {
    pub amount: u64,
    pub max_swap_fee: u64,
    pub max_prepay_amount: u64,
    pub max_miner_fee: u64,
    pub max_swap_routing_fee: u64,
    pub max_prepay_routing_fee: u64,
    pub sweep_conf_target: u32,
    pub outgoing_chan_set: Vec<ShortChannelId>,
    pub initiation_time: SystemTime,
    pub label: String,
    pub initiator: String,
}

impl LoopOutContract {
    /// Funds this swap can consume if every component hits its cap. The
    /// prepay principal is returned on completion and is not counted.
    pub fn worst_case_fees(&self) -> u64 {
        self.max_swap_fee + self.max_miner_fee + self.max_swap_routing_fee
            + self.max_prepay_routing_fee
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopInContract {
    pub amount: u64,
    pub max_swap_fee: u64,
    pub max_miner_fee: u64,
    pub htlc_conf_target: u32,
    pub last_hop: Option<NodeId>,
    pub initiation_time: SystemTime,
    pub label: String,
    pub initiator: String,
}

impl LoopInContract {
    pub fn worst_case_fees(&self) -> u64 {
        self.max_swap_fee + self.max_miner_fee
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopOutSwap {
    pub contract: LoopOutContract,
    pub events: Vec<SwapEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopInSwap {
    pub contract: LoopInContract,
    pub events: Vec<SwapEvent>,
}

impl LoopOutSwap {
    pub fn state(&self) -> SwapState {
        latest_state(&self.events)
    }
}

impl LoopInSwap {
    pub fn state(&self) -> SwapState {
        latest_state(&self.events)
    }
}

// A swap with no recorded events has been initiated and nothing more.
fn latest_state(events: &[SwapEvent]) -> SwapState {
    events.last().map_or(SwapState::InFlight, |e| e.state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutQuote {
    pub swap_fee: u64,
    pub prepay_amount: u64,
    pub miner_fee: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopInQuote {
    pub swap_fee: u64,
    pub miner_fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutQuoteRequest {
    pub amount: u64,
    pub sweep_conf_target: u32,
    pub swap_publication_deadline: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInQuoteRequest {
    pub amount: u64,
    pub htlc_conf_target: u32,
    pub last_hop: Option<NodeId>,
}

/// A fully priced loop out dispatch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutRequest {
    pub amount: u64,
    pub max_swap_fee: u64,
    pub max_prepay_amount: u64,
    pub max_miner_fee: u64,
    pub max_swap_routing_fee: u64,
    pub max_prepay_routing_fee: u64,
    pub sweep_conf_target: u32,
    pub outgoing_chan_set: Vec<ShortChannelId>,
    pub label: String,
    pub initiator: String,
}

impl LoopOutRequest {
    pub fn worst_case_fees(&self) -> u64 {
        self.max_swap_fee + self.max_miner_fee + self.max_swap_routing_fee
            + self.max_prepay_routing_fee
    }

    pub fn into_contract(self, initiation_time: SystemTime) -> LoopOutContract {
        LoopOutContract {
            amount: self.amount,
            max_swap_fee: self.max_swap_fee,
            max_prepay_amount: self.max_prepay_amount,
            max_miner_fee: self.max_miner_fee,
            max_swap_routing_fee: self.max_swap_routing_fee,
            max_prepay_routing_fee: self.max_prepay_routing_fee,
            sweep_conf_target: self.sweep_conf_target,
            outgoing_chan_set: self.outgoing_chan_set,
            initiation_time,
            label: self.label,
            initiator: self.initiator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopInRequest {
    pub amount: u64,
    pub max_swap_fee: u64,
    pub max_miner_fee: u64,
    pub htlc_conf_target: u32,
    pub last_hop: Option<NodeId>,
    pub label: String,
    pub initiator: String,
}

impl LoopInRequest {
    pub fn worst_case_fees(&self) -> u64 {
        self.max_swap_fee + self.max_miner_fee
    }

    pub fn into_contract(self, initiation_time: SystemTime) -> LoopInContract {
        LoopInContract {
            amount: self.amount,
            max_swap_fee: self.max_swap_fee,
            max_miner_fee: self.max_miner_fee,
            htlc_conf_target: self.htlc_conf_target,
            last_hop: self.last_hop,
            initiation_time,
            label: self.label,
            initiator: self.initiator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutSwapInfo {
    pub swap_hash: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopInSwapInfo {
    pub swap_hash: [u8; 32],
}

/// Server-side bounds on acceptable swap amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restrictions {
    pub min_amount: u64,
    pub max_amount: u64,
}
