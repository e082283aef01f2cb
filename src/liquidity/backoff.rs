use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};

use super::Reason;
use crate::lightning::{NodeId, ShortChannelId};
use crate::swap::{LoopInSwap, LoopOutSwap, SwapEvent, SwapType};

/// Per-tick view of what existing swaps are doing to our rule targets:
/// which targets are occupied by an in-flight swap, and when each target
/// last failed. Rebuilt from the swap snapshots every tick.
#[derive(Debug, Default)]
pub struct SwapTraffic {
    pub ongoing_out: HashSet<ShortChannelId>,
    pub ongoing_in: HashSet<NodeId>,
    pub failed_out: HashMap<ShortChannelId, SystemTime>,
    pub failed_in: HashMap<NodeId, SystemTime>,
}

impl SwapTraffic {
    pub fn collect(loop_outs: &[LoopOutSwap], loop_ins: &[LoopInSwap]) -> Self {
        let mut traffic = SwapTraffic::default();

        for swap in loop_outs {
            if swap.state().is_terminal() {
                if let Some(failed_at) = last_failure(&swap.events) {
                    for channel in &swap.contract.outgoing_chan_set {
                        record_failure(&mut traffic.failed_out, *channel, failed_at);
                    }
                }
            } else {
                traffic.ongoing_out.extend(&swap.contract.outgoing_chan_set);
            }
        }

        for swap in loop_ins {
            // A loop in without a pinned last hop cannot be attributed to
            // a target and never suppresses one.
            let Some(peer) = swap.contract.last_hop else {
                continue;
            };
            if swap.state().is_terminal() {
                if let Some(failed_at) = last_failure(&swap.events) {
                    record_failure(&mut traffic.failed_in, peer, failed_at);
                }
            } else {
                traffic.ongoing_in.insert(peer);
            }
        }

        traffic
    }

    /// Whether a target may swap now, given the in-flight and failure
    /// history for swaps of the same type. Successes never back a target
    /// off; a failure holds it until `failure time + backoff`.
    pub fn may_swap(
        &self,
        swap_type: SwapType,
        channels: &[ShortChannelId],
        peer: NodeId,
        now: SystemTime,
        backoff: Duration,
    ) -> Result<(), Reason> {
        match swap_type {
            SwapType::Out => {
                for channel in channels {
                    if self.ongoing_out.contains(channel) {
                        return Err(Reason::InFlight);
                    }
                    if let Some(failed_at) = self.failed_out.get(channel)
                        && !backoff_elapsed(*failed_at, now, backoff)
                    {
                        return Err(Reason::FailureBackoff);
                    }
                }
            }
            SwapType::In => {
                if self.ongoing_in.contains(&peer) {
                    return Err(Reason::InFlight);
                }
                if let Some(failed_at) = self.failed_in.get(&peer)
                    && !backoff_elapsed(*failed_at, now, backoff)
                {
                    return Err(Reason::FailureBackoff);
                }
            }
        }

        Ok(())
    }
}

fn last_failure(events: &[SwapEvent]) -> Option<SystemTime> {
    events
        .iter()
        .filter(|e| e.state.is_failure())
        .map(|e| e.timestamp)
        .max()
}

fn record_failure<K: Eq + std::hash::Hash>(
    failures: &mut HashMap<K, SystemTime>,
    key: K,
    failed_at: SystemTime,
) {
    let entry = failures.entry(key).or_insert(failed_at);
    if *entry < failed_at {
        *entry = failed_at;
    }
}

fn backoff_elapsed(failed_at: SystemTime, now: SystemTime, backoff: Duration) -> bool {
    match now.duration_since(failed_at) {
        Ok(elapsed) => elapsed >= backoff,
        Err(_) => false,
    }
}
