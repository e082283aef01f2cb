use std::time::SystemTime;

use super::Parameters;
use crate::swap::{LoopInSwap, LoopOutSwap, SwapEvent};

/// Funds already consumed or still reserved inside the budget window.
///
/// A swap initiated on or after the window start contributes its realized
/// cost once terminal, and its declared worst-case maxima while in flight.
pub fn spent_and_reserved(
    start_date: SystemTime,
    loop_outs: &[LoopOutSwap],
    loop_ins: &[LoopInSwap],
) -> u64 {
    let mut total = 0u64;

    for swap in loop_outs {
        if swap.contract.initiation_time < start_date {
            continue;
        }
        total += swap_cost(&swap.events, swap.contract.worst_case_fees());
    }

    for swap in loop_ins {
        if swap.contract.initiation_time < start_date {
            continue;
        }
        total += swap_cost(&swap.events, swap.contract.worst_case_fees());
    }

    total
}

pub fn remaining(params: &Parameters, loop_outs: &[LoopOutSwap], loop_ins: &[LoopInSwap]) -> u64 {
    let used = spent_and_reserved(params.auto_fee_start_date, loop_outs, loop_ins);
    params.auto_fee_budget.saturating_sub(used)
}

fn swap_cost(events: &[SwapEvent], reserved: u64) -> u64 {
    match events.last() {
        Some(event) if event.state.is_terminal() => event.cost.total(),
        _ => reserved,
    }
}
