use std::collections::BTreeMap;
use std::time::SystemTime;

use anyhow::{Context as _, Result};

use super::autoloop::Manager;
use super::backoff::SwapTraffic;
use super::{Parameters, Reason, Suggestions, SwapTarget, budget};
use crate::lightning::{ChannelInfo, NodeId, ShortChannelId};
use crate::swap::{
    AUTOLOOP_INITIATOR, LoopInQuoteRequest, LoopInRequest, LoopInSwap, LoopOutQuoteRequest,
    LoopOutRequest, LoopOutSwap, SwapType, autoloop_label, is_autoloop_label,
};

/// A target whose rule produced a recommendation, before quoting.
#[derive(Debug, Clone)]
struct Candidate {
    target: SwapTarget,
    peer: NodeId,
    channels: Vec<ShortChannelId>,
    swap_type: SwapType,
    amount: u64,
}

/// A candidate that survived quoting and fee checks, ready for budget
/// admission.
#[derive(Debug, Clone)]
enum Priced {
    Out(SwapTarget, LoopOutRequest),
    In(SwapTarget, LoopInRequest),
}

impl Priced {
    fn worst_case_fees(&self) -> u64 {
        match self {
            Priced::Out(_, request) => request.worst_case_fees(),
            Priced::In(_, request) => request.worst_case_fees(),
        }
    }

    fn target(&self) -> SwapTarget {
        match self {
            Priced::Out(target, _) => *target,
            Priced::In(target, _) => *target,
        }
    }
}

impl Manager {
    /// Run the suggestion pipeline once with dispatch disabled and publish
    /// the result for the operator reporting surface.
    pub async fn suggest_swaps(&self) -> Result<Suggestions> {
        let params = self.parameters();
        let suggestions = self.suggest_with(&params).await?;
        self.publish(&suggestions);
        Ok(suggestions)
    }

    /// The per-tick pipeline. Deterministic given the snapshots it reads:
    /// identical inputs produce identical suggestions.
    pub(crate) async fn suggest_with(&self, params: &Parameters) -> Result<Suggestions> {
        let now = self.cfg.clock.now();
        let timeout = params.client_timeout;

        // A snapshot failure aborts the whole tick; quote failures later
        // only drop their candidate.
        let channels = self
            .with_timeout("list channels", timeout, self.cfg.lightning.list_channels())
            .await
            .context("channel snapshot")?;
        let loop_outs = self
            .with_timeout("list loop outs", timeout, self.cfg.store.list_loop_outs())
            .await
            .context("loop out snapshot")?;
        let loop_ins = self
            .with_timeout("list loop ins", timeout, self.cfg.store.list_loop_ins())
            .await
            .context("loop in snapshot")?;
        let restrictions = self
            .with_timeout(
                "server restrictions",
                timeout,
                self.cfg.swap_client.restrictions(),
            )
            .await
            .context("server restrictions")?;

        let mut suggestions = Suggestions::default();

        let mut candidates = collect_candidates(params, &channels, &mut suggestions);

        let traffic = SwapTraffic::collect(&loop_outs, &loop_ins);
        candidates.retain(|candidate| {
            if let Err(reason) = traffic.may_swap(
                candidate.swap_type,
                &candidate.channels,
                candidate.peer,
                now,
                params.failure_backoff,
            ) {
                suggestions.disqualify(candidate.target, reason);
                return false;
            }
            true
        });

        // Clamp to the server maximum, then gate on the fee limit's amount
        // bounds before spending quotes.
        let mut sized = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            candidate.amount = candidate.amount.min(restrictions.max_amount);
            match params.fee_limit.check_amount(candidate.amount, &restrictions) {
                Ok(()) => sized.push(candidate),
                Err(err) => suggestions.disqualify(candidate.target, err.into()),
            }
        }

        // Loop outs ahead of loop ins, channels ahead of peers, ascending
        // id. This order decides who gets in-flight slots and budget.
        sized.sort_by_key(|c| (c.swap_type, c.target));

        let in_flight = count_in_flight_autoloops(&loop_outs, &loop_ins);
        let slots = params.max_auto_in_flight.saturating_sub(in_flight);
        for dropped in sized.drain(slots.min(sized.len())..) {
            suggestions.disqualify(dropped.target, Reason::InFlight);
        }

        let mut priced = Vec::with_capacity(sized.len());
        for candidate in sized {
            match self
                .price_candidate(params, &candidate, now, &mut suggestions)
                .await
            {
                Some(request) => priced.push(request),
                None => continue,
            }
        }

        // Budget admission in list order; a too-expensive intent does not
        // block later, smaller ones.
        let mut remaining = budget::remaining(params, &loop_outs, &loop_ins);
        for intent in priced {
            let fees = intent.worst_case_fees();
            if fees > remaining {
                suggestions.disqualify(intent.target(), Reason::BudgetInsufficient);
                continue;
            }
            remaining -= fees;
            match intent {
                Priced::Out(_, request) => suggestions.out_swaps.push(request),
                Priced::In(_, request) => suggestions.in_swaps.push(request),
            }
        }

        Ok(suggestions)
    }

    /// Quote one candidate and apply the fee limit. A quote transport error
    /// drops the candidate without a disqualification entry; the slot it
    /// consumed is not handed to another target.
    async fn price_candidate(
        &self,
        params: &Parameters,
        candidate: &Candidate,
        now: SystemTime,
        suggestions: &mut Suggestions,
    ) -> Option<Priced> {
        match candidate.swap_type {
            SwapType::Out => {
                let quote_request = LoopOutQuoteRequest {
                    amount: candidate.amount,
                    sweep_conf_target: params.sweep_conf_target,
                    swap_publication_deadline: now,
                };
                let quote = match self
                    .with_timeout(
                        "loop out quote",
                        params.client_timeout,
                        self.cfg.swap_client.loop_out_quote(&quote_request),
                    )
                    .await
                {
                    Ok(quote) => quote,
                    Err(err) => {
                        tracing::warn!(
                            swap_target = %candidate.target,
                            error = %err,
                            "loop out quote failed"
                        );
                        return None;
                    }
                };

                if let Err(reason) = params.fee_limit.check_loop_out(candidate.amount, &quote) {
                    suggestions.disqualify(candidate.target, reason);
                    return None;
                }

                let fees = params.fee_limit.loop_out_fees(candidate.amount, &quote);
                Some(Priced::Out(
                    candidate.target,
                    LoopOutRequest {
                        amount: candidate.amount,
                        max_swap_fee: quote.swap_fee,
                        max_prepay_amount: quote.prepay_amount,
                        max_miner_fee: fees.max_miner_fee,
                        max_swap_routing_fee: fees.max_swap_routing_fee,
                        max_prepay_routing_fee: fees.max_prepay_routing_fee,
                        sweep_conf_target: params.sweep_conf_target,
                        outgoing_chan_set: candidate.channels.clone(),
                        label: autoloop_label(SwapType::Out).to_string(),
                        initiator: AUTOLOOP_INITIATOR.to_string(),
                    },
                ))
            }
            SwapType::In => {
                let quote_request = LoopInQuoteRequest {
                    amount: candidate.amount,
                    htlc_conf_target: params.htlc_conf_target,
                    last_hop: Some(candidate.peer),
                };
                let quote = match self
                    .with_timeout(
                        "loop in quote",
                        params.client_timeout,
                        self.cfg.swap_client.loop_in_quote(&quote_request),
                    )
                    .await
                {
                    Ok(quote) => quote,
                    Err(err) => {
                        tracing::warn!(
                            swap_target = %candidate.target,
                            error = %err,
                            "loop in quote failed"
                        );
                        return None;
                    }
                };

                if let Err(reason) = params.fee_limit.check_loop_in(candidate.amount, &quote) {
                    suggestions.disqualify(candidate.target, reason);
                    return None;
                }

                let (max_swap_fee, max_miner_fee) = params.fee_limit.loop_in_fees(&quote);
                Some(Priced::In(
                    candidate.target,
                    LoopInRequest {
                        amount: candidate.amount,
                        max_swap_fee,
                        max_miner_fee,
                        htlc_conf_target: params.htlc_conf_target,
                        last_hop: Some(candidate.peer),
                        label: autoloop_label(SwapType::In).to_string(),
                        initiator: AUTOLOOP_INITIATOR.to_string(),
                    },
                ))
            }
        }
    }
}

/// Build rule targets from the channel snapshot and evaluate their rules.
///
/// A channel rule claims its channel outright; a peer rule aggregates the
/// peer's remaining channels. Targets whose thresholds are met are reported
/// as `RuleSatisfied`.
fn collect_candidates(
    params: &Parameters,
    channels: &[ChannelInfo],
    suggestions: &mut Suggestions,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    // One pass splits the snapshot into ruled channels and per-peer
    // leftovers, so no channel is counted twice.
    let mut ruled: BTreeMap<ShortChannelId, &ChannelInfo> = BTreeMap::new();
    let mut peer_channels: BTreeMap<NodeId, Vec<&ChannelInfo>> = BTreeMap::new();
    for channel in channels {
        if params.channel_rules.contains_key(&channel.channel_id) {
            ruled.insert(channel.channel_id, channel);
        } else {
            peer_channels.entry(channel.pubkey).or_default().push(channel);
        }
    }

    for (channel_id, rule) in &params.channel_rules {
        // Rules may outlive their channels; nothing to do until the channel
        // is seen again.
        let Some(channel) = ruled.get(channel_id) else {
            continue;
        };

        let target = SwapTarget::Channel(*channel_id);
        match rule.suggest(channel.local_balance, channel.remote_balance) {
            Some((swap_type, amount)) => candidates.push(Candidate {
                target,
                peer: channel.pubkey,
                channels: vec![*channel_id],
                swap_type,
                amount,
            }),
            None => suggestions.disqualify(target, Reason::RuleSatisfied),
        }
    }

    for (peer, rule) in &params.peer_rules {
        let Some(group) = peer_channels.get(peer) else {
            continue;
        };

        let local: u64 = group.iter().map(|c| c.local_balance).sum();
        let remote: u64 = group.iter().map(|c| c.remote_balance).sum();
        let mut ids: Vec<ShortChannelId> = group.iter().map(|c| c.channel_id).collect();
        ids.sort();

        let target = SwapTarget::Peer(*peer);
        match rule.suggest(local, remote) {
            Some((swap_type, amount)) => candidates.push(Candidate {
                target,
                peer: *peer,
                channels: ids,
                swap_type,
                amount,
            }),
            None => suggestions.disqualify(target, Reason::RuleSatisfied),
        }
    }

    candidates
}

fn count_in_flight_autoloops(loop_outs: &[LoopOutSwap], loop_ins: &[LoopInSwap]) -> usize {
    let outs = loop_outs
        .iter()
        .filter(|s| !s.state().is_terminal() && is_autoloop_label(&s.contract.label))
        .count();
    let ins = loop_ins
        .iter()
        .filter(|s| !s.state().is_terminal() && is_autoloop_label(&s.contract.label))
        .count();
    outs + ins
}
