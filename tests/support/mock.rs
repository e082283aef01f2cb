use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use ln_swap_liquidity::lightning::{ChannelInfo, LightningClient};
use ln_swap_liquidity::swap::client::{SwapClient, SwapStore};
use ln_swap_liquidity::swap::{
    LoopInQuote, LoopInQuoteRequest, LoopInRequest, LoopInSwap, LoopInSwapInfo, LoopOutQuote,
    LoopOutQuoteRequest, LoopOutRequest, LoopOutSwap, LoopOutSwapInfo, Restrictions,
};

pub struct MockLightning {
    channels: Mutex<Vec<ChannelInfo>>,
}

impl MockLightning {
    pub fn new(channels: Vec<ChannelInfo>) -> Self {
        Self {
            channels: Mutex::new(channels),
        }
    }

    pub fn set_channels(&self, channels: Vec<ChannelInfo>) {
        *self.channels.lock().expect("channels mutex poisoned") = channels;
    }
}

#[async_trait]
impl LightningClient for MockLightning {
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self.channels.lock().expect("channels mutex poisoned").clone())
    }
}

#[derive(Default)]
pub struct MockStore {
    loop_outs: Mutex<Vec<LoopOutSwap>>,
    loop_ins: Mutex<Vec<LoopInSwap>>,
}

impl MockStore {
    pub fn set_loop_outs(&self, swaps: Vec<LoopOutSwap>) {
        *self.loop_outs.lock().expect("store mutex poisoned") = swaps;
    }

    pub fn set_loop_ins(&self, swaps: Vec<LoopInSwap>) {
        *self.loop_ins.lock().expect("store mutex poisoned") = swaps;
    }
}

#[async_trait]
impl SwapStore for MockStore {
    async fn list_loop_outs(&self) -> Result<Vec<LoopOutSwap>> {
        Ok(self.loop_outs.lock().expect("store mutex poisoned").clone())
    }

    async fn list_loop_ins(&self) -> Result<Vec<LoopInSwap>> {
        Ok(self.loop_ins.lock().expect("store mutex poisoned").clone())
    }
}

/// In-memory swap server: quotes are served from queues in request order,
/// dispatches are recorded and acknowledged with sequential swap hashes.
pub struct MockServer {
    restrictions: Mutex<Restrictions>,
    out_quotes: Mutex<VecDeque<LoopOutQuote>>,
    in_quotes: Mutex<VecDeque<LoopInQuote>>,
    out_quote_requests: Mutex<Vec<LoopOutQuoteRequest>>,
    in_quote_requests: Mutex<Vec<LoopInQuoteRequest>>,
    dispatched_outs: Mutex<Vec<LoopOutRequest>>,
    dispatched_ins: Mutex<Vec<LoopInRequest>>,
    next_hash: Mutex<u8>,
}

impl MockServer {
    pub fn new(restrictions: Restrictions) -> Self {
        Self {
            restrictions: Mutex::new(restrictions),
            out_quotes: Mutex::new(VecDeque::new()),
            in_quotes: Mutex::new(VecDeque::new()),
            out_quote_requests: Mutex::new(Vec::new()),
            in_quote_requests: Mutex::new(Vec::new()),
            dispatched_outs: Mutex::new(Vec::new()),
            dispatched_ins: Mutex::new(Vec::new()),
            next_hash: Mutex::new(1),
        }
    }

    pub fn set_restrictions(&self, restrictions: Restrictions) {
        *self.restrictions.lock().expect("server mutex poisoned") = restrictions;
    }

    /// Queue quotes in the order the suggester will request them.
    pub fn queue_out_quotes(&self, quotes: impl IntoIterator<Item = LoopOutQuote>) {
        self.out_quotes
            .lock()
            .expect("server mutex poisoned")
            .extend(quotes);
    }

    pub fn queue_in_quotes(&self, quotes: impl IntoIterator<Item = LoopInQuote>) {
        self.in_quotes
            .lock()
            .expect("server mutex poisoned")
            .extend(quotes);
    }

    pub fn take_out_quote_requests(&self) -> Vec<LoopOutQuoteRequest> {
        std::mem::take(&mut *self.out_quote_requests.lock().expect("server mutex poisoned"))
    }

    pub fn take_in_quote_requests(&self) -> Vec<LoopInQuoteRequest> {
        std::mem::take(&mut *self.in_quote_requests.lock().expect("server mutex poisoned"))
    }

    pub fn take_dispatched_outs(&self) -> Vec<LoopOutRequest> {
        std::mem::take(&mut *self.dispatched_outs.lock().expect("server mutex poisoned"))
    }

    pub fn take_dispatched_ins(&self) -> Vec<LoopInRequest> {
        std::mem::take(&mut *self.dispatched_ins.lock().expect("server mutex poisoned"))
    }

    fn next_hash(&self) -> [u8; 32] {
        let mut next = self.next_hash.lock().expect("server mutex poisoned");
        let hash = [*next; 32];
        *next += 1;
        hash
    }
}

#[async_trait]
impl SwapClient for MockServer {
    async fn loop_out_quote(&self, request: &LoopOutQuoteRequest) -> Result<LoopOutQuote> {
        self.out_quote_requests
            .lock()
            .expect("server mutex poisoned")
            .push(request.clone());
        self.out_quotes
            .lock()
            .expect("server mutex poisoned")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("unexpected loop out quote request: {request:?}"))
    }

    async fn loop_in_quote(&self, request: &LoopInQuoteRequest) -> Result<LoopInQuote> {
        self.in_quote_requests
            .lock()
            .expect("server mutex poisoned")
            .push(request.clone());
        self.in_quotes
            .lock()
            .expect("server mutex poisoned")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("unexpected loop in quote request: {request:?}"))
    }

    async fn loop_out(&self, request: &LoopOutRequest) -> Result<LoopOutSwapInfo> {
        self.dispatched_outs
            .lock()
            .expect("server mutex poisoned")
            .push(request.clone());
        Ok(LoopOutSwapInfo {
            swap_hash: self.next_hash(),
        })
    }

    async fn loop_in(&self, request: &LoopInRequest) -> Result<LoopInSwapInfo> {
        self.dispatched_ins
            .lock()
            .expect("server mutex poisoned")
            .push(request.clone());
        Ok(LoopInSwapInfo {
            swap_hash: self.next_hash(),
        })
    }

    async fn restrictions(&self) -> Result<Restrictions> {
        Ok(*self.restrictions.lock().expect("server mutex poisoned"))
    }
}
