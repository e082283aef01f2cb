use anyhow::Result;
use async_trait::async_trait;

use super::{
    LoopInQuote, LoopInQuoteRequest, LoopInRequest, LoopInSwap, LoopInSwapInfo, LoopOutQuote,
    LoopOutQuoteRequest, LoopOutRequest, LoopOutSwap, LoopOutSwapInfo, Restrictions,
};

/// The swap server surface the liquidity manager consumes: pricing,
/// dispatch and the server's amount restrictions.
#[async_trait]
pub trait SwapClient: Send + Sync {
    async fn loop_out_quote(&self, request: &LoopOutQuoteRequest) -> Result<LoopOutQuote>;

    async fn loop_in_quote(&self, request: &LoopInQuoteRequest) -> Result<LoopInQuote>;

    async fn loop_out(&self, request: &LoopOutRequest) -> Result<LoopOutSwapInfo>;

    async fn loop_in(&self, request: &LoopInRequest) -> Result<LoopInSwapInfo>;

    async fn restrictions(&self) -> Result<Restrictions>;
}

/// Read side of the external swap store. The store owns swap state; the
/// manager re-reads it every tick and never caches across ticks.
#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn list_loop_outs(&self) -> Result<Vec<LoopOutSwap>>;

    async fn list_loop_ins(&self) -> Result<Vec<LoopInSwap>>;
}
