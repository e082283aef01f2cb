#![allow(dead_code)]

pub mod clock;
pub mod mock;
pub mod wait;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};

use ln_swap_liquidity::lightning::{ChannelInfo, NodeId, ShortChannelId};
use ln_swap_liquidity::liquidity::{Manager, ManagerConfig, Parameters};
use ln_swap_liquidity::swap::{
    LoopInRequest, LoopInSwap, LoopOutRequest, LoopOutSwap, Restrictions, SwapCost, SwapEvent,
    SwapState,
};

use clock::ManualClock;
use mock::{MockLightning, MockServer, MockStore};

/// Base time all scenario tests start at.
pub fn test_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_600_000_000)
}

pub fn node_id(byte: u8) -> NodeId {
    NodeId([byte; 33])
}

pub fn channel(id: u64, peer: NodeId, local: u64, remote: u64) -> ChannelInfo {
    ChannelInfo {
        channel_id: ShortChannelId(id),
        pubkey: peer,
        capacity: local + remote,
        local_balance: local,
        remote_balance: remote,
    }
}

pub fn event(timestamp: SystemTime, state: SwapState, cost: SwapCost) -> SwapEvent {
    SwapEvent {
        timestamp,
        state,
        cost,
    }
}

/// The swap store representation of a dispatched loop out request.
pub fn existing_out_from_request(
    request: &LoopOutRequest,
    initiation_time: SystemTime,
    events: Vec<SwapEvent>,
) -> LoopOutSwap {
    LoopOutSwap {
        contract: request.clone().into_contract(initiation_time),
        events,
    }
}

pub fn existing_in_from_request(
    request: &LoopInRequest,
    initiation_time: SystemTime,
    events: Vec<SwapEvent>,
) -> LoopInSwap {
    LoopInSwap {
        contract: request.clone().into_contract(initiation_time),
        events,
    }
}

/// A manager wired to in-memory mocks, the shared fixture of the autoloop
/// scenario tests.
pub struct TestCtx {
    pub clock: Arc<ManualClock>,
    pub lightning: Arc<MockLightning>,
    pub server: Arc<MockServer>,
    pub store: Arc<MockStore>,
    pub manager: Arc<Manager>,
}

impl TestCtx {
    pub fn new(
        params: Parameters,
        channels: Vec<ChannelInfo>,
        restrictions: Restrictions,
    ) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(test_time()));
        let lightning = Arc::new(MockLightning::new(channels));
        let server = Arc::new(MockServer::new(restrictions));
        let store = Arc::new(MockStore::default());

        let cfg = ManagerConfig {
            clock: clock.clone(),
            swap_client: server.clone(),
            lightning: lightning.clone(),
            store: store.clone(),
        };
        let manager = Manager::new(cfg, params).context("create manager")?;

        Ok(Self {
            clock,
            lightning,
            server,
            store,
            manager: Arc::new(manager),
        })
    }
}
