use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};

use super::{Parameters, Suggestions, ValidationError};
use crate::clock::Clock;
use crate::lightning::LightningClient;
use crate::swap::client::{SwapClient, SwapStore};

/// The external capabilities the liquidity manager consumes. All remote
/// state is re-read through these on every tick.
#[derive(Clone)]
pub struct ManagerConfig {
    pub clock: Arc<dyn Clock>,
    pub swap_client: Arc<dyn SwapClient>,
    pub lightning: Arc<dyn LightningClient>,
    pub store: Arc<dyn SwapStore>,
}

/// The autolooper: owns the validated parameter set, computes suggestions
/// per tick and dispatches them when autoloop is enabled.
pub struct Manager {
    pub(crate) cfg: ManagerConfig,
    params: RwLock<Arc<Parameters>>,
    last_suggestions: Mutex<Option<Suggestions>>,
}

impl Manager {
    pub fn new(cfg: ManagerConfig, params: Parameters) -> Result<Self, ValidationError> {
        params.validate(cfg.clock.now())?;
        Ok(Self {
            cfg,
            params: RwLock::new(Arc::new(params)),
            last_suggestions: Mutex::new(None),
        })
    }

    /// Snapshot of the current parameters. Ticks take one snapshot at tick
    /// start; a concurrent update is not visible to a running tick.
    pub fn parameters(&self) -> Arc<Parameters> {
        self.params.read().expect("params lock poisoned").clone()
    }

    /// Validate and atomically replace the parameter set.
    pub fn set_parameters(&self, params: Parameters) -> Result<(), ValidationError> {
        params.validate(self.cfg.clock.now())?;
        *self.params.write().expect("params lock poisoned") = Arc::new(params);
        Ok(())
    }

    /// The suggestions computed by the most recent tick or `suggest_swaps`
    /// call, for the operator reporting surface.
    pub fn last_suggestions(&self) -> Option<Suggestions> {
        self.last_suggestions
            .lock()
            .expect("suggestions lock poisoned")
            .clone()
    }

    pub(crate) fn publish(&self, suggestions: &Suggestions) {
        *self
            .last_suggestions
            .lock()
            .expect("suggestions lock poisoned") = Some(suggestions.clone());
    }

    /// One full tick: suggest, then dispatch when autoloop is enabled.
    /// Dispatch is fire-and-forget; a failed dispatch is logged and does
    /// not affect the remaining intents of the tick.
    pub async fn autoloop_once(&self) -> Result<()> {
        let params = self.parameters();
        let suggestions = self.suggest_with(&params).await?;
        self.publish(&suggestions);

        if !params.autoloop {
            if !suggestions.is_empty() {
                tracing::debug!(
                    out = suggestions.out_swaps.len(),
                    in_ = suggestions.in_swaps.len(),
                    "autoloop disabled, suggestions published only"
                );
            }
            return Ok(());
        }

        for request in &suggestions.out_swaps {
            let dispatch = self.with_timeout(
                "dispatch loop out",
                params.client_timeout,
                self.cfg.swap_client.loop_out(request),
            );
            match dispatch.await {
                Ok(info) => tracing::info!(
                    swap_hash = %hex::encode(info.swap_hash),
                    amount = request.amount,
                    channels = ?request.outgoing_chan_set,
                    "dispatched loop out"
                ),
                Err(err) => tracing::warn!(
                    error = %err,
                    amount = request.amount,
                    channels = ?request.outgoing_chan_set,
                    "loop out dispatch failed"
                ),
            }
        }

        for request in &suggestions.in_swaps {
            let dispatch = self.with_timeout(
                "dispatch loop in",
                params.client_timeout,
                self.cfg.swap_client.loop_in(request),
            );
            match dispatch.await {
                Ok(info) => tracing::info!(
                    swap_hash = %hex::encode(info.swap_hash),
                    amount = request.amount,
                    last_hop = ?request.last_hop,
                    "dispatched loop in"
                ),
                Err(err) => tracing::warn!(
                    error = %err,
                    amount = request.amount,
                    last_hop = ?request.last_hop,
                    "loop in dispatch failed"
                ),
            }
        }

        Ok(())
    }

    /// The dispatcher loop: a single cooperative worker that serializes
    /// ticks. Shutdown aborts an in-progress tick, dropping any outstanding
    /// remote call; already dispatched swaps stay with the swap client.
    pub async fn run(
        &self,
        mut ticks: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!("autoloop dispatcher running");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                tick = ticks.recv() => {
                    if tick.is_none() {
                        break;
                    }
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        result = self.autoloop_once() => {
                            if let Err(err) = result {
                                tracing::warn!(error = %err, "autoloop tick failed");
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("autoloop dispatcher stopped");
        Ok(())
    }

    pub(crate) async fn with_timeout<T>(
        &self,
        what: &str,
        timeout: Duration,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("{what}: timed out after {timeout:?}"),
        }
    }
}

/// Tick source for [`Manager::run`]. The channel holds at most one pending
/// tick; a tick that fires while one is still pending is dropped rather
/// than queued.
pub fn interval_ticker(period: Duration) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match tx.try_send(()) {
                Ok(()) => {}
                // A tick is already pending or in progress.
                Err(mpsc::error::TrySendError::Full(())) => {}
                Err(mpsc::error::TrySendError::Closed(())) => return,
            }
        }
    });

    rx
}
