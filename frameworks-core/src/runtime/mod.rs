//! Long-running drivers.
//!
//! Four parallel loops: the consumer driver drains telemetry envelopes into
//! the router, the lookout driver drains incident-bus payloads into the
//! lookout trigger, the heartbeat driver runs agent cycles, and the infra
//! driver ticks the monitor sweep. Every loop takes a cancellation token
//! and catches panics so one bad cycle never kills the process.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use frameworks_model::EventEnvelope;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::HeartbeatAgent;
use crate::agent::lookout::LookoutTrigger;
use crate::database::ports::{EventSource, IncidentSource};
use crate::error::Result;
use crate::infra::InfraMonitor;
use crate::ingest::IngestRouter;

/// An [`EventSource`] backed by an in-process channel; the server's ingest
/// endpoint feeds it. Batches arrive in send order, which preserves the
/// per-channel ordering contract.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<Vec<EventEnvelope>>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<EventEnvelope>>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<EventEnvelope>>> {
        Ok(self.receiver.recv().await)
    }
}

/// An [`IncidentSource`] backed by an in-process channel; the server's
/// incident endpoint feeds it.
#[derive(Debug)]
pub struct IncidentChannelSource {
    receiver: mpsc::Receiver<Vec<u8>>,
}

impl IncidentChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl IncidentSource for IncidentChannelSource {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.receiver.recv().await)
    }
}

/// Drains the source into the router until cancellation or source close.
/// Sink failures are logged and the batch is retried by re-ingesting once;
/// upserts are idempotent so replays are safe.
pub async fn run_consumer<S>(mut source: S, router: Arc<IngestRouter>, cancel: CancellationToken)
where
    S: EventSource,
{
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => {
                info!("consumer driver cancelled");
                return;
            }
            batch = source.next_batch() => batch,
        };

        let envelopes = match batch {
            Ok(Some(envelopes)) => envelopes,
            Ok(None) => {
                info!("event source closed, consumer driver exiting");
                return;
            }
            Err(err) => {
                warn!(error = %err, "event source read failed");
                continue;
            }
        };

        if let Err(err) = router.ingest(envelopes.clone()).await {
            warn!(error = %err, "batch routing failed, retrying once");
            if let Err(err) = router.ingest(envelopes).await {
                error!(error = %err, "batch routing failed twice, dropping batch");
            }
        }
    }
}

/// Drains the incident bus into the lookout trigger until cancellation or
/// source close. The trigger acknowledges everything it is handed, so the
/// only failures surfacing here are source reads and captured panics.
pub async fn run_lookout<S>(mut source: S, trigger: Arc<LookoutTrigger>, cancel: CancellationToken)
where
    S: IncidentSource,
{
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                info!("lookout driver cancelled");
                return;
            }
            message = source.next_message() => message,
        };

        let payload = match message {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                info!("incident source closed, lookout driver exiting");
                return;
            }
            Err(err) => {
                warn!(error = %err, "incident source read failed");
                continue;
            }
        };

        let outcome = AssertUnwindSafe(trigger.handle_raw(&cancel, &payload))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "incident handling failed"),
            Err(_) => error!("incident handler panicked"),
        }
    }
}

/// Spawns the heartbeat driver: an immediate first cycle, then one per
/// interval. Cycle panics are captured and the loop continues.
pub fn spawn_heartbeat(agent: Arc<HeartbeatAgent>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(agent.interval());
        // The first tick fires immediately.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("heartbeat driver cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let outcome = AssertUnwindSafe(agent.run_cycle(&cancel)).catch_unwind().await;
            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "heartbeat cycle failed"),
                Err(_) => error!("heartbeat cycle panicked"),
            }
        }
    })
}

/// Spawns the infra driver: one sweep per tick.
pub fn spawn_infra_monitor(
    monitor: Arc<InfraMonitor>,
    tick: std::time::Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("infra driver cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let outcome = AssertUnwindSafe(monitor.sweep(&cancel)).catch_unwind().await;
            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "infra sweep failed"),
                Err(_) => error!("infra sweep panicked"),
            }
        }
    })
}
