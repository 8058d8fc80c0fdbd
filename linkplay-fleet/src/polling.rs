//! Per-device status polling
//!
//! One [`PollingTask`] runs per online, supported device. A task polls at a
//! fixed interval measured from the start of each cycle until it is shut
//! down. Poll failures are counted but never change the device's online
//! flag; only discovery does that.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use linkplay_api::DeviceTransport;
use linkplay_discovery::DeviceAddress;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::model::DeviceId;
use crate::registry::Registry;

#[derive(Debug, Default)]
struct Counters {
    polls: AtomicU64,
    failures: AtomicU64,
}

/// A single polling loop and the handles needed to stop it
#[derive(Debug)]
pub(crate) struct PollingTask {
    id: DeviceId,
    address: DeviceAddress,
    generation: u64,
    interval: Duration,
    started_at: DateTime<Utc>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    task_handle: JoinHandle<()>,
}

impl PollingTask {
    /// Spawn the loop. The first poll happens immediately.
    pub fn start(
        id: DeviceId,
        address: DeviceAddress,
        generation: u64,
        interval: Duration,
        transport: Arc<dyn DeviceTransport>,
        registry: Arc<Registry>,
    ) -> Self {
        let counters = Arc::new(Counters::default());
        let cancel = CancellationToken::new();

        let task_handle = tokio::spawn(Self::polling_loop(
            id.clone(),
            address,
            generation,
            interval,
            transport,
            registry,
            Arc::clone(&counters),
            cancel.clone(),
        ));

        Self {
            id,
            address,
            generation,
            interval,
            started_at: Utc::now(),
            counters,
            cancel,
            task_handle,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn polling_loop(
        id: DeviceId,
        address: DeviceAddress,
        generation: u64,
        interval: Duration,
        transport: Arc<dyn DeviceTransport>,
        registry: Arc<Registry>,
        counters: Arc<Counters>,
        cancel: CancellationToken,
    ) {
        debug!(device = %id, %address, generation, ?interval, "Polling started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(gate) = registry.gate(&id) else {
                break;
            };

            // Held across the exchange and the registry write so a command
            // for the same device cannot interleave
            let _guard = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                guard = gate.lock() => guard,
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = transport.fetch_status(&address) => result,
            };

            counters.polls.fetch_add(1, Ordering::Relaxed);

            match result {
                Ok(status) => {
                    trace!(
                        device = %id,
                        volume = %status.volume,
                        playback = ?status.playback,
                        "Polled status"
                    );
                    if !registry.apply_poll(&id, generation, status) {
                        debug!(device = %id, generation, "Discarding poll from superseded loop");
                        break;
                    }
                }
                Err(e) => {
                    let failures = counters.failures.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(device = %id, %address, failures, error = %e, "Status poll failed");
                }
            }
        }

        debug!(device = %id, generation, "Polling ended");
    }

    pub fn stats(&self) -> PollingStats {
        PollingStats {
            device: self.id.clone(),
            address: self.address,
            generation: self.generation,
            interval: self.interval,
            started_at: self.started_at,
            poll_count: self.counters.polls.load(Ordering::Relaxed),
            failure_count: self.counters.failures.load(Ordering::Relaxed),
            is_running: !self.task_handle.is_finished(),
        }
    }

    /// Signal the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the loop and wait until it can no longer touch the registry.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        if let Err(e) = self.task_handle.await {
            if e.is_panic() {
                warn!(device = %self.id, "Polling task panicked: {}", e);
            }
        }
    }
}

/// Statistics for one polling loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingStats {
    pub device: DeviceId,
    pub address: DeviceAddress,
    /// Increases every time polling for any device is (re)started
    pub generation: u64,
    pub interval: Duration,
    pub started_at: DateTime<Utc>,
    /// Completed status requests, successful or not
    pub poll_count: u64,
    pub failure_count: u64,
    pub is_running: bool,
}
