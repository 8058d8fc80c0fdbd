//! Fleet coordinator
//!
//! Owns the registry, drives discovery, supervises one polling loop per
//! online device and dispatches commands.
//!
//! Two kinds of exclusion keep the registry consistent:
//!
//! - Structural changes (entries appearing or moving, polling loops starting
//!   or stopping, discovery starting or stopping) happen inside one
//!   supervisor critical section. Polling loops are always cancelled *and
//!   awaited* before the entry they write to changes.
//! - Each device has a gate. A poll cycle and a command for the same device
//!   hold it across their network exchange and registry write, so they never
//!   interleave. Different devices never wait on each other.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use linkplay_api::{
    ApiError, Command, DeviceClient, DeviceStatus, DeviceTransport, PlaybackState, Volume,
};
use linkplay_discovery::{
    DeviceAddress, Discoverer, DiscoveryEvent, DiscoveryService, DiscoveryStream, Vendor,
};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FleetConfig;
use crate::error::{FleetError, Result};
use crate::model::{Device, DeviceId, FleetSnapshot};
use crate::polling::{PollingStats, PollingTask};
use crate::registry::{Reconcile, Registry};

/// Running discovery subscription
struct DiscoveryTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Everything that changes only inside the supervisor critical section
#[derive(Default)]
struct Supervisor {
    discovery: Option<DiscoveryTask>,
    pollers: HashMap<DeviceId, PollingTask>,
}

struct Inner {
    config: FleetConfig,
    transport: Arc<dyn DeviceTransport>,
    discoverer: Arc<dyn Discoverer>,
    registry: Arc<Registry>,
    supervisor: Mutex<Supervisor>,
    next_generation: AtomicU64,
}

/// Coordinates discovery, polling and commands for a fleet of devices.
///
/// Cheap to clone; clones share the same fleet.
///
/// # Command latency
///
/// A command waits for any status poll already in flight for the same
/// device. Against an unresponsive device that is up to the client's
/// `resource_timeout` (6 s by default) before the command is even sent.
///
/// # Example
///
/// ```rust,no_run
/// use linkplay_fleet::{FleetConfig, FleetCoordinator};
///
/// # async fn example() -> linkplay_fleet::Result<()> {
/// let fleet = FleetCoordinator::new(FleetConfig::default())?;
/// let mut updates = fleet.subscribe();
/// fleet.start_discovery().await;
///
/// while updates.changed().await.is_ok() {
///     let snapshot = updates.borrow_and_update().clone();
///     for device in &snapshot.devices {
///         println!("{}: {}", device.name(), device.status.source);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FleetCoordinator {
    inner: Arc<Inner>,
}

impl FleetCoordinator {
    /// Create a coordinator backed by mDNS discovery and the HTTP client.
    pub fn new(config: FleetConfig) -> Result<Self> {
        config.validate()?;

        let transport = Arc::new(DeviceClient::with_config(config.client.clone())?);
        let discoverer = Arc::new(DiscoveryService::with_config(config.discovery.clone()));

        Self::with_components(config, transport, discoverer)
    }

    /// Create a coordinator with custom transport and discovery.
    pub fn with_components(
        config: FleetConfig,
        transport: Arc<dyn DeviceTransport>,
        discoverer: Arc<dyn Discoverer>,
    ) -> Result<Self> {
        if config.poll_interval.is_zero() {
            return Err(FleetError::Config(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                discoverer,
                registry: Arc::new(Registry::new()),
                supervisor: Mutex::new(Supervisor::default()),
                next_generation: AtomicU64::new(1),
            }),
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.inner.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Subscribe to discovery events, restarting the subscription if one is
    /// already running. Known devices and their polling are kept.
    pub async fn start_discovery(&self) {
        let mut supervisor = self.inner.supervisor.lock().await;
        self.inner.stop_discovery_task(&mut supervisor).await;
        self.inner.spawn_discovery(&mut supervisor);
    }

    /// Stop discovery and every polling loop. Devices stay in the registry.
    pub async fn stop_discovery(&self) {
        let mut supervisor = self.inner.supervisor.lock().await;
        self.inner.stop_discovery_task(&mut supervisor).await;
        self.inner.stop_all_polling(&mut supervisor).await;
        info!("Discovery stopped");
    }

    /// Forget every device and start discovering from scratch.
    pub async fn refresh(&self) {
        let mut supervisor = self.inner.supervisor.lock().await;
        self.inner.stop_discovery_task(&mut supervisor).await;
        self.inner.stop_all_polling(&mut supervisor).await;
        self.inner.registry.clear();
        info!("Fleet registry cleared");
        self.inner.spawn_discovery(&mut supervisor);
    }

    // ========================================================================
    // Read model
    // ========================================================================

    /// Current fleet state
    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.inner.registry.snapshot()
    }

    /// Receive a new snapshot on every registry change
    pub fn subscribe(&self) -> watch::Receiver<Arc<FleetSnapshot>> {
        self.inner.registry.subscribe()
    }

    /// All devices, sorted by name
    pub fn devices(&self) -> Vec<Device> {
        self.inner.registry.devices()
    }

    pub fn device(&self, name: &str) -> Option<Device> {
        self.inner.registry.device(&DeviceId::new(name))
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.registry.is_scanning()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.registry.last_error()
    }

    pub fn clear_error(&self) {
        self.inner.registry.clear_error();
    }

    /// Statistics for every running polling loop, sorted by device
    pub async fn polling_stats(&self) -> Vec<PollingStats> {
        let supervisor = self.inner.supervisor.lock().await;
        let mut stats: Vec<PollingStats> =
            supervisor.pollers.values().map(PollingTask::stats).collect();
        stats.sort_by(|a, b| a.device.cmp(&b.device));
        stats
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Set absolute volume. Out-of-range levels are clamped.
    pub async fn set_volume(&self, level: i32, device: &str) -> Result<()> {
        self.dispatch(device, |current| {
            let mut next = current.clone();
            next.volume = Volume::new(level);
            (Command::SetVolume(level), next)
        })
        .await
    }

    pub async fn toggle_mute(&self, device: &str) -> Result<()> {
        self.dispatch(device, |current| {
            let mut next = current.clone();
            next.muted = !current.muted;
            (Command::SetMute(next.muted), next)
        })
        .await
    }

    /// Playing becomes paused; any other state becomes playing.
    pub async fn toggle_play_pause(&self, device: &str) -> Result<()> {
        self.dispatch(device, |current| {
            let mut next = current.clone();
            next.playback = current.playback.toggled();
            (Command::TogglePlayPause, next)
        })
        .await
    }

    /// Recall a 1-based preset slot; the device starts playing it.
    pub async fn trigger_preset(&self, index: u32, device: &str) -> Result<()> {
        let Some(slot) = NonZeroU32::new(index) else {
            let err = FleetError::InvalidPreset(index);
            self.inner.registry.record_error(err.to_string());
            return Err(err);
        };

        self.dispatch(device, |current| {
            let mut next = current.clone();
            next.playback = PlaybackState::Playing;
            (Command::TriggerPreset(slot), next)
        })
        .await
    }

    /// Skip forward. Track metadata refreshes on the next poll.
    pub async fn next_track(&self, device: &str) -> Result<()> {
        self.dispatch(device, |current| (Command::Next, current.clone()))
            .await
    }

    /// Skip back. Track metadata refreshes on the next poll.
    pub async fn previous_track(&self, device: &str) -> Result<()> {
        self.dispatch(device, |current| (Command::Previous, current.clone()))
            .await
    }

    /// Send one command under the device gate and apply the optimistic
    /// status on success. The gate is shared with the polling loop, so an
    /// in-flight poll delays the send. Failures are recorded as the last
    /// error and leave the status untouched.
    async fn dispatch(
        &self,
        device: &str,
        plan: impl FnOnce(&DeviceStatus) -> (Command, DeviceStatus),
    ) -> Result<()> {
        let result = self.try_dispatch(&DeviceId::new(device), plan).await;

        if let Err(e) = &result {
            warn!(device, error = %e, "Command failed");
            self.inner.registry.record_error(e.to_string());
        }
        result
    }

    async fn try_dispatch(
        &self,
        id: &DeviceId,
        plan: impl FnOnce(&DeviceStatus) -> (Command, DeviceStatus),
    ) -> Result<()> {
        let registry = &self.inner.registry;
        let not_found = || FleetError::DeviceNotFound(id.to_string());

        let gate = registry.gate(id).ok_or_else(not_found)?;
        let _guard = gate.lock().await;

        // Read under the gate so no poll lands between read and write
        let device = registry.device(id).ok_or_else(not_found)?;
        if !device.vendor.is_supported() {
            return Err(ApiError::UnsupportedVendor(device.vendor).into());
        }

        let (command, optimistic) = plan(&device.status);
        debug!(
            device = %id,
            address = %device.address,
            command = command.name(),
            "Sending command"
        );

        self.inner
            .transport
            .send_command(&device.address, &command)
            .await?;

        registry.apply_command(id, optimistic);
        Ok(())
    }
}

impl Inner {
    fn spawn_discovery(self: &Arc<Self>, supervisor: &mut Supervisor) {
        let stream = self.discoverer.start();
        let cancel = CancellationToken::new();
        self.registry.set_scanning(true);

        let handle = tokio::spawn(drive_discovery(
            Arc::downgrade(self),
            stream,
            cancel.clone(),
        ));
        supervisor.discovery = Some(DiscoveryTask { cancel, handle });
        info!("Discovery started");
    }

    async fn stop_discovery_task(&self, supervisor: &mut Supervisor) {
        if let Some(task) = supervisor.discovery.take() {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                if e.is_panic() {
                    warn!("Discovery task panicked: {}", e);
                }
            }
        }
        self.discoverer.stop();
        self.registry.set_scanning(false);
    }

    async fn stop_all_polling(&self, supervisor: &mut Supervisor) {
        let pollers: Vec<PollingTask> = supervisor.pollers.drain().map(|(_, task)| task).collect();
        for task in &pollers {
            task.cancel();
        }
        for task in pollers {
            task.shutdown().await;
        }
    }

    async fn stop_polling(&self, supervisor: &mut Supervisor, id: &DeviceId) {
        if let Some(task) = supervisor.pollers.remove(id) {
            task.shutdown().await;
        }
    }

    fn start_polling(
        &self,
        supervisor: &mut Supervisor,
        id: &DeviceId,
        address: DeviceAddress,
        vendor: Vendor,
    ) {
        if !vendor.is_supported() {
            debug!(device = %id, %vendor, "No control protocol for vendor, not polling");
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.registry.set_generation(id, generation);

        let task = PollingTask::start(
            id.clone(),
            address,
            generation,
            self.config.poll_interval,
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
        );
        supervisor.pollers.insert(id.clone(), task);
    }

    /// Apply one discovery event. Caller holds the supervisor lock.
    async fn handle_event(&self, supervisor: &mut Supervisor, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::DeviceFound {
                name,
                address,
                vendor,
            } => {
                let id = DeviceId::new(name);
                match self.registry.classify(&id, &address, vendor) {
                    Reconcile::Unchanged => {
                        debug!(device = %id, %address, "Duplicate announcement ignored");
                    }
                    Reconcile::New => {
                        info!(device = %id, %address, %vendor, "Device discovered");
                        self.registry.upsert_found(&id, address, vendor);
                        self.start_polling(supervisor, &id, address, vendor);
                    }
                    outcome @ (Reconcile::Rediscovered | Reconcile::Moved) => {
                        info!(device = %id, %address, ?outcome, "Device back online");
                        self.stop_polling(supervisor, &id).await;
                        self.registry.upsert_found(&id, address, vendor);
                        self.start_polling(supervisor, &id, address, vendor);
                    }
                }
            }
            DiscoveryEvent::DeviceLost { name } => {
                let id = DeviceId::new(name);
                self.stop_polling(supervisor, &id).await;
                if self.registry.mark_lost(&id) {
                    info!(device = %id, "Device lost");
                } else {
                    debug!(device = %id, "Lost announcement for unknown device ignored");
                }
            }
            DiscoveryEvent::Error { cause } => {
                warn!(error = %cause, "Discovery failed");
                self.registry
                    .record_error(FleetError::from(cause).to_string());
                self.registry.set_scanning(false);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let supervisor = self.supervisor.get_mut();
        if let Some(task) = supervisor.discovery.take() {
            task.cancel.cancel();
        }
        for task in supervisor.pollers.values() {
            task.cancel();
        }
        self.discoverer.stop();
    }
}

/// Feed discovery events into the coordinator until cancelled or the
/// stream ends.
async fn drive_discovery(
    inner: Weak<Inner>,
    mut stream: DiscoveryStream,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = stream.recv() => event,
        };

        let Some(inner) = inner.upgrade() else {
            return;
        };

        let Some(event) = event else {
            debug!("Discovery stream ended");
            // Stop/refresh hold the supervisor while awaiting this task
            let _supervisor = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                guard = inner.supervisor.lock() => guard,
            };
            inner.registry.set_scanning(false);
            return;
        };

        let mut supervisor = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            guard = inner.supervisor.lock() => guard,
        };
        if cancel.is_cancelled() {
            return;
        }

        inner.handle_event(&mut supervisor, event).await;
    }
}
