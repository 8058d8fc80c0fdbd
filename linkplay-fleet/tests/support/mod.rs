//! Test doubles for driving the coordinator without a network

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use linkplay_api::{ApiError, Command, ProtocolError, TransportError};
use linkplay_discovery::DiscoveryStream;
use linkplay_fleet::{
    DeviceAddress, DeviceStatus, DeviceTransport, Discoverer, DiscoveryEvent, FleetConfig,
    FleetCoordinator, FleetSnapshot, PlaybackState, Vendor, Volume,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub fn addr(last: u8) -> DeviceAddress {
    DeviceAddress::new(IpAddr::from([192, 168, 1, last]), 80)
}

pub fn found(name: &str, address: DeviceAddress) -> DiscoveryEvent {
    DiscoveryEvent::DeviceFound {
        name: name.to_string(),
        address,
        vendor: Vendor::Wiim,
    }
}

pub fn lost(name: &str) -> DiscoveryEvent {
    DiscoveryEvent::DeviceLost {
        name: name.to_string(),
    }
}

/// Devices that behave like firmware: commands change the state that the
/// next status poll reports.
#[derive(Default)]
pub struct SimulatedDevices {
    states: Mutex<HashMap<DeviceAddress, DeviceStatus>>,
    fetches: Mutex<Vec<DeviceAddress>>,
    commands: Mutex<Vec<(DeviceAddress, Command)>>,
    blocked: Mutex<HashSet<DeviceAddress>>,
    blocked_fetches: AtomicUsize,
    pub fail_polls: AtomicBool,
    /// Status requests answer with a body that cannot be decoded
    pub garble_polls: AtomicBool,
    pub fail_commands: AtomicBool,
}

impl SimulatedDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_state(&self, address: DeviceAddress, status: DeviceStatus) {
        self.states.lock().insert(address, status);
    }

    /// Status requests to `address` never complete
    pub fn block(&self, address: DeviceAddress) {
        self.blocked.lock().insert(address);
    }

    pub fn blocked_fetches(&self) -> usize {
        self.blocked_fetches.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> Vec<DeviceAddress> {
        self.fetches.lock().clone()
    }

    pub fn commands(&self) -> Vec<(DeviceAddress, Command)> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl DeviceTransport for SimulatedDevices {
    async fn fetch_status(&self, address: &DeviceAddress) -> linkplay_api::Result<DeviceStatus> {
        self.fetches.lock().push(*address);

        if self.blocked.lock().contains(address) {
            self.blocked_fetches.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }

        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("connection refused".to_string()).into());
        }

        if self.garble_polls.load(Ordering::SeqCst) {
            return Err(ProtocolError::Decode("not json".to_string()).into());
        }

        Ok(self
            .states
            .lock()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_command(
        &self,
        address: &DeviceAddress,
        command: &Command,
    ) -> linkplay_api::Result<()> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(ApiError::from(TransportError::Timeout));
        }

        self.commands.lock().push((*address, *command));

        let mut states = self.states.lock();
        let state = states.entry(*address).or_default();
        match command {
            Command::SetVolume(level) => state.volume = Volume::new(*level),
            Command::SetMute(muted) => state.muted = *muted,
            Command::TogglePlayPause => state.playback = state.playback.toggled(),
            Command::TriggerPreset(_) => state.playback = PlaybackState::Playing,
            Command::GetStatus | Command::Next | Command::Previous => {}
        }
        Ok(())
    }
}

/// Discoverer fed by the test through a channel
#[derive(Default)]
pub struct ChannelDiscoverer {
    sender: Mutex<Option<mpsc::UnboundedSender<DiscoveryEvent>>>,
    starts: AtomicUsize,
}

impl ChannelDiscoverer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emit(&self, event: DiscoveryEvent) {
        let sender = self.sender.lock();
        sender
            .as_ref()
            .expect("discovery not started")
            .send(event)
            .expect("discovery stream dropped");
    }

    /// Emit a fatal error and end the stream, like a failed watcher
    pub fn fail(&self, cause: linkplay_discovery::DiscoveryError) {
        self.emit(DiscoveryEvent::Error { cause });
        self.sender.lock().take();
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl Discoverer for ChannelDiscoverer {
    fn start(&self) -> DiscoveryStream {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock() = Some(tx);
        self.starts.fetch_add(1, Ordering::SeqCst);
        DiscoveryStream::from_receiver(rx)
    }

    fn stop(&self) {
        self.sender.lock().take();
    }
}

pub fn test_config() -> FleetConfig {
    FleetConfig::default().with_poll_interval(Duration::from_millis(50))
}

pub fn coordinator(
    devices: &Arc<SimulatedDevices>,
    discoverer: &Arc<ChannelDiscoverer>,
) -> FleetCoordinator {
    FleetCoordinator::with_components(test_config(), devices.clone(), discoverer.clone()).unwrap()
}

/// Wait until a published snapshot satisfies `predicate`
pub async fn wait_for(
    fleet: &FleetCoordinator,
    what: &str,
    mut predicate: impl FnMut(&FleetSnapshot) -> bool,
) -> Arc<FleetSnapshot> {
    let mut updates = fleet.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let snapshot = updates.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
            updates.changed().await.expect("registry dropped");
        }
    })
    .await;

    waited.unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}

/// Wait until `condition` holds, checking every few milliseconds
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(3), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    if waited.is_err() {
        panic!("timed out waiting for {}", what);
    }
}
