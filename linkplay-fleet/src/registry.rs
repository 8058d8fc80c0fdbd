//! Device registry
//!
//! Single source of truth for fleet state. Every mutation republishes a
//! [`FleetSnapshot`] on a watch channel while the write lock is still held,
//! so subscribers never observe snapshots out of order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use linkplay_api::DeviceStatus;
use linkplay_discovery::{DeviceAddress, Vendor};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};

use crate::model::{Device, DeviceId, FleetSnapshot};

/// Serializes network exchanges against one device
pub(crate) type DeviceGate = Arc<Mutex<()>>;

/// Generation carried by entries that have no polling loop
pub(crate) const NO_GENERATION: u64 = 0;

struct Entry {
    device: Device,
    /// Generation of the polling loop allowed to write this entry
    generation: u64,
    gate: DeviceGate,
}

#[derive(Default)]
struct State {
    entries: HashMap<DeviceId, Entry>,
    scanning: bool,
    last_error: Option<String>,
}

impl State {
    fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot::new(
            self.entries.values().map(|e| e.device.clone()).collect(),
            self.scanning,
            self.last_error.clone(),
        )
    }
}

/// How a `DeviceFound` relates to what the registry already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reconcile {
    /// Unknown identity
    New,
    /// Same endpoint and still online; nothing to do
    Unchanged,
    /// Same endpoint, but the device had been lost
    Rediscovered,
    /// Known identity at a different endpoint or vendor. The last polled
    /// status is kept until the new endpoint's first poll replaces it.
    Moved,
}

pub(crate) struct Registry {
    state: RwLock<State>,
    snapshots: watch::Sender<Arc<FleetSnapshot>>,
}

impl Registry {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Arc::new(FleetSnapshot::default()));
        Self {
            state: RwLock::new(State::default()),
            snapshots,
        }
    }

    /// Apply a mutation and publish the result.
    fn mutate<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.write();
        let result = f(&mut state);
        self.snapshots.send_replace(Arc::new(state.snapshot()));
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FleetSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn device(&self, id: &DeviceId) -> Option<Device> {
        self.state.read().entries.get(id).map(|e| e.device.clone())
    }

    pub fn devices(&self) -> Vec<Device> {
        self.snapshot().devices.clone()
    }

    pub fn gate(&self, id: &DeviceId) -> Option<DeviceGate> {
        self.state.read().entries.get(id).map(|e| Arc::clone(&e.gate))
    }

    pub fn is_scanning(&self) -> bool {
        self.state.read().scanning
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn classify(&self, id: &DeviceId, address: &DeviceAddress, vendor: Vendor) -> Reconcile {
        match self.state.read().entries.get(id) {
            None => Reconcile::New,
            Some(entry)
                if entry.device.address != *address || entry.device.vendor != vendor =>
            {
                Reconcile::Moved
            }
            Some(entry) if entry.device.online => Reconcile::Unchanged,
            Some(_) => Reconcile::Rediscovered,
        }
    }

    /// Insert a new device, or bring a known one back online at `address`.
    ///
    /// Status of a known device is kept until the next poll replaces it.
    pub fn upsert_found(&self, id: &DeviceId, address: DeviceAddress, vendor: Vendor) {
        self.mutate(|state| match state.entries.get_mut(id) {
            Some(entry) => {
                entry.device.address = address;
                entry.device.vendor = vendor;
                entry.device.online = true;
                entry.generation = NO_GENERATION;
            }
            None => {
                state.entries.insert(
                    id.clone(),
                    Entry {
                        device: Device::discovered(id.clone(), address, vendor),
                        generation: NO_GENERATION,
                        gate: Arc::new(Mutex::new(())),
                    },
                );
            }
        })
    }

    /// Hand write access to the polling loop with `generation`.
    pub fn set_generation(&self, id: &DeviceId, generation: u64) {
        if let Some(entry) = self.state.write().entries.get_mut(id) {
            entry.generation = generation;
        }
    }

    /// Mark offline and revoke poll write access. Returns false for an
    /// unknown identity.
    pub fn mark_lost(&self, id: &DeviceId) -> bool {
        self.mutate(|state| match state.entries.get_mut(id) {
            Some(entry) => {
                entry.device.online = false;
                entry.generation = NO_GENERATION;
                true
            }
            None => false,
        })
    }

    /// Store a polled status if `generation` still owns the entry.
    pub fn apply_poll(&self, id: &DeviceId, generation: u64, status: DeviceStatus) -> bool {
        let mut state = self.state.write();
        let accepted = match state.entries.get_mut(id) {
            Some(entry) if generation != NO_GENERATION && entry.generation == generation => {
                entry.device.status = status;
                entry.device.online = true;
                entry.device.last_seen = Some(Utc::now());
                true
            }
            _ => false,
        };

        if accepted {
            self.snapshots.send_replace(Arc::new(state.snapshot()));
        }
        accepted
    }

    /// Replace the status after a successful command.
    pub fn apply_command(&self, id: &DeviceId, status: DeviceStatus) {
        self.mutate(|state| {
            if let Some(entry) = state.entries.get_mut(id) {
                entry.device.status = status;
            }
        })
    }

    pub fn set_scanning(&self, scanning: bool) {
        self.mutate(|state| state.scanning = scanning)
    }

    pub fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.mutate(|state| state.last_error = Some(error))
    }

    pub fn clear_error(&self) {
        self.mutate(|state| state.last_error = None)
    }

    /// Drop every device and the last error.
    pub fn clear(&self) {
        self.mutate(|state| {
            state.entries.clear();
            state.last_error = None;
        })
    }
}
