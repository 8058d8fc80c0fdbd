//! Discovery service lifecycle
//!
//! [`DiscoveryService`] owns one mDNS daemon while running and fans the
//! browse results for every configured service type into a single
//! [`DiscoveryStream`].

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use mdns_sd::ServiceDaemon;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::mdns::forward_events;
use crate::stream::DiscoveryStream;
use crate::DiscoveryEvent;

/// Source of discovery events.
///
/// Implemented by [`DiscoveryService`]; consumers depend on the trait so the
/// network watcher can be swapped out.
pub trait Discoverer: Send + Sync {
    /// Start watching and return the event stream. Calling `start` while
    /// already running restarts the watcher; the previous stream ends.
    fn start(&self) -> DiscoveryStream;

    /// Stop watching and release all watcher resources. Idempotent.
    fn stop(&self);
}

/// Everything held while a watch is running
struct ActiveWatch {
    daemon: ServiceDaemon,
    browsing: Vec<String>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// mDNS-backed discoverer.
///
/// `start()` spawns Tokio tasks and must be called from within a runtime.
pub struct DiscoveryService {
    config: DiscoveryConfig,
    active: Mutex<Option<ActiveWatch>>,
}

impl DiscoveryService {
    /// Create a discovery service browsing for LinkPlay devices
    pub fn new() -> Self {
        Self::with_config(DiscoveryConfig::default())
    }

    pub fn with_config(config: DiscoveryConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Whether a watch is currently running
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|active| !active.cancel.is_cancelled())
            .unwrap_or(false)
    }

    fn failed(cause: DiscoveryError) -> DiscoveryStream {
        warn!("Discovery could not start: {}", cause);
        DiscoveryStream::single(DiscoveryEvent::Error { cause })
    }
}

impl Default for DiscoveryService {
    fn default() -> Self {
        Self::new()
    }
}

impl Discoverer for DiscoveryService {
    fn start(&self) -> DiscoveryStream {
        self.stop();

        if let Err(e) = self.config.validate() {
            return Self::failed(e);
        }

        let daemon = match ServiceDaemon::new() {
            Ok(daemon) => daemon,
            Err(e) => return Self::failed(DiscoveryError::WatcherFailed(e.to_string())),
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let failed = Arc::new(AtomicBool::new(false));
        let mut browsing = Vec::new();
        let mut tasks = Vec::new();

        for service_type in &self.config.service_types {
            match daemon.browse(&service_type.service_type) {
                Ok(events) => {
                    browsing.push(service_type.service_type.clone());
                    tasks.push(tokio::spawn(forward_events(
                        events,
                        service_type.clone(),
                        self.config.prefer_ipv4,
                        sender.clone(),
                        cancel.clone(),
                        Arc::clone(&failed),
                    )));
                }
                Err(e) => {
                    // Other service types keep working without this one
                    warn!(
                        "{}",
                        DiscoveryError::Browse {
                            service_type: service_type.service_type.clone(),
                            reason: e.to_string(),
                        }
                    );
                }
            }
        }
        drop(sender);

        if tasks.is_empty() {
            if let Err(e) = daemon.shutdown() {
                debug!("mDNS daemon shutdown failed: {}", e);
            }
            return Self::failed(DiscoveryError::WatcherFailed(
                "no service type could be browsed".to_string(),
            ));
        }

        info!("Discovery started for {} service type(s)", browsing.len());

        *self.active.lock() = Some(ActiveWatch {
            daemon,
            browsing,
            cancel,
            tasks,
        });

        DiscoveryStream::from_receiver(receiver)
    }

    fn stop(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };

        active.cancel.cancel();

        for service_type in &active.browsing {
            if let Err(e) = active.daemon.stop_browse(service_type) {
                debug!("stop_browse({}) failed: {}", service_type, e);
            }
        }

        if let Err(e) = active.daemon.shutdown() {
            debug!("mDNS daemon shutdown failed: {}", e);
        }

        for task in active.tasks {
            task.abort();
        }

        info!("Discovery stopped");
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.stop();
    }
}
