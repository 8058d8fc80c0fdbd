//! mDNS / DNS-SD browsing
//!
//! Turns raw `mdns-sd` service events into [`DiscoveryEvent`]s. The daemon
//! performs SRV/A/AAAA resolution itself; an announcement is only forwarded
//! once it has been resolved to at least one address.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mdns_sd::{Receiver, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ServiceType;
use crate::error::DiscoveryError;
use crate::{DeviceAddress, DiscoveryEvent};

/// Extract the instance name from a DNS-SD full name.
///
/// `"Lobby._linkplay._tcp.local."` with service type
/// `"_linkplay._tcp.local."` yields `"Lobby"`. Names that do not carry the
/// expected suffix are returned unchanged so found/lost events still agree.
pub fn instance_name(fullname: &str, service_type: &str) -> String {
    fullname
        .strip_suffix(service_type)
        .map(|prefix| prefix.trim_end_matches('.'))
        .filter(|prefix| !prefix.is_empty())
        .unwrap_or(fullname)
        .to_string()
}

/// Pick the address to talk to out of everything a device resolved to.
///
/// Selection is deterministic (lowest address wins) so repeated
/// resolutions of an unchanged device produce the same endpoint.
pub fn preferred_address<'a, I>(addresses: I, prefer_ipv4: bool) -> Option<IpAddr>
where
    I: IntoIterator<Item = &'a IpAddr>,
{
    let mut all: Vec<IpAddr> = addresses.into_iter().copied().collect();
    all.sort();

    if prefer_ipv4 {
        if let Some(v4) = all.iter().find(|ip| ip.is_ipv4()) {
            return Some(*v4);
        }
    }

    all.into_iter().next()
}

/// Build a `DeviceFound` event from a resolved service, or `None` when the
/// resolution is incomplete.
pub(crate) fn found_event(
    info: &ServiceInfo,
    service_type: &ServiceType,
    prefer_ipv4: bool,
) -> Option<DiscoveryEvent> {
    let ip = preferred_address(info.get_addresses(), prefer_ipv4)?;
    let port = info.get_port();
    if port == 0 {
        return None;
    }

    Some(DiscoveryEvent::DeviceFound {
        name: instance_name(info.get_fullname(), &service_type.service_type),
        address: DeviceAddress::new(ip, port),
        vendor: service_type.vendor,
    })
}

/// Report a fatal watcher failure exactly once across all browse tasks and
/// make every other task wind down.
fn report_failure(
    sender: &mpsc::UnboundedSender<DiscoveryEvent>,
    failed: &AtomicBool,
    cancel: &CancellationToken,
    reason: String,
) {
    if !failed.swap(true, Ordering::SeqCst) {
        warn!("mDNS watcher failed: {}", reason);
        let _ = sender.send(DiscoveryEvent::Error {
            cause: DiscoveryError::WatcherFailed(reason),
        });
    }
    cancel.cancel();
}

/// Forward events for one browsed service type until cancelled or until the
/// daemon goes away.
pub(crate) async fn forward_events(
    receiver: Receiver<ServiceEvent>,
    service_type: ServiceType,
    prefer_ipv4: bool,
    sender: mpsc::UnboundedSender<DiscoveryEvent>,
    cancel: CancellationToken,
    failed: Arc<AtomicBool>,
) {
    debug!("Browsing for {}", service_type.service_type);

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = receiver.recv_async() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(e) => {
                if !cancel.is_cancelled() {
                    report_failure(&sender, &failed, &cancel, e.to_string());
                }
                break;
            }
        };

        let outgoing = match event {
            ServiceEvent::ServiceResolved(info) => {
                match found_event(&info, &service_type, prefer_ipv4) {
                    Some(found) => Some(found),
                    None => {
                        debug!("Dropping unresolved announcement {}", info.get_fullname());
                        None
                    }
                }
            }
            ServiceEvent::ServiceRemoved(_, fullname) => Some(DiscoveryEvent::DeviceLost {
                name: instance_name(&fullname, &service_type.service_type),
            }),
            ServiceEvent::SearchStopped(ty) => {
                if !cancel.is_cancelled() {
                    report_failure(
                        &sender,
                        &failed,
                        &cancel,
                        format!("search for {} stopped unexpectedly", ty),
                    );
                }
                break;
            }
            other => {
                trace!("Ignoring mDNS event {:?}", other);
                None
            }
        };

        if let Some(outgoing) = outgoing {
            debug!("Discovery event: {:?}", outgoing);
            if sender.send(outgoing).is_err() {
                // Consumer dropped the stream
                break;
            }
        }
    }

    debug!("Stopped browsing for {}", service_type.service_type);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vendor;
    use mdns_sd::ServiceDaemon;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::time::Duration;

    fn lobby_info(ip: &str, port: u16) -> ServiceInfo {
        ServiceInfo::new(
            "_linkplay._tcp.local.",
            "Lobby",
            "wiim-lobby.local.",
            ip,
            port,
            &[("model", "WiiM Pro")][..],
        )
        .unwrap()
    }

    #[rstest]
    #[case("Lobby._linkplay._tcp.local.", "Lobby")]
    #[case("Living Room._linkplay._tcp.local.", "Living Room")]
    #[case("Lobby._other._tcp.local.", "Lobby._other._tcp.local.")]
    #[case("_linkplay._tcp.local.", "_linkplay._tcp.local.")]
    fn test_instance_name(#[case] fullname: &str, #[case] expected: &str) {
        assert_eq!(instance_name(fullname, "_linkplay._tcp.local."), expected);
    }

    #[rstest]
    #[case(&["fe80::1", "192.168.1.60", "192.168.1.50"], true, Some("192.168.1.50"))]
    #[case(&["fe80::1", "192.168.1.60", "192.168.1.50"], false, Some("192.168.1.50"))]
    #[case(&["fe80::2"], true, Some("fe80::2"))]
    #[case(&["fe80::2", "fe80::1"], false, Some("fe80::1"))]
    #[case(&[], true, None)]
    fn test_preferred_address(
        #[case] addrs: &[&str],
        #[case] prefer_ipv4: bool,
        #[case] expected: Option<&str>,
    ) {
        let addrs: HashSet<IpAddr> = addrs.iter().map(|s| s.parse().unwrap()).collect();
        let expected = expected.map(|s| s.parse::<IpAddr>().unwrap());
        assert_eq!(preferred_address(&addrs, prefer_ipv4), expected);
    }

    #[test]
    fn test_found_event_from_resolved_service() {
        let info = lobby_info("192.168.1.50", 80);
        let event = found_event(&info, &ServiceType::for_vendor(Vendor::Wiim), true).unwrap();

        assert_eq!(
            event,
            DiscoveryEvent::DeviceFound {
                name: "Lobby".to_string(),
                address: DeviceAddress::new("192.168.1.50".parse().unwrap(), 80),
                vendor: Vendor::Wiim,
            }
        );
    }

    #[test]
    fn test_found_event_drops_unresolved_port() {
        let info = lobby_info("192.168.1.50", 0);
        assert!(found_event(&info, &ServiceType::for_vendor(Vendor::Wiim), true).is_none());
    }

    /// Browse Wiim and Bluesound on one daemon with shared failure state,
    /// returning the daemon, the event receiver and the forwarding tasks.
    fn browse_both(
        cancel: &CancellationToken,
    ) -> (
        ServiceDaemon,
        mpsc::UnboundedReceiver<DiscoveryEvent>,
        Vec<tokio::task::JoinHandle<()>>,
    ) {
        let daemon = ServiceDaemon::new().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let failed = Arc::new(AtomicBool::new(false));

        let tasks = [Vendor::Wiim, Vendor::Bluesound]
            .into_iter()
            .map(|vendor| {
                let service_type = ServiceType::for_vendor(vendor);
                let receiver = daemon.browse(&service_type.service_type).unwrap();
                tokio::spawn(forward_events(
                    receiver,
                    service_type,
                    true,
                    tx.clone(),
                    cancel.clone(),
                    Arc::clone(&failed),
                ))
            })
            .collect();

        (daemon, rx, tasks)
    }

    async fn drain(
        mut rx: mpsc::UnboundedReceiver<DiscoveryEvent>,
        tasks: Vec<tokio::task::JoinHandle<()>>,
    ) -> Vec<DiscoveryEvent> {
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .expect("browse task did not finish")
                .unwrap();
        }

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_daemon_failure_reports_one_error_then_ends() {
        let cancel = CancellationToken::new();
        let (daemon, rx, tasks) = browse_both(&cancel);

        let _ = daemon.shutdown();
        let events = drain(rx, tasks).await;

        assert_eq!(events.len(), 1, "unexpected events: {:?}", events);
        assert!(matches!(
            &events[0],
            DiscoveryEvent::Error {
                cause: DiscoveryError::WatcherFailed(_)
            }
        ));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_browse_ends_without_error() {
        let cancel = CancellationToken::new();
        let (daemon, rx, tasks) = browse_both(&cancel);

        cancel.cancel();
        let _ = daemon.shutdown();
        let events = drain(rx, tasks).await;

        assert!(
            events
                .iter()
                .all(|e| !matches!(e, DiscoveryEvent::Error { .. })),
            "unexpected events: {:?}",
            events
        );
    }
}
