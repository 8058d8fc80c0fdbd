//! Coordinator behavior under discovery, polling and command traffic

mod support;

use std::time::Duration;

use linkplay_api::{ApiError, Command};
use linkplay_discovery::DiscoveryError;
use linkplay_fleet::{DeviceStatus, FleetError, PlaybackState, Source, Vendor, Volume};
use rstest::rstest;

use support::*;

#[tokio::test]
async fn test_device_found_starts_polling() {
    let devices = SimulatedDevices::new();
    devices.set_state(
        addr(50),
        DeviceStatus {
            volume: Volume::new(65),
            playback: PlaybackState::Playing,
            ..Default::default()
        },
    );
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);

    fleet.start_discovery().await;
    assert!(fleet.is_scanning());
    discoverer.emit(found("Lobby", addr(50)));

    let snapshot = wait_for(&fleet, "first poll", |s| {
        s.device("Lobby").is_some_and(|d| d.last_seen.is_some())
    })
    .await;

    let lobby = snapshot.device("Lobby").unwrap();
    assert!(lobby.online);
    assert_eq!(lobby.address, addr(50));
    assert_eq!(lobby.status.volume.get(), 65);
    assert_eq!(lobby.status.playback, PlaybackState::Playing);

    let stats = fleet.polling_stats().await;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].device.as_str(), "Lobby");
}

#[tokio::test]
async fn test_duplicate_found_does_not_restart_polling() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;
    let generation = fleet.polling_stats().await[0].generation;

    discoverer.emit(found("Lobby", addr(50)));
    // Events are applied in order; once Patio is in, the duplicate was handled
    discoverer.emit(found("Patio", addr(51)));
    wait_for(&fleet, "Patio", |s| s.device("Patio").is_some()).await;

    assert_eq!(fleet.devices().len(), 2);
    let stats = fleet.polling_stats().await;
    assert_eq!(stats.len(), 2);
    let lobby = stats.iter().find(|s| s.device.as_str() == "Lobby").unwrap();
    assert_eq!(lobby.generation, generation);
}

#[tokio::test]
async fn test_address_change_moves_polling() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(found("Lobby", addr(50)));
    eventually("poll of old address", || devices.fetches().contains(&addr(50))).await;

    discoverer.emit(found("Lobby", addr(77)));
    wait_for(&fleet, "new address", |s| {
        s.device("Lobby").is_some_and(|d| d.address == addr(77))
    })
    .await;

    let seen = devices.fetches().len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let later = &devices.fetches()[seen..];

    assert!(!later.is_empty());
    assert!(later.iter().all(|a| *a == addr(77)), "stale polls: {:?}", later);
    assert_eq!(fleet.devices().len(), 1);
    assert_eq!(fleet.polling_stats().await.len(), 1);
}

#[tokio::test]
async fn test_lost_during_inflight_poll_ends_offline() {
    let devices = SimulatedDevices::new();
    devices.block(addr(50));
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(found("Lobby", addr(50)));
    eventually("in-flight poll", || devices.blocked_fetches() > 0).await;

    discoverer.emit(lost("Lobby"));
    wait_for(&fleet, "Lobby offline", |s| {
        s.device("Lobby").is_some_and(|d| !d.online)
    })
    .await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    let lobby = fleet.device("Lobby").unwrap();
    assert!(!lobby.online);
    assert!(fleet.polling_stats().await.is_empty());
}

#[tokio::test]
async fn test_rediscovery_restarts_polling() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;
    let first = fleet.polling_stats().await[0].generation;

    discoverer.emit(lost("Lobby"));
    wait_for(&fleet, "Lobby offline", |s| {
        s.device("Lobby").is_some_and(|d| !d.online)
    })
    .await;

    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby online", |s| {
        s.device("Lobby").is_some_and(|d| d.online)
    })
    .await;

    let stats = fleet.polling_stats().await;
    assert_eq!(stats.len(), 1);
    assert!(stats[0].generation > first);
}

#[tokio::test]
async fn test_lost_unknown_device_is_ignored() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(lost("Ghost"));
    discoverer.emit(found("Lobby", addr(50)));
    let snapshot = wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.last_error, None);
}

#[tokio::test]
async fn test_poll_failure_keeps_device_online() {
    let devices = SimulatedDevices::new();
    devices
        .fail_polls
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    let mut failures = 0;
    for _ in 0..100 {
        failures = fleet.polling_stats().await[0].failure_count;
        if failures >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(failures >= 2);

    let lobby = fleet.device("Lobby").unwrap();
    assert!(lobby.online);
    assert_eq!(lobby.status, DeviceStatus::default());
    assert_eq!(lobby.last_seen, None);
}

#[tokio::test]
async fn test_undecodable_poll_keeps_last_status() {
    let devices = SimulatedDevices::new();
    let playing = DeviceStatus {
        source: Source::Spotify,
        playback: PlaybackState::Playing,
        title: Some("Hotel California".to_string()),
        volume: Volume::new(65),
        ..Default::default()
    };
    devices.set_state(addr(50), playing.clone());
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(found("Lobby", addr(50)));
    let snapshot = wait_for(&fleet, "first poll", |s| {
        s.device("Lobby").is_some_and(|d| d.last_seen.is_some())
    })
    .await;
    let first = snapshot.device("Lobby").unwrap().clone();
    assert_eq!(first.status, playing);

    devices
        .garble_polls
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let baseline = fleet.polling_stats().await[0].failure_count;
    let mut failures = baseline;
    for _ in 0..100 {
        failures = fleet.polling_stats().await[0].failure_count;
        if failures >= baseline + 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(failures >= baseline + 2);

    let lobby = fleet.device("Lobby").unwrap();
    assert!(lobby.online);
    assert_eq!(lobby.status, first.status);
    assert_eq!(lobby.last_seen, first.last_seen);
}

#[rstest]
#[case(150, 100)]
#[case(-5, 0)]
#[case(30, 30)]
#[tokio::test]
async fn test_set_volume_is_clamped(#[case] requested: i32, #[case] expected: u8) {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    fleet.set_volume(requested, "Lobby").await.unwrap();

    assert_eq!(fleet.device("Lobby").unwrap().status.volume.get(), expected);
    assert_eq!(
        devices.commands().last(),
        Some(&(addr(50), Command::SetVolume(requested)))
    );
}

#[tokio::test]
async fn test_toggle_mute_twice_restores() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    let original = fleet.device("Lobby").unwrap().status.muted;

    fleet.toggle_mute("Lobby").await.unwrap();
    assert_eq!(fleet.device("Lobby").unwrap().status.muted, !original);

    fleet.toggle_mute("Lobby").await.unwrap();
    assert_eq!(fleet.device("Lobby").unwrap().status.muted, original);

    let sent: Vec<Command> = devices.commands().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        sent,
        vec![Command::SetMute(!original), Command::SetMute(original)]
    );
}

#[tokio::test]
async fn test_play_pause_and_preset() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    let playback = || fleet.device("Lobby").unwrap().status.playback;
    assert_eq!(playback(), PlaybackState::Idle);

    fleet.toggle_play_pause("Lobby").await.unwrap();
    assert_eq!(playback(), PlaybackState::Playing);

    fleet.toggle_play_pause("Lobby").await.unwrap();
    assert_eq!(playback(), PlaybackState::Paused);

    fleet.trigger_preset(2, "Lobby").await.unwrap();
    assert_eq!(playback(), PlaybackState::Playing);

    fleet.next_track("Lobby").await.unwrap();
    fleet.previous_track("Lobby").await.unwrap();
    assert_eq!(playback(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_preset_zero_rejected() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    let err = fleet.trigger_preset(0, "Lobby").await.unwrap_err();
    assert!(matches!(err, FleetError::InvalidPreset(0)));
    assert!(devices.commands().is_empty());
    assert!(fleet.last_error().is_some());
}

#[tokio::test]
async fn test_command_failure_keeps_status_and_records_error() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    devices
        .fail_commands
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let before = fleet.device("Lobby").unwrap().status;

    let err = fleet.set_volume(10, "Lobby").await.unwrap_err();
    assert!(matches!(err, FleetError::Api(ApiError::Transport(_))));

    assert_eq!(fleet.device("Lobby").unwrap().status, before);
    let message = fleet.last_error().unwrap();
    assert!(message.contains("timed out"), "unexpected error: {}", message);

    fleet.clear_error();
    assert_eq!(fleet.last_error(), None);
}

#[tokio::test]
async fn test_command_for_unknown_device() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);

    let err = fleet.toggle_mute("Nowhere").await.unwrap_err();
    assert!(matches!(err, FleetError::DeviceNotFound(ref name) if name == "Nowhere"));
    assert_eq!(
        fleet.last_error().as_deref(),
        Some("Device not found: Nowhere")
    );
}

#[tokio::test]
async fn test_unsupported_vendor_is_tracked_not_controlled() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.emit(linkplay_fleet::DiscoveryEvent::DeviceFound {
        name: "Node".to_string(),
        address: addr(60),
        vendor: Vendor::Bluesound,
    });
    wait_for(&fleet, "Node", |s| s.device("Node").is_some()).await;

    assert!(fleet.polling_stats().await.is_empty());

    let err = fleet.set_volume(20, "Node").await.unwrap_err();
    assert!(matches!(
        err,
        FleetError::Api(ApiError::UnsupportedVendor(Vendor::Bluesound))
    ));
    assert!(devices.commands().is_empty());
    assert!(devices.fetches().is_empty());
}

#[tokio::test]
async fn test_discovery_error_is_recoverable() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    discoverer.fail(DiscoveryError::WatcherFailed("socket closed".to_string()));
    let snapshot = wait_for(&fleet, "discovery failure", |s| {
        !s.scanning && s.last_error.is_some()
    })
    .await;
    assert!(snapshot
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("socket closed")));

    fleet.start_discovery().await;
    assert!(fleet.is_scanning());
    assert_eq!(discoverer.starts(), 2);

    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;
}

#[tokio::test]
async fn test_stop_discovery_keeps_devices() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    fleet.stop_discovery().await;

    assert!(!fleet.is_scanning());
    assert!(fleet.polling_stats().await.is_empty());
    assert_eq!(fleet.devices().len(), 1);

    let polls = devices.fetches().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(devices.fetches().len(), polls);

    // Idempotent
    fleet.stop_discovery().await;
}

#[tokio::test]
async fn test_refresh_clears_registry() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    discoverer.emit(found("Patio", addr(51)));
    wait_for(&fleet, "two devices", |s| s.len() == 2).await;

    fleet.refresh().await;

    let snapshot = fleet.snapshot();
    assert!(snapshot.is_empty());
    assert!(snapshot.scanning);
    assert!(fleet.polling_stats().await.is_empty());
    assert_eq!(discoverer.starts(), 2);

    discoverer.emit(found("Patio", addr(51)));
    let snapshot = wait_for(&fleet, "Patio again", |s| s.len() == 1).await;
    assert!(snapshot.device("Patio").is_some());
}

#[tokio::test]
async fn test_start_discovery_is_idempotent() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);

    fleet.start_discovery().await;
    discoverer.emit(found("Lobby", addr(50)));
    wait_for(&fleet, "Lobby", |s| s.device("Lobby").is_some()).await;

    fleet.start_discovery().await;
    assert!(fleet.is_scanning());
    assert_eq!(fleet.devices().len(), 1);
    assert_eq!(fleet.polling_stats().await.len(), 1);
}

#[tokio::test]
async fn test_snapshot_sorted_by_name() {
    let devices = SimulatedDevices::new();
    let discoverer = ChannelDiscoverer::new();
    let fleet = coordinator(&devices, &discoverer);
    fleet.start_discovery().await;

    for (i, name) in ["patio", "Lobby", "den"].iter().enumerate() {
        discoverer.emit(found(name, addr(50 + i as u8)));
    }
    let snapshot = wait_for(&fleet, "three devices", |s| s.len() == 3).await;

    let names: Vec<&str> = snapshot.devices.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["den", "Lobby", "patio"]);
}
