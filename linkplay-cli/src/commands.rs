//! Subcommand implementations

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use linkplay_api::{Command as DeviceCommand, DeviceClient, DeviceStatus, DeviceTransport};
use linkplay_discovery::{DeviceAddress, Discoverer, DiscoveryEvent, DiscoveryService};
use linkplay_fleet::{FleetCoordinator, FleetSnapshot};
use tracing::debug;

use crate::cli::{Cli, Command, GlobalOpts, Switch, Target, WatchArgs};

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Discover(args) => discover(&cli.global, args).await,
        Command::Watch(args) => watch(&cli.global, args).await,
        Command::Status { target, json } => status(&cli.global, &target, json).await,
        Command::Volume { target, level } => {
            send(&cli.global, &target, DeviceCommand::SetVolume(level)).await
        }
        Command::Mute { target, state } => {
            send(&cli.global, &target, DeviceCommand::SetMute(state == Switch::On)).await
        }
        Command::PlayPause { target } => {
            send(&cli.global, &target, DeviceCommand::TogglePlayPause).await
        }
        Command::Preset { target, index } => {
            let slot = NonZeroU32::new(index).context("preset slots start at 1")?;
            send(&cli.global, &target, DeviceCommand::TriggerPreset(slot)).await
        }
        Command::Next { target } => send(&cli.global, &target, DeviceCommand::Next).await,
        Command::Previous { target } => send(&cli.global, &target, DeviceCommand::Previous).await,
    }
}

/// Resolve when the time limit passes or Ctrl-C is pressed
async fn until_done(seconds: Option<u64>) {
    match seconds {
        Some(seconds) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

async fn discover(global: &GlobalOpts, args: WatchArgs) -> Result<()> {
    let service = DiscoveryService::with_config(global.fleet_config().discovery);
    let mut events = service.start();

    let print_events = async {
        while let Some(event) = events.recv().await {
            match event {
                DiscoveryEvent::DeviceFound {
                    name,
                    address,
                    vendor,
                } => println!("+ {:<24} {:<22} {}", name, address.to_string(), vendor),
                DiscoveryEvent::DeviceLost { name } => println!("- {}", name),
                DiscoveryEvent::Error { cause } => eprintln!("! discovery failed: {}", cause),
            }
        }
    };

    tokio::select! {
        _ = print_events => {}
        _ = until_done(args.seconds) => {}
    }

    service.stop();
    Ok(())
}

async fn watch(global: &GlobalOpts, args: WatchArgs) -> Result<()> {
    let fleet = FleetCoordinator::new(global.fleet_config())?;
    let mut updates = fleet.subscribe();
    fleet.start_discovery().await;

    let print_updates = async {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            print_fleet(&snapshot);
        }
    };

    tokio::select! {
        _ = print_updates => {}
        _ = until_done(args.seconds) => {}
    }

    fleet.stop_discovery().await;
    Ok(())
}

async fn status(global: &GlobalOpts, target: &Target, json: bool) -> Result<()> {
    let client = DeviceClient::with_config(global.client_config())?;
    let address = target.address();
    let status = client
        .fetch_status(&address)
        .await
        .with_context(|| format!("failed to read status from {}", address))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&address, &status);
    }
    Ok(())
}

async fn send(global: &GlobalOpts, target: &Target, command: DeviceCommand) -> Result<()> {
    let client = DeviceClient::with_config(global.client_config())?;
    let address = target.address();
    debug!(%address, command = command.name(), "Sending");

    client
        .send_command(&address, &command)
        .await
        .with_context(|| format!("{} failed on {}", command.name(), address))?;

    println!("ok");
    Ok(())
}

fn print_status(address: &DeviceAddress, status: &DeviceStatus) {
    let (source, icon) = status.source.display();
    println!("Device:   {}", address);
    println!("Source:   {} ({})", source, icon);
    println!("State:    {:?}", status.playback);
    println!(
        "Volume:   {}{}",
        status.volume,
        if status.muted { " (muted)" } else { "" }
    );
    if let Some(now_playing) = status.now_playing() {
        println!("Playing:  {}", now_playing);
    }
    if let Some(album) = &status.album {
        println!("Album:    {}", album);
    }
}

fn print_fleet(snapshot: &FleetSnapshot) {
    println!(
        "--- {} device(s){}",
        snapshot.len(),
        if snapshot.scanning { ", scanning" } else { "" }
    );

    for device in &snapshot.devices {
        let status = &device.status;
        println!(
            "{:<20} {:<22} {:<8} {:<10} {:<8} {:>3}{} {}",
            device.name(),
            device.address.to_string(),
            if device.online { "online" } else { "offline" },
            status.source.display_name(),
            format!("{:?}", status.playback),
            status.volume.get(),
            if status.muted { "M" } else { " " },
            status.now_playing().unwrap_or_default(),
        );
    }

    if let Some(error) = &snapshot.last_error {
        println!("last error: {}", error);
    }
}
