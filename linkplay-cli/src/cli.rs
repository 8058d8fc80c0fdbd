//! Clap derive structures for the `linkplay` CLI

use std::net::IpAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use linkplay_api::ClientConfig;
use linkplay_discovery::DeviceAddress;
use linkplay_fleet::logging::LoggingMode;
use linkplay_fleet::FleetConfig;

/// linkplay -- discover and control WiiM / LinkPlay amplifiers
#[derive(Debug, Parser)]
#[command(
    name = "linkplay",
    version,
    about = "Discover and control LinkPlay amplifiers on the local network",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Log output
    #[arg(long, env = "LINKPLAY_LOG_MODE", default_value = "silent", global = true)]
    pub log_mode: LogMode,

    /// Seconds between status polls of each device
    #[arg(long, env = "LINKPLAY_POLL_INTERVAL", default_value_t = 4, global = true)]
    pub poll_interval: u64,

    /// Request timeout in seconds
    #[arg(long, env = "LINKPLAY_TIMEOUT", default_value_t = 5, global = true)]
    pub timeout: u64,
}

impl GlobalOpts {
    pub fn client_config(&self) -> ClientConfig {
        let request = Duration::from_secs(self.timeout);
        ClientConfig::with_timeouts(request, request + Duration::from_secs(1))
    }

    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            poll_interval: Duration::from_secs(self.poll_interval),
            client: self.client_config(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogMode {
    /// No log output
    Silent,
    /// Compact logs on stderr
    Development,
    /// Verbose logs with source locations
    Debug,
}

impl From<LogMode> for LoggingMode {
    fn from(mode: LogMode) -> Self {
        match mode {
            LogMode::Silent => LoggingMode::Silent,
            LogMode::Development => LoggingMode::Development,
            LogMode::Debug => LoggingMode::Debug,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print discovery events as devices come and go
    Discover(WatchArgs),

    /// Track the whole fleet and print it on every change
    Watch(WatchArgs),

    /// Show the status of one device
    Status {
        #[command(flatten)]
        target: Target,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Set the volume (0-100; out-of-range values are clamped)
    #[command(alias = "vol")]
    Volume {
        #[command(flatten)]
        target: Target,

        #[arg(allow_negative_numbers = true)]
        level: i32,
    },

    /// Mute or unmute
    Mute {
        #[command(flatten)]
        target: Target,

        state: Switch,
    },

    /// Toggle between playing and paused
    PlayPause {
        #[command(flatten)]
        target: Target,
    },

    /// Play a preset slot (1-based)
    Preset {
        #[command(flatten)]
        target: Target,

        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        index: u32,
    },

    /// Skip to the next track
    Next {
        #[command(flatten)]
        target: Target,
    },

    /// Go back to the previous track
    #[command(alias = "prev")]
    Previous {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub seconds: Option<u64>,
}

#[derive(Debug, Args)]
pub struct Target {
    /// Device IP address
    pub ip: IpAddr,

    /// HTTP port of the device API
    #[arg(long, default_value_t = 80)]
    pub port: u16,
}

impl Target {
    pub fn address(&self) -> DeviceAddress {
        DeviceAddress::new(self.ip, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}
