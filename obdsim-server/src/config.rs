use log::{debug, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ServerError;

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

/// One transport endpoint. Every listener serves the same adapter persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Session name shown in logs (what a Bluetooth device would advertise)
    pub name: String,
    /// Socket address to listen on
    pub address: String,
}

impl ListenerConfig {
    /// Parse `NAME=ADDRESS`, as given to `--listen`.
    pub fn parse(arg: &str) -> Result<Self, String> {
        match arg.split_once('=') {
            Some((name, address)) if !name.is_empty() && !address.is_empty() => Ok(Self {
                name: name.to_string(),
                address: address.to_string(),
            }),
            _ => Err(format!("expected NAME=ADDRESS, got {arg:?}")),
        }
    }
}

fn default_listeners() -> Vec<ListenerConfig> {
    vec![
        ListenerConfig {
            name: "OBD2_Simulator_Dual".to_string(),
            address: "0.0.0.0:35000".to_string(),
        },
        ListenerConfig {
            name: "OBD2_Simulator_BLE".to_string(),
            address: "0.0.0.0:35001".to_string(),
        },
    ]
}

const fn default_reset_delay_ms() -> u64 {
    1500
}

const fn default_status_interval_ms() -> u64 {
    5000
}

const fn default_tick_ms() -> u64 {
    100
}

/// Longest `ATZ` delay accepted; anything above stalls every transport for too long
pub const MAX_RESET_DELAY_MS: u64 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub log_level: LogLevel,
    /// Simulated device reset time for `ATZ` (ms)
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,
    /// How often the ticker thread polls the simulator (ms). Telemetry itself
    /// always steps in fixed 100 ms ticks; longer polls catch up in bursts.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Telemetry status dump interval at debug level (ms), 0 disables
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listeners: default_listeners(),
            log_level: LogLevel::default(),
            reset_delay_ms: default_reset_delay_ms(),
            tick_ms: default_tick_ms(),
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

impl Config {
    /// Clamp values to valid ranges and fix invalid values
    pub fn validate(&mut self) {
        if self.reset_delay_ms > MAX_RESET_DELAY_MS {
            warn!("Clamping reset_delay_ms from {} to {}", self.reset_delay_ms, MAX_RESET_DELAY_MS);
            self.reset_delay_ms = MAX_RESET_DELAY_MS;
        }
        if self.tick_ms == 0 {
            warn!("tick_ms is 0, resetting to default");
            self.tick_ms = default_tick_ms();
        }
        if self.listeners.is_empty() {
            warn!("No listeners configured, using defaults");
            self.listeners = default_listeners();
        }
        let defaults = default_listeners();
        for (i, listener) in self.listeners.iter_mut().enumerate() {
            if listener.name.is_empty() {
                let name = defaults
                    .get(i)
                    .map_or_else(|| format!("listener-{i}"), |d| d.name.clone());
                warn!("Listener {i} has no name, using {name}");
                listener.name = name;
            }
        }
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval_ms > 0).then(|| Duration::from_millis(self.status_interval_ms))
    }

    pub fn from_json(json: &str) -> Result<Self, ServerError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.validate();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ServerError> {
        debug!("Loading config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
