//! Top-level command routing

use log::{debug, info};
use obdsim_telemetry::VehicleTelemetryState;
use std::time::Duration;

use crate::at;
use crate::command::normalize;
use crate::config::AdapterConfig;
use crate::pid;
use crate::UNKNOWN_COMMAND;

/// How long a real ELM327 takes to come back from `ATZ`
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(1500);

/// Session boundaries reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A client connected; adapter settings go back to defaults
    Started { origin: String },
    /// The client went away; nothing is held per session
    Ended { origin: String },
}

/// Routes commands to the AT interpreter or the OBD responder.
///
/// Owns the single [`AdapterConfig`]. Every input produces some text; there
/// is no error path.
#[derive(Debug, Clone)]
pub struct ProtocolDispatcher {
    config: AdapterConfig,
    last_command: String,
    reset_delay: Duration,
}

impl Default for ProtocolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDispatcher {
    pub fn new() -> Self {
        Self::with_reset_delay(DEFAULT_RESET_DELAY)
    }

    /// Dispatcher whose `ATZ` blocks for `reset_delay` instead of the default.
    pub fn with_reset_delay(reset_delay: Duration) -> Self {
        Self {
            config: AdapterConfig::default(),
            last_command: String::new(),
            reset_delay,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Most recent normalized command, for diagnostics only
    pub fn last_command(&self) -> &str {
        &self.last_command
    }

    /// Answer one command line.
    ///
    /// Returns only the response body; see [`crate::framing`] for what a
    /// transport adds around it.
    pub fn dispatch(&mut self, raw: &str, telemetry: &VehicleTelemetryState) -> String {
        let cmd = normalize(raw);
        debug!("Dispatch {raw:?} -> {cmd:?}");
        self.last_command.clone_from(&cmd);

        if cmd.starts_with("AT") {
            let transition = at::interpret(&self.config, &cmd);
            self.config = transition.config;
            if transition.device_reset {
                info!("Adapter reset (ATZ), settings restored to defaults");
                if !self.reset_delay.is_zero() {
                    std::thread::sleep(self.reset_delay);
                }
            }
            return transition.response;
        }

        if cmd.len() >= 4 {
            return pid::respond(&cmd[0..2], &cmd[2..4], telemetry).render(self.config.spaces_on);
        }

        UNKNOWN_COMMAND.to_string()
    }

    /// React to a transport connecting or disconnecting.
    pub fn session_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { origin } => {
                info!("Session started on {origin}, settings reset to defaults");
                self.config = AdapterConfig::default();
            }
            SessionEvent::Ended { origin } => {
                info!("Session ended on {origin}");
            }
        }
    }
}
