//! ELM327 protocol emulation for OBD2 diagnostic clients
//!
//! This library answers ELM327 text commands the way a real adapter plugged
//! into a running car would. It never touches a vehicle bus: Mode 01 data is
//! generated from the simulated state in `obdsim_telemetry`.
//!
//! The library has no I/O of its own. A transport (TCP, serial, Bluetooth)
//! hands each command line to [`Simulator::handle`] or
//! [`ProtocolDispatcher::dispatch`] and writes the returned body back using
//! the conventions in [`framing`].

pub mod at;
pub mod command;
pub mod config;
pub mod decode;
pub mod dispatcher;
pub mod format;
pub mod framing;
pub mod pid;
pub mod simulator;

pub use command::{normalize, CommandRequest};
pub use config::{AdapterConfig, ProtocolId};
pub use decode::{extract_rpm_from_response, parse_mode01, PidReading};
pub use dispatcher::{ProtocolDispatcher, SessionEvent};
pub use format::format_response;
pub use simulator::Simulator;

/// Identification string returned by `ATZ` and `ATI`
pub const IDENTIFICATION: &str = "ELM327 v1.5";

/// Body returned for any OBD request the vehicle cannot answer
pub const NO_DATA: &str = "NO DATA";

/// Body returned for input that is neither an AT command nor an OBD request
pub const UNKNOWN_COMMAND: &str = "?";
