//! AT command interpreter
//!
//! Each AT command is a pure transition from the current [`AdapterConfig`] to
//! a new one plus a response body. Commands are looked up in two static
//! tables: exact names first, then prefixes that take an argument. Anything
//! else starting with `AT` is accepted with `OK`, as real adapters rarely
//! reject configuration commands.

use crate::config::{AdapterConfig, ProtocolId};
use crate::IDENTIFICATION;

pub const OK: &str = "OK";

/// Reported by `ATDP`
pub const PROTOCOL_DESCRIPTION: &str = "ISO 15765-4 (CAN 11/500)";

/// Reported by `ATRV`
pub const BATTERY_VOLTAGE: &str = "12.6V";

/// Result of applying one AT command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtTransition {
    pub config: AdapterConfig,
    pub response: String,
    /// The command was a full device reset (`ATZ`)
    pub device_reset: bool,
}

enum Effect {
    /// Change a setting, answer `OK`
    Set(fn(&mut AdapterConfig)),
    /// Answer with a fixed string
    Reply(&'static str),
    /// Answer from the current settings
    Query(fn(&AdapterConfig) -> String),
    /// Restore defaults, answer with the identification string
    Reset,
}

static EXACT: &[(&str, Effect)] = &[
    ("ATZ", Effect::Reset),
    ("ATE0", Effect::Set(|c: &mut AdapterConfig| c.echo_on = false)),
    ("ATE1", Effect::Set(|c: &mut AdapterConfig| c.echo_on = true)),
    ("ATL0", Effect::Set(|c: &mut AdapterConfig| c.linefeeds_on = false)),
    ("ATL1", Effect::Set(|c: &mut AdapterConfig| c.linefeeds_on = true)),
    ("ATS0", Effect::Set(|c: &mut AdapterConfig| c.spaces_on = false)),
    ("ATS1", Effect::Set(|c: &mut AdapterConfig| c.spaces_on = true)),
    ("ATH0", Effect::Set(|c: &mut AdapterConfig| c.headers_on = false)),
    ("ATH1", Effect::Set(|c: &mut AdapterConfig| c.headers_on = true)),
    ("ATAL", Effect::Set(|c: &mut AdapterConfig| c.adaptive_timing = true)),
    ("ATAT0", Effect::Set(|c: &mut AdapterConfig| c.adaptive_timing = false)),
    ("ATAT1", Effect::Set(|c: &mut AdapterConfig| c.adaptive_timing = true)),
    ("ATAT2", Effect::Set(|c: &mut AdapterConfig| c.adaptive_timing = true)),
    ("ATDP", Effect::Reply(PROTOCOL_DESCRIPTION)),
    ("ATDPN", Effect::Query(|c: &AdapterConfig| c.protocol.to_string())),
    ("ATI", Effect::Reply(IDENTIFICATION)),
    ("ATRV", Effect::Reply(BATTERY_VOLTAGE)),
];

/// Commands whose name is followed by an argument, e.g. `ATSP6`, `ATST32`
static WITH_ARGUMENT: &[(&str, fn(&mut AdapterConfig, &str))] =
    &[("ATSP", set_protocol), ("ATST", set_timeout)];

fn set_protocol(config: &mut AdapterConfig, arg: &str) {
    // A malformed number counts as 0, which selects the default
    config.protocol = ProtocolId::parse(arg).unwrap_or(ProtocolId::DEFAULT);
}

fn set_timeout(config: &mut AdapterConfig, arg: &str) {
    config.timeout_units = arg.parse().unwrap_or(0);
}

/// Apply a normalized AT command to `config`.
///
/// `command` must already be normalized and start with `AT`; the dispatcher
/// never routes anything else here.
#[must_use]
pub fn interpret(config: &AdapterConfig, command: &str) -> AtTransition {
    let mut next = config.clone();

    if let Some((_, effect)) = EXACT.iter().find(|(name, _)| *name == command) {
        let (response, device_reset) = match effect {
            Effect::Set(apply) => {
                apply(&mut next);
                (OK.to_string(), false)
            }
            Effect::Reply(text) => ((*text).to_string(), false),
            Effect::Query(read) => (read(&next), false),
            Effect::Reset => {
                next = AdapterConfig::default();
                (IDENTIFICATION.to_string(), true)
            }
        };
        return AtTransition {
            config: next,
            response,
            device_reset,
        };
    }

    if let Some((name, apply)) = WITH_ARGUMENT
        .iter()
        .find(|(name, _)| command.starts_with(name))
    {
        apply(&mut next, &command[name.len()..]);
    }

    AtTransition {
        config: next,
        response: OK.to_string(),
        device_reset: false,
    }
}
