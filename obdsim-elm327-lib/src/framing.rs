//! Wire framing owed by transports
//!
//! The core only produces response bodies. Whatever carries them to the
//! client has to wrap each body the way an ELM327 does: optional echo of the
//! command, the body, blank line, then the `>` prompt. A transport must also
//! send a bare prompt as soon as a client connects.

use crate::config::AdapterConfig;

/// Prompt that tells the client the adapter is ready for the next command
pub const PROMPT: &str = ">";

/// What a transport sends first on a new session.
#[must_use]
pub const fn session_prompt() -> &'static str {
    PROMPT
}

/// Wrap a response body for the wire.
///
/// `config` must be the settings in force *after* the command ran, so that
/// `ATE0` is not echoed and `ATL0` already ends with a bare carriage return.
#[must_use]
pub fn frame_response(raw_command: &str, body: &str, config: &AdapterConfig) -> String {
    let le = config.line_ending();
    let mut out = String::with_capacity(raw_command.len() + body.len() + 8);

    if config.echo_on {
        out.push_str(raw_command.trim_end_matches(['\r', '\n']));
        out.push('\r');
    }
    out.push_str(body);
    out.push_str(le);
    out.push_str(le);
    out.push_str(PROMPT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_and_linefeeds() {
        let config = AdapterConfig::default();
        assert_eq!(
            frame_response("010C", "41 0C 1A F8", &config),
            "010C\r41 0C 1A F8\r\n\r\n>"
        );
    }

    #[test]
    fn test_echo_strips_terminator() {
        let config = AdapterConfig::default();
        assert_eq!(frame_response("ATI\r", "ELM327 v1.5", &config), "ATI\rELM327 v1.5\r\n\r\n>");
    }

    #[test]
    fn test_no_echo_no_linefeeds() {
        let config = AdapterConfig {
            echo_on: false,
            linefeeds_on: false,
            ..AdapterConfig::default()
        };
        assert_eq!(frame_response("010C", "410C1AF8", &config), "410C1AF8\r\r>");
    }

    #[test]
    fn test_session_prompt() {
        assert_eq!(session_prompt(), ">");
    }
}
