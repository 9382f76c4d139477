//! Adapter settings changed by AT commands

use std::fmt;

/// OBD protocol selected with `ATSP`, reported by `ATDPN`.
///
/// ELM327 protocol numbers are a single hex digit (1-C). An `A` prefix marks
/// automatic search starting from that protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolId {
    code: u8,
    automatic: bool,
}

impl ProtocolId {
    /// ISO 15765-4 CAN, 11 bit ID, 500 kbaud
    pub const DEFAULT: Self = Self {
        code: 6,
        automatic: false,
    };

    const MAX_CODE: u8 = 0xC;

    /// Parse the argument of an `ATSP` command.
    ///
    /// `0` (automatic) always resolves to [`ProtocolId::DEFAULT`], since the
    /// simulated vehicle only ever speaks that protocol.
    #[must_use]
    pub fn parse(arg: &str) -> Option<Self> {
        let (automatic, digit) = match arg.strip_prefix('A') {
            Some(rest) => (true, rest),
            None => (false, arg),
        };
        if digit.len() != 1 {
            return None;
        }
        let code = u8::from_str_radix(digit, 16).ok()?;
        match code {
            0 => Some(Self::DEFAULT),
            1..=Self::MAX_CODE => Some(Self { code, automatic }),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self.code
    }

    #[must_use]
    pub const fn is_automatic(self) -> bool {
        self.automatic
    }
}

impl Default for ProtocolId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.automatic {
            write!(f, "A{:X}", self.code)
        } else {
            write!(f, "{:X}", self.code)
        }
    }
}

/// Adapter settings (the "ELM state").
///
/// One instance backs the whole adapter persona, whichever transport a
/// client arrives on.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)] // These are independent ELM327 protocol flags
pub struct AdapterConfig {
    /// Echo received commands back (ATE0/ATE1)
    pub echo_on: bool,
    /// Show header bytes in responses (ATH0/ATH1)
    pub headers_on: bool,
    /// Print spaces between response bytes (ATS0/ATS1)
    pub spaces_on: bool,
    /// Add linefeeds after carriage returns (ATL0/ATL1)
    pub linefeeds_on: bool,
    pub protocol: ProtocolId,
    /// Adaptive response timing (ATAL, ATAT0-2)
    pub adaptive_timing: bool,
    /// Response timeout in units of 4 ms (ATST)
    pub timeout_units: u32,
}

pub const DEFAULT_TIMEOUT_UNITS: u32 = 200;

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            echo_on: true,
            headers_on: false,
            spaces_on: true,
            linefeeds_on: true,
            protocol: ProtocolId::DEFAULT,
            adaptive_timing: true,
            timeout_units: DEFAULT_TIMEOUT_UNITS,
        }
    }
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line ending based on current settings
    pub fn line_ending(&self) -> &'static str {
        if self.linefeeds_on {
            "\r\n"
        } else {
            "\r"
        }
    }
}
