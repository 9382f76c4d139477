//! OBD2 service responder
//!
//! Answers `(mode, PID)` requests from a static table. Each Mode 01 entry
//! turns the current [`VehicleTelemetryState`] into a fixed-width big-endian
//! value; the response header is the mode plus `0x40` followed by the PID.

use obdsim_telemetry::VehicleTelemetryState;

use crate::format::format_response;
use crate::NO_DATA;

/// Vehicle identification number reported by Mode 09 PID 02
pub const VIN: &[u8] = b"1D4GP00B567589";

/// Where the data bytes of a response come from
#[derive(Clone, Copy)]
pub enum Payload {
    /// `width` big-endian bytes computed from the telemetry snapshot
    Live {
        width: usize,
        encode: fn(&VehicleTelemetryState) -> u32,
    },
    /// Bytes that never change
    Fixed(&'static [u8]),
    /// VIN with its leading message-count byte
    Vin,
}

/// Static description of one supported `(mode, PID)` pair.
#[derive(Clone, Copy)]
pub struct PidDescriptor {
    pub mode: u8,
    pub pid: u8,
    pub payload: Payload,
}

impl PidDescriptor {
    const fn live(pid: u8, width: usize, encode: fn(&VehicleTelemetryState) -> u32) -> Self {
        Self {
            mode: 0x01,
            pid,
            payload: Payload::Live { width, encode },
        }
    }

    const fn fixed(mode: u8, pid: u8, bytes: &'static [u8]) -> Self {
        Self {
            mode,
            pid,
            payload: Payload::Fixed(bytes),
        }
    }

    /// Number of data bytes following the two header bytes.
    #[must_use]
    pub fn width(&self) -> usize {
        match self.payload {
            Payload::Live { width, .. } => width,
            Payload::Fixed(bytes) => bytes.len(),
            Payload::Vin => VIN.len() + 1,
        }
    }

    fn data(&self, telemetry: &VehicleTelemetryState) -> Vec<u8> {
        match self.payload {
            Payload::Live { width, encode } => {
                let value = encode(telemetry).to_be_bytes();
                value[value.len() - width..].to_vec()
            }
            Payload::Fixed(bytes) => bytes.to_vec(),
            Payload::Vin => {
                let mut data = Vec::with_capacity(VIN.len() + 1);
                data.push(0x01);
                data.extend_from_slice(VIN);
                data
            }
        }
    }
}

/// Truncate to a single data byte, saturating at the byte range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn byte(value: f64) -> u32 {
    value.clamp(0.0, 255.0) as u32
}

/// Truncate to a two-byte value, saturating at the word range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn word(value: f64) -> u32 {
    value.clamp(0.0, 65535.0) as u32
}

/// Timing advance reported by PID 0E, degrees before TDC
const TIMING_ADVANCE_DEG: u32 = 10;
/// Intake air temperature reported by PID 0F, °C
const INTAKE_AIR_TEMP_C: u32 = 25;

/// Supported `(mode, PID)` pairs, sorted by key for binary search.
pub static PID_TABLE: &[PidDescriptor] = &[
    // PIDs supported 01-20
    PidDescriptor::fixed(0x01, 0x00, &[0xBE, 0x1F, 0xB8, 0x11]),
    // Calculated engine load
    PidDescriptor::live(0x04, 1, |t| byte(t.engine_load * 2.55)),
    // Coolant temperature
    PidDescriptor::live(0x05, 1, |t| byte(t.coolant_temp + 40.0)),
    // Intake manifold absolute pressure
    PidDescriptor::live(0x0B, 1, |t| byte(t.boost_pressure + 101.0)),
    PidDescriptor::live(0x0C, 2, |t| word(t.rpm * 4.0)),
    PidDescriptor::live(0x0D, 1, |t| byte(t.speed)),
    PidDescriptor::live(0x0E, 1, |_| TIMING_ADVANCE_DEG + 128),
    PidDescriptor::live(0x0F, 1, |_| INTAKE_AIR_TEMP_C + 40),
    // Mass air flow
    PidDescriptor::live(0x10, 2, |t| word(t.airflow_rate * 100.0)),
    PidDescriptor::live(0x11, 1, |t| byte(t.throttle_position * 2.55)),
    // PIDs supported 21-40
    PidDescriptor::fixed(0x01, 0x20, &[0x80, 0x00, 0x00, 0x01]),
    PidDescriptor::live(0x2F, 1, |t| byte(t.fuel_level * 2.55)),
    // PIDs supported 41-60
    PidDescriptor::fixed(0x01, 0x40, &[0x40, 0x00, 0x00, 0x00]),
    // Engine oil temperature
    PidDescriptor::live(0x5C, 1, |t| byte(t.oil_temp + 40.0)),
    // Mode 09 PIDs supported
    PidDescriptor::fixed(0x09, 0x00, &[0x54]),
    PidDescriptor {
        mode: 0x09,
        pid: 0x02,
        payload: Payload::Vin,
    },
];

/// Services answered regardless of the PID that follows the mode
static MODE_REPLIES: &[(u8, &[u8])] = &[
    // Stored DTCs: none
    (0x03, &[0x43, 0x00]),
    // Clear DTCs: acknowledged
    (0x04, &[0x44]),
];

/// Find the descriptor for a `(mode, PID)` pair.
#[must_use]
pub fn lookup(mode: u8, pid: u8) -> Option<&'static PidDescriptor> {
    PID_TABLE
        .binary_search_by_key(&(mode, pid), |d| (d.mode, d.pid))
        .ok()
        .map(|index| &PID_TABLE[index])
}

/// Render bytes as space-separated two-digit uppercase hex.
#[must_use]
pub fn render_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Body produced by [`respond`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Data frame; the `ATS` spacing setting applies
    Frame(String),
    /// Sent exactly as is, whatever the spacing setting
    Verbatim(String),
}

impl Reply {
    /// The body with spaces between bytes
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Frame(body) | Self::Verbatim(body) => body,
        }
    }

    /// The body as the adapter sends it.
    #[must_use]
    pub fn render(&self, spaces_on: bool) -> String {
        match self {
            Self::Frame(body) => format_response(body, spaces_on),
            Self::Verbatim(body) => body.clone(),
        }
    }
}

/// Answer an OBD request.
///
/// `mode` and `pid` are the first two character pairs of the normalized
/// command. Anything not in the tables, including non-hex text, gets
/// [`NO_DATA`]. Only table entries are [`Reply::Frame`]s; the Mode 03/04
/// replies keep their spaces even with spaces off.
#[must_use]
pub fn respond(mode: &str, pid: &str, telemetry: &VehicleTelemetryState) -> Reply {
    let no_data = || Reply::Verbatim(NO_DATA.to_string());
    let Ok(mode) = u8::from_str_radix(mode, 16) else {
        return no_data();
    };

    if let Some((_, reply)) = MODE_REPLIES.iter().find(|(m, _)| *m == mode) {
        return Reply::Verbatim(render_bytes(reply));
    }

    let Ok(pid) = u8::from_str_radix(pid, 16) else {
        return no_data();
    };

    match lookup(mode, pid) {
        Some(descriptor) => {
            let mut frame = vec![mode.wrapping_add(0x40), pid];
            frame.extend(descriptor.data(telemetry));
            Reply::Frame(render_bytes(&frame))
        }
        None => no_data(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry() -> VehicleTelemetryState {
        VehicleTelemetryState::default()
    }

    #[test]
    fn test_table_sorted_and_unique() {
        for pair in PID_TABLE.windows(2) {
            assert!(
                (pair[0].mode, pair[0].pid) < (pair[1].mode, pair[1].pid),
                "table out of order at {:02X}{:02X}",
                pair[1].mode,
                pair[1].pid
            );
        }
    }

    #[test]
    fn test_coolant() {
        let t = VehicleTelemetryState {
            coolant_temp: 90.0,
            ..telemetry()
        };
        assert_eq!(respond("01", "05", &t).body(), "41 05 82");
    }

    #[test]
    fn test_rpm() {
        let t = VehicleTelemetryState {
            rpm: 3000.0,
            ..telemetry()
        };
        assert_eq!(respond("01", "0C", &t).body(), "41 0C 2E E0");
    }

    #[test]
    fn test_rpm_truncates() {
        let t = VehicleTelemetryState {
            rpm: 800.99,
            ..telemetry()
        };
        // 3203.96 truncates to 3203 = 0x0C83
        assert_eq!(respond("01", "0C", &t).body(), "41 0C 0C 83");
    }

    #[test]
    fn test_live_pids() {
        let t = VehicleTelemetryState {
            speed: 42.7,
            throttle_position: 39.2,
            engine_load: 50.0,
            airflow_rate: 15.5,
            boost_pressure: 30.0,
            fuel_level: 75.0,
            oil_temp: 95.5,
            ..telemetry()
        };
        assert_eq!(respond("01", "0D", &t).body(), "41 0D 2A");
        assert_eq!(respond("01", "11", &t).body(), "41 11 63");
        assert_eq!(respond("01", "04", &t).body(), "41 04 7F");
        assert_eq!(respond("01", "10", &t).body(), "41 10 06 0E");
        assert_eq!(respond("01", "0B", &t).body(), "41 0B 83");
        assert_eq!(respond("01", "2F", &t).body(), "41 2F BF");
        assert_eq!(respond("01", "5C", &t).body(), "41 5C 87");
    }

    #[test]
    fn test_fixed_pids() {
        let t = telemetry();
        assert_eq!(respond("01", "00", &t).body(), "41 00 BE 1F B8 11");
        assert_eq!(respond("01", "20", &t).body(), "41 20 80 00 00 01");
        assert_eq!(respond("01", "40", &t).body(), "41 40 40 00 00 00");
        assert_eq!(respond("01", "0E", &t).body(), "41 0E 8A");
        assert_eq!(respond("01", "0F", &t).body(), "41 0F 41");
    }

    #[test]
    fn test_map_saturates() {
        let t = VehicleTelemetryState {
            boost_pressure: 200.0,
            ..telemetry()
        };
        assert_eq!(respond("01", "0B", &t).body(), "41 0B FF");
    }

    #[test]
    fn test_full_throttle_truncates() {
        let t = VehicleTelemetryState {
            throttle_position: 100.0,
            ..telemetry()
        };
        // 100 * 2.55 lands just below 255 in floating point
        assert_eq!(respond("01", "11", &t).body(), "41 11 FE");
    }

    #[test]
    fn test_mode_03_and_04_ignore_pid() {
        let t = telemetry();
        assert_eq!(respond("03", "09", &t).body(), "43 00");
        assert_eq!(respond("03", "ZZ", &t).body(), "43 00");
        assert_eq!(respond("04", "00", &t).body(), "44");
    }

    #[test]
    fn test_dtc_replies_keep_spaces() {
        let t = telemetry();
        assert_eq!(respond("03", "00", &t), Reply::Verbatim("43 00".to_string()));
        assert_eq!(respond("03", "00", &t).render(false), "43 00");
        assert_eq!(respond("04", "00", &t).render(false), "44");
        assert_eq!(respond("01", "0D", &t).render(false), "410D00");
        assert_eq!(respond("09", "00", &t).render(false), "490054");
        assert_eq!(respond("01", "60", &t).render(false), NO_DATA);
    }

    #[test]
    fn test_vehicle_info() {
        let t = telemetry();
        assert_eq!(respond("09", "00", &t).body(), "49 00 54");
        assert_eq!(
            respond("09", "02", &t).body(),
            "49 02 01 31 44 34 47 50 30 30 42 35 36 37 35 38 39"
        );
    }

    #[test]
    fn test_no_data() {
        let t = telemetry();
        assert_eq!(respond("01", "60", &t).body(), NO_DATA);
        assert_eq!(respond("01", "ZZ", &t).body(), NO_DATA);
        assert_eq!(respond("02", "00", &t).body(), NO_DATA);
        assert_eq!(respond("09", "04", &t).body(), NO_DATA);
        assert_eq!(respond("XY", "ZZ", &t).body(), NO_DATA);
    }

    #[test]
    fn test_width_matches_rendered_bytes() {
        let t = telemetry();
        for descriptor in PID_TABLE {
            let mode = format!("{:02X}", descriptor.mode);
            let pid = format!("{:02X}", descriptor.pid);
            let reply = respond(&mode, &pid, &t);
            assert_eq!(reply.body().split(' ').count(), descriptor.width() + 2, "{mode}{pid}");
        }
    }

    #[test]
    fn test_render_bytes() {
        assert_eq!(render_bytes(&[]), "");
        assert_eq!(render_bytes(&[0x0A]), "0A");
        assert_eq!(render_bytes(&[0x41, 0x0C, 0xFF]), "41 0C FF");
    }
}
