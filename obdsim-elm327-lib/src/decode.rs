//! Client-side parsing of adapter responses

/// Data bytes of one Mode 01 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidReading {
    pub pid: u8,
    pub data: Vec<u8>,
}

impl PidReading {
    /// Physical value for the PIDs the emulator serves.
    ///
    /// Returns `None` for bitmap PIDs and PIDs with too few data bytes.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        let a = f64::from(*self.data.first()?);
        let ab = || {
            self.data
                .get(1)
                .map(|&b| a * 256.0 + f64::from(b))
        };
        match self.pid {
            // Load, throttle, fuel level: percent
            0x04 | 0x11 | 0x2F => Some(a / 2.55),
            // Coolant, oil temperature: °C
            0x05 | 0x5C => Some(a - 40.0),
            // Intake manifold pressure kPa, speed km/h
            0x0B | 0x0D => Some(a),
            0x0C => ab().map(|v| v / 4.0),
            // Timing advance, degrees
            0x0E => Some(a - 128.0),
            // Intake air temperature
            0x0F => Some(a - 40.0),
            // MAF, g/s
            0x10 => ab().map(|v| v / 100.0),
            _ => None,
        }
    }
}

/// Find the first Mode 01 response line in adapter output.
///
/// Accepts spaced (`41 0C 1A F8`) or compact (`410C1AF8`) bodies with any
/// echo, line endings and trailing prompt around them.
#[must_use]
pub fn parse_mode01(text: &str) -> Option<PidReading> {
    text.split(['\r', '\n', '>'])
        .map(|line| line.replace(' ', ""))
        .filter(|line| line.len() >= 6 && line.len() % 2 == 0)
        .find_map(|line| {
            let bytes = hex::decode(&line).ok()?;
            match bytes.as_slice() {
                [0x41, pid, data @ ..] if !data.is_empty() => Some(PidReading {
                    pid: *pid,
                    data: data.to_vec(),
                }),
                _ => None,
            }
        })
}

/// Extract RPM from raw adapter output.
///
/// RPM = ((A * 256) + B) / 4
pub fn extract_rpm_from_response(data: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(data).ok()?;
    let reading = parse_mode01(text)?;
    if reading.pid != 0x0C {
        return None;
    }
    match reading.data.as_slice() {
        [a, b, ..] => Some((u32::from(*a) * 256 + u32::from(*b)) / 4),
        _ => None,
    }
}
