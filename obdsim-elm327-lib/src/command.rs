//! Incoming command lines

/// Canonicalize a raw command: upper case, letters and digits only.
///
/// Spaces, punctuation and control characters (including the `\r` terminator)
/// are dropped, so `"01 0c\r"` and `"010C"` are the same command.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// One command line as received from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Text exactly as the client sent it, minus framing
    pub raw: String,
    /// Name of the transport the command arrived on (for logging only)
    pub origin: String,
}

impl CommandRequest {
    pub fn new(raw: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            origin: origin.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_strips_and_uppercases() {
        assert_eq!(normalize("at e0\r"), "ATE0");
        assert_eq!(normalize(" 01 0c \r\n"), "010C");
        assert_eq!(normalize("AT@1"), "AT1");
        assert_eq!(normalize("x.y-z_zy!"), "XYZZY");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \r\n\t"), "");
    }

    #[test]
    fn test_normalize_drops_non_ascii() {
        assert_eq!(normalize("01é0C°"), "010C");
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(raw in any::<String>()) {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_output_alphanumeric(raw in any::<String>()) {
            let out = normalize(&raw);
            prop_assert!(out.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }
}
