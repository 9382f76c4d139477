//! Response display settings

use crate::NO_DATA;

/// Apply the `ATS` spacing setting to a response body.
///
/// With spaces off every space is removed, except from [`NO_DATA`] which
/// real adapters always print verbatim.
#[must_use]
pub fn format_response(body: &str, spaces_on: bool) -> String {
    if spaces_on || body == NO_DATA {
        body.to_string()
    } else {
        body.replace(' ', "")
    }
}
