//! Country reference data.

use serde::{Deserialize, Serialize};

/// One selectable country, keyed by its dial code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryOption {
    /// International calling prefix including the leading `+` (e.g. `+44`).
    pub dial_code: String,
    /// Common display name (e.g. `United Kingdom`).
    pub country_name: String,
    /// Flag image URL, empty when the source had none.
    pub flag_url: String,
}

impl CountryOption {
    pub fn new(
        dial_code: impl Into<String>,
        country_name: impl Into<String>,
        flag_url: impl Into<String>,
    ) -> Self {
        Self {
            dial_code: dial_code.into(),
            country_name: country_name.into(),
            flag_url: flag_url.into(),
        }
    }
}
