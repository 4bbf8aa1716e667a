//! Mapping of raw reference entries to [`CountryOption`]s.

use crate::sort::sort_countries;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use widget_protocol_types::CountryOption;

#[derive(Debug, Default, Deserialize)]
struct RawCountry {
    #[serde(default)]
    name: RawName,
    #[serde(default)]
    flags: RawFlags,
    #[serde(default)]
    idd: RawIdd,
}

#[derive(Debug, Default, Deserialize)]
struct RawName {
    #[serde(default)]
    common: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawFlags {
    #[serde(default)]
    svg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawIdd {
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    suffixes: Option<Vec<String>>,
}

impl RawCountry {
    fn into_option(self) -> Option<CountryOption> {
        let root = self.idd.root.filter(|r| !r.trim().is_empty())?;
        let suffixes = self.idd.suffixes.filter(|s| !s.is_empty())?;
        let name = self.name.common.trim();
        if name.is_empty() {
            return None;
        }

        // Only the first suffix counts: +1 and 201 make +1201
        let dial_code = format!("{}{}", root.trim(), suffixes[0].trim());

        Some(CountryOption::new(
            dial_code,
            name,
            self.flags.svg.unwrap_or_default(),
        ))
    }
}

/// Turn the raw endpoint payload into sorted options.
///
/// Entries that are malformed or lack a dial code are dropped one by one;
/// they never fail the whole list.
pub fn parse_countries(entries: Vec<Value>) -> Vec<CountryOption> {
    let total = entries.len();
    let mut countries: Vec<CountryOption> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawCountry>(entry).ok())
        .filter_map(RawCountry::into_option)
        .collect();

    sort_countries(&mut countries);
    debug!(total, kept = countries.len(), "parsed country reference list");
    countries
}
