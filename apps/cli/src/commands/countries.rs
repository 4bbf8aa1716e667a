//! Country list command.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use country_directory::{sort_key, CountryDirectory, CountryOption, CountrySource};
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
#[serde(transparent)]
struct CountryTable(Vec<CountryOption>);

impl fmt::Display for CountryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No countries found");
        }
        let rows: Vec<String> = self
            .0
            .iter()
            .map(|c| format!("{:>8}  {}", c.dial_code, c.country_name))
            .collect();
        write!(f, "{}", rows.join("\n"))
    }
}

/// Keep countries whose dial code or folded name starts with `query`.
fn filter(countries: Vec<CountryOption>, query: &str) -> Vec<CountryOption> {
    let query = query.trim();
    if query.is_empty() {
        return countries;
    }
    let digits = query.trim_start_matches('+');
    let folded = sort_key(query);
    countries
        .into_iter()
        .filter(|c| {
            c.dial_code.trim_start_matches('+').starts_with(digits)
                || sort_key(&c.country_name).starts_with(&folded)
        })
        .collect()
}

/// Fetch and print the country list.
pub async fn countries(ctx: &Context, query: Option<&str>, format: &OutputFormat) -> Result<()> {
    let directory = CountryDirectory::from_config(&ctx.config)?;
    let countries = directory.fetch_countries().await?;
    let countries = match query {
        Some(query) => filter(countries, query),
        None => countries,
    };
    output::print(&CountryTable(countries), format);
    Ok(())
}
