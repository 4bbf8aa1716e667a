//! Accent-insensitive ordering and lookup of countries.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use widget_protocol_types::CountryOption;

/// Collation key for a display name.
///
/// Decomposes (NFD), drops combining marks and lowercases, so `Åland`
/// sorts with `Aland` and `Côte d'Ivoire` with `Cote`.
pub fn sort_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn sort_countries(countries: &mut [CountryOption]) {
    // Ties on the folded key fall back to the raw name for a total order.
    countries.sort_by_cached_key(|c| (sort_key(&c.country_name), c.country_name.clone()));
}

/// Find a country by dial code (`+44` or `44`) or by name prefix.
///
/// Dial codes must match exactly; names match case- and
/// accent-insensitively on their prefix. The first match in list order wins.
pub fn find_country<'a>(countries: &'a [CountryOption], query: &str) -> Option<&'a CountryOption> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    let digits = query.trim_start_matches('+');
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        let code = format!("+{}", digits);
        return countries.iter().find(|c| c.dial_code == code);
    }

    let needle = sort_key(query);
    countries
        .iter()
        .find(|c| sort_key(&c.country_name).starts_with(&needle))
}
