//! Country dial-code reference data.
//!
//! The list is fetched once per widget session from a REST endpoint that
//! returns `[{name: {common}, flags: {svg}, idd: {root, suffixes}}]`.
//! Entries without a dial code are dropped, the rest are sorted by display
//! name with accent-insensitive ordering. A failed fetch degrades to an
//! empty list rather than an error (see [`CountrySource::load`]).

mod directory;
mod error;
mod parse;
mod sort;

pub use directory::{CountryDirectory, CountryLoad, CountrySource, LOAD_FAILED_MESSAGE};
pub use error::{CountryDirectoryError, CountryDirectoryResult};
pub use parse::parse_countries;
pub use sort::{find_country, sort_key};
pub use widget_protocol_types::CountryOption;
