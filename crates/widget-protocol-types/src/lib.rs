//! Shared data types for the biogate chat widget.
//!
//! These types cross crate boundaries (auth, conversation, storage,
//! presentation) and are the shape of the persisted widget record.

mod country;
mod message;
mod record;

pub use country::CountryOption;
pub use message::{Message, Sender};
pub use record::{AuthStep, WidgetRecord};
