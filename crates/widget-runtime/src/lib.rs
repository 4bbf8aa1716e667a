//! Chat widget runtime.
//!
//! [`ChatWidget`] owns an [`AuthSession`](biometric_auth::AuthSession) and a
//! [`Conversation`](chat_completion::Conversation) and is the single entry
//! point for a presentation layer: it forwards user intents (open, close,
//! pick a country, submit text), persists a [`WidgetRecord`] after every
//! change and exposes a read-only [`WidgetView`].

mod error;
mod view;
mod widget;

pub use error::{WidgetError, WidgetResult};
pub use view::{InputMode, WidgetView};
pub use widget::{ChatWidget, SubmitOutcome, WidgetOptions, WELCOME_MESSAGE};
pub use widget_protocol_types::WidgetRecord;
