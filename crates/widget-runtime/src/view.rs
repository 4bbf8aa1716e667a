//! Read-only widget state for presentation.

use biometric_auth::{AuthSnapshot, AuthStatus};
use serde::Serialize;
use widget_protocol_types::Message;

/// What the input box currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// A country has to be picked first.
    Country,
    /// The local phone number.
    Phone,
    /// An authentication attempt is underway; input is ignored.
    Waiting,
    /// The attempt failed or timed out; the next number starts a new one.
    Retry,
    /// Free-form chat.
    Chat,
}

/// Snapshot of everything a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetView {
    pub open: bool,
    pub auth: AuthSnapshot,
    pub messages: Vec<Message>,
    /// A chat reply is being generated.
    pub pending: bool,
    pub input_mode: InputMode,
    pub country_count: usize,
    /// The last country load failed.
    pub countries_failed: bool,
}

impl InputMode {
    pub(crate) fn derive(auth: &AuthSnapshot, chat_unlocked: bool) -> Self {
        if chat_unlocked {
            return InputMode::Chat;
        }
        match auth.status {
            AuthStatus::Idle if auth.dial_code.is_some() => InputMode::Phone,
            AuthStatus::Idle => InputMode::Country,
            AuthStatus::Requesting | AuthStatus::Polling => InputMode::Waiting,
            AuthStatus::Failed | AuthStatus::TimedOut => InputMode::Retry,
            AuthStatus::Authenticated => InputMode::Chat,
        }
    }
}
