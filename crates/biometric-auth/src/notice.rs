//! Transcript notices produced by the authentication flow.

use crate::session::AuthSnapshot;
use serde::{Deserialize, Serialize};
use widget_protocol_types::Message;

/// Why an attempt ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The initial request failed (transport error or non-2xx).
    RequestFailed,
    /// Result endpoint answered 404.
    UserNotFound,
    /// Result endpoint answered 403.
    Denied,
    /// Result endpoint answered a status with no defined meaning.
    UnexpectedStatus { status: u16 },
    /// A result poll failed at the transport layer or returned an unreadable body.
    PollError,
}

/// A user-visible consequence of an authentication step.
///
/// Each notice becomes exactly one transcript message. Pending polls produce
/// no notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthNotice {
    CountrySelected {
        country_name: String,
        dial_code: String,
    },
    /// Echo of the combined number the user submitted.
    NumberEntered { candidate: String },
    InvalidNumber,
    RequestSent,
    Authenticated { name: Option<String> },
    Failed(FailureReason),
    TimedOut,
}

impl AuthNotice {
    /// Render the notice as a transcript message.
    pub fn to_message(&self) -> Message {
        match self {
            AuthNotice::CountrySelected {
                country_name,
                dial_code,
            } => Message::bot(format!(
                "You selected {} ({}). Now, please enter your phone number without the country code:",
                country_name, dial_code
            )),
            AuthNotice::NumberEntered { candidate } => Message::user(candidate.clone()),
            AuthNotice::InvalidNumber => {
                Message::bot("Please enter a valid phone number without the country code:")
            }
            AuthNotice::RequestSent => Message::bot(
                "Biometric authentication request sent. Please check your iValt app and complete the authentication.",
            ),
            AuthNotice::Authenticated { name } => Message::bot(match name {
                Some(name) => format!(
                    "Authentication successful!\n\nHi, {}! How can I help you today?",
                    name
                ),
                None => "Authentication successful!\n\nHi! How can I help you today?".to_string(),
            }),
            AuthNotice::Failed(reason) => Message::bot(match reason {
                FailureReason::RequestFailed => {
                    "Sorry, we couldn't initiate the authentication process. Please try again later."
                }
                FailureReason::UserNotFound => {
                    "User not found. Please check your phone number and try again."
                }
                FailureReason::Denied => "Authentication failed. Please try again.",
                FailureReason::UnexpectedStatus { .. } | FailureReason::PollError => {
                    "Sorry, we encountered an error while checking your authentication status. Please try again later."
                }
            }),
            AuthNotice::TimedOut => Message::bot("Authentication timed out. Please try again."),
        }
    }
}

/// Delivered to the session listener after every state change.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    /// Session state after the change.
    pub snapshot: AuthSnapshot,
    /// Transcript message to append, if the change produced one.
    pub notice: Option<AuthNotice>,
}
