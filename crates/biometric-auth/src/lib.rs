//! Biometric phone authentication for the biogate chat widget.
//!
//! An [`AuthSession`] collects a country dial code and a local number,
//! validates the combined number, asks the biometric service to prompt the
//! user's companion app, and then polls for the outcome on a fixed interval
//! with a bounded attempt budget. Every transition runs through the
//! [`auth_fsm`] state machine and is reported to an optional listener as an
//! [`AuthEvent`].
//!
//! The network boundary is the [`BiometricApi`] trait; [`BiometricClient`]
//! is the HTTP implementation.

pub mod auth_fsm;
mod client;
mod error;
mod notice;
mod phone;
mod poller;
mod session;

pub use auth_fsm::{AuthStatus, PollConfig};
pub use client::{BiometricApi, BiometricClient, PollOutcome};
pub use error::{AuthError, AuthResult};
pub use notice::{AuthEvent, AuthNotice, FailureReason};
pub use phone::PhoneNumber;
pub use poller::PollHandle;
pub use session::{AuthListener, AuthSession, AuthSnapshot, NumberSubmission};
