//! Authentication state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │      Idle       │ (initial; dial code may or may not be chosen)
//! └────────┬────────┘
//!          │ NumberAccepted
//!          ▼
//! ┌─────────────────┐  RequestRejected   ┌─────────────────┐
//! │   Requesting    │ ─────────────────► │     Failed      │
//! └────────┬────────┘                    └────────┬────────┘
//!          │ RequestAccepted                ▲     │ Restart
//!          ▼                                │     ▼
//! ┌─────────────────┐  PollRejected ────────┘    Idle
//! │     Polling     │ ◄─┐
//! └──┬──────────┬───┘   │ PollPending
//!    │          └───────┘
//!    │ PollSucceeded          PollExhausted ┌─────────────────┐
//!    ▼                  ──────────────────► │    TimedOut     │ ── Restart ──► Idle
//! ┌─────────────────┐                       └─────────────────┘
//! │  Authenticated  │
//! └─────────────────┘
//! ```
//!
//! Resetting the session replaces the machine with a fresh one, so reset is
//! valid from every state and does not appear in the table.

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Idle)

    Idle => {
        NumberAccepted => Requesting
    },
    Requesting => {
        RequestAccepted => Polling,
        RequestRejected => Failed
    },
    Polling => {
        // 422 from the result endpoint
        PollPending => Polling,
        PollSucceeded => Authenticated,
        // 404, 403, unknown status or transport error
        PollRejected => Failed,
        PollExhausted => TimedOut
    },
    Failed => {
        Restart => Idle
    },
    TimedOut => {
        Restart => Idle
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Authentication status for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// Collecting a country and a number.
    Idle,
    /// Biometric request in flight.
    Requesting,
    /// Waiting for the user to approve in the companion app.
    Polling,
    /// Approved; chat is unlocked.
    Authenticated,
    /// The attempt ended with an error or a rejection.
    Failed,
    /// The poll budget ran out without a terminal answer.
    TimedOut,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated)
    }

    /// Returns true while a network exchange for this attempt is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, AuthStatus::Requesting | AuthStatus::Polling)
    }

    /// Returns true for outcomes the user can retry from.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthStatus::Failed | AuthStatus::TimedOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Idle => "idle",
            AuthStatus::Requesting => "requesting",
            AuthStatus::Polling => "polling",
            AuthStatus::Authenticated => "authenticated",
            AuthStatus::Failed => "failed",
            AuthStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AuthMachineState> for AuthStatus {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Idle => AuthStatus::Idle,
            AuthMachineState::Requesting => AuthStatus::Requesting,
            AuthMachineState::Polling => AuthStatus::Polling,
            AuthMachineState::Authenticated => AuthStatus::Authenticated,
            AuthMachineState::Failed => AuthStatus::Failed,
            AuthMachineState::TimedOut => AuthStatus::TimedOut,
        }
    }
}

/// Default delay between result polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(4000);

/// Default number of result polls before giving up (600 s at the default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;

/// Polling budget for one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between result polls. The first poll fires one interval
    /// after the request was accepted.
    pub interval: Duration,
    /// Number of result polls after which a still-pending attempt times out.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollConfig {
    /// Total wall-clock budget for the polling phase.
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

impl From<&widget_config_and_utils::Config> for PollConfig {
    fn from(config: &widget_config_and_utils::Config) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.poll_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let machine = AuthMachine::new();
        assert_eq!(*machine.state(), AuthMachineState::Idle);
    }

    #[test]
    fn test_successful_flow() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::NumberAccepted).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Requesting);

        machine.consume(&AuthMachineInput::RequestAccepted).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Polling);

        // Pending answers keep polling
        machine.consume(&AuthMachineInput::PollPending).unwrap();
        machine.consume(&AuthMachineInput::PollPending).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Polling);

        machine.consume(&AuthMachineInput::PollSucceeded).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_request_rejected_fails() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NumberAccepted).unwrap();
        machine.consume(&AuthMachineInput::RequestRejected).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Failed);
    }

    #[test]
    fn test_exhausted_polling_times_out_and_restarts() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NumberAccepted).unwrap();
        machine.consume(&AuthMachineInput::RequestAccepted).unwrap();
        machine.consume(&AuthMachineInput::PollExhausted).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::TimedOut);

        machine.consume(&AuthMachineInput::Restart).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Idle);
    }

    #[test]
    fn test_cannot_poll_before_request_is_accepted() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NumberAccepted).unwrap();

        let result = machine.consume(&AuthMachineInput::PollSucceeded);
        assert!(result.is_err());
        assert_eq!(*machine.state(), AuthMachineState::Requesting);
    }

    #[test]
    fn test_second_number_rejected_while_requesting() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NumberAccepted).unwrap();
        assert!(machine.consume(&AuthMachineInput::NumberAccepted).is_err());
    }

    #[test]
    fn test_authenticated_is_terminal() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NumberAccepted).unwrap();
        machine.consume(&AuthMachineInput::RequestAccepted).unwrap();
        machine.consume(&AuthMachineInput::PollSucceeded).unwrap();

        assert!(machine.consume(&AuthMachineInput::Restart).is_err());
        assert!(machine.consume(&AuthMachineInput::PollRejected).is_err());
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthStatus::from(&AuthMachineState::TimedOut), AuthStatus::TimedOut);
        assert!(AuthStatus::Polling.is_in_flight());
        assert!(AuthStatus::Failed.is_retryable());
        assert!(!AuthStatus::Authenticated.is_retryable());
        assert_eq!(
            serde_json::to_string(&AuthStatus::TimedOut).unwrap(),
            "\"timed_out\""
        );
    }

    #[test]
    fn test_default_budget_is_ten_minutes() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_millis(4000));
        assert_eq!(config.max_attempts, 150);
        assert_eq!(config.budget(), Duration::from_secs(600));
    }
}
