//! Authentication session with FSM-based state management.
//!
//! An `AuthSession` owns one authentication attempt at a time. Synchronous
//! operations (`select_country`, `submit_number`, `restart`, `reset`) mutate
//! the session directly; the biometric request and the result polling run
//! on a background task owned through a [`PollHandle`].
//!
//! Starting an attempt, restarting and resetting all bump a generation
//! counter. The background task re-checks its generation under the lock
//! before each mutation, so a task that outlives its attempt can never
//! change state.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthStatus, PollConfig};
use crate::notice::{AuthEvent, AuthNotice, FailureReason};
use crate::{AuthError, AuthResult, BiometricApi, PhoneNumber, PollHandle, PollOutcome};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use widget_protocol_types::CountryOption;

/// Callback type for auth events.
///
/// Invoked with the session lock held, in transition order. The callback
/// must not call back into the session.
pub type AuthListener = Box<dyn Fn(AuthEvent) + Send + Sync>;

/// Read-only view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    /// Chosen country dial code. `Some` while `Idle` means a number is expected.
    pub dial_code: Option<String>,
    /// Last local number submitted, trimmed.
    pub local_number: String,
    /// Set only once a candidate passed validation.
    pub full_number: Option<String>,
    pub attempts_made: u32,
    pub display_name: Option<String>,
    pub failure: Option<FailureReason>,
}

impl AuthSnapshot {
    /// True when the session is waiting for a local number.
    pub fn awaiting_number(&self) -> bool {
        self.status == AuthStatus::Idle && self.dial_code.is_some()
    }
}

/// Result of [`AuthSession::submit_number`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberSubmission {
    /// No number is expected right now (no country chosen, or an attempt is
    /// already underway).
    Ignored,
    /// The candidate failed validation; the user was asked again.
    Invalid,
    /// The candidate is valid and the biometric request is on its way.
    Accepted(PhoneNumber),
}

struct SessionInner {
    machine: AuthMachine,
    dial_code: Option<String>,
    local_number: String,
    full_number: Option<PhoneNumber>,
    attempts_made: u32,
    display_name: Option<String>,
    failure: Option<FailureReason>,
    /// Bumped whenever the current attempt is abandoned or replaced.
    generation: u64,
    poll: Option<PollHandle>,
    listener: Option<AuthListener>,
    updates: watch::Sender<AuthSnapshot>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            machine: AuthMachine::new(),
            dial_code: None,
            local_number: String::new(),
            full_number: None,
            attempts_made: 0,
            display_name: None,
            failure: None,
            generation: 0,
            poll: None,
            listener: None,
            updates: watch::channel(Self::idle_snapshot()).0,
        }
    }

    fn idle_snapshot() -> AuthSnapshot {
        AuthSnapshot {
            status: AuthStatus::Idle,
            dial_code: None,
            local_number: String::new(),
            full_number: None,
            attempts_made: 0,
            display_name: None,
            failure: None,
        }
    }

    fn status(&self) -> AuthStatus {
        AuthStatus::from(self.machine.state())
    }

    fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            status: self.status(),
            dial_code: self.dial_code.clone(),
            local_number: self.local_number.clone(),
            full_number: self.full_number.as_ref().map(|n| n.to_string()),
            attempts_made: self.attempts_made,
            display_name: self.display_name.clone(),
            failure: self.failure.clone(),
        }
    }

    /// Transition the FSM, logging real state changes.
    fn transition(&mut self, input: AuthMachineInput) -> AuthResult<AuthStatus> {
        let old_state = self.status();

        self.machine.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                self.machine.state()
            ))
        })?;

        let new_state = self.status();
        if old_state != new_state {
            debug!(old_state = %old_state, new_state = %new_state, "Auth state transition");
        }
        Ok(new_state)
    }

    /// Publish the current state to subscribers only.
    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    /// Publish the current state and notify the listener.
    fn emit(&self, notice: Option<AuthNotice>) {
        let snapshot = self.snapshot();
        self.updates.send_replace(snapshot.clone());
        if let Some(listener) = &self.listener {
            listener(AuthEvent { snapshot, notice });
        }
    }

    /// Abandon the current attempt, if any.
    fn cancel_attempt(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.poll.take() {
            debug!(generation = handle.generation(), "cancelling auth attempt");
            handle.cancel();
        }
    }

    fn clear_attempt(&mut self) {
        self.local_number.clear();
        self.full_number = None;
        self.attempts_made = 0;
        self.display_name = None;
        self.failure = None;
    }

    fn finish_request(&mut self, result: AuthResult<()>) -> AuthResult<Option<()>> {
        match result {
            Ok(()) => {
                self.transition(AuthMachineInput::RequestAccepted)?;
                info!("biometric request accepted, waiting for approval");
                self.emit(Some(AuthNotice::RequestSent));
                Ok(Some(()))
            }
            Err(e) => {
                error!(error = %e, transient = e.is_transient(), "biometric request failed");
                self.transition(AuthMachineInput::RequestRejected)?;
                self.failure = Some(FailureReason::RequestFailed);
                self.emit(Some(AuthNotice::Failed(FailureReason::RequestFailed)));
                Ok(None)
            }
        }
    }

    fn begin_poll(&mut self) -> AuthResult<Option<u32>> {
        if self.status() != AuthStatus::Polling {
            return Ok(None);
        }
        self.attempts_made += 1;
        Ok(Some(self.attempts_made))
    }

    fn finish_poll(
        &mut self,
        attempt: u32,
        outcome: AuthResult<PollOutcome>,
        max_attempts: u32,
    ) -> AuthResult<Option<()>> {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    attempt,
                    error = %e,
                    transient = e.is_transient(),
                    "biometric result poll failed"
                );
                return self.fail(FailureReason::PollError);
            }
        };

        match outcome {
            PollOutcome::Pending if attempt >= max_attempts => {
                self.transition(AuthMachineInput::PollExhausted)?;
                warn!(attempt, "biometric authentication timed out");
                self.emit(Some(AuthNotice::TimedOut));
                Ok(None)
            }
            PollOutcome::Pending => {
                self.transition(AuthMachineInput::PollPending)?;
                debug!(attempt, "biometric authentication pending");
                self.publish();
                Ok(Some(()))
            }
            PollOutcome::Approved { name } => {
                self.transition(AuthMachineInput::PollSucceeded)?;
                info!(attempt, "biometric authentication approved");
                self.display_name = name.clone();
                self.emit(Some(AuthNotice::Authenticated { name }));
                Ok(None)
            }
            PollOutcome::UserNotFound => self.fail(FailureReason::UserNotFound),
            PollOutcome::Denied => self.fail(FailureReason::Denied),
            PollOutcome::Unexpected { status } => {
                warn!(attempt, status, "unexpected biometric result status");
                self.fail(FailureReason::UnexpectedStatus { status })
            }
        }
    }

    fn fail(&mut self, reason: FailureReason) -> AuthResult<Option<()>> {
        self.transition(AuthMachineInput::PollRejected)?;
        info!(reason = ?reason, attempts = self.attempts_made, "biometric authentication failed");
        self.failure = Some(reason.clone());
        self.emit(Some(AuthNotice::Failed(reason)));
        Ok(None)
    }
}

/// Biometric authentication session.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Mutex<SessionInner>>,
    api: Arc<dyn BiometricApi>,
    config: PollConfig,
}

impl AuthSession {
    pub fn new(api: Arc<dyn BiometricApi>, config: PollConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner::new())),
            api,
            config,
        }
    }

    /// Set a callback to be notified of every state change.
    pub fn set_listener(&self, listener: AuthListener) {
        self.inner.lock().listener = Some(listener);
    }

    /// Watch the session state. Also updated on pending polls, which the
    /// listener does not see.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.lock().updates.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.lock().status()
    }

    /// True while a request/poll task is live for this session.
    pub fn has_active_poll(&self) -> bool {
        self.inner.lock().poll.is_some()
    }

    /// Choose the country whose dial code prefixes the number.
    ///
    /// Only valid while `Idle`; picking again replaces the previous choice.
    /// Returns false when ignored.
    pub fn select_country(&self, country: &CountryOption) -> bool {
        let mut inner = self.inner.lock();
        if inner.status() != AuthStatus::Idle {
            debug!(status = %inner.status(), "ignoring country selection");
            return false;
        }

        info!(dial_code = %country.dial_code, "country selected");
        inner.dial_code = Some(country.dial_code.clone());
        inner.local_number.clear();
        inner.emit(Some(AuthNotice::CountrySelected {
            country_name: country.country_name.clone(),
            dial_code: country.dial_code.clone(),
        }));
        true
    }

    /// Submit the local part of the number.
    ///
    /// The candidate is validated before any network call. A valid number
    /// starts a new attempt: the biometric request is issued in the
    /// background and, once accepted, the result is polled every
    /// [`PollConfig::interval`]. Must be called within a Tokio runtime.
    pub fn submit_number(&self, raw: &str) -> NumberSubmission {
        let mut inner = self.inner.lock();
        let dial_code = match (&inner.dial_code, inner.status()) {
            (Some(code), AuthStatus::Idle) => code.clone(),
            (_, status) => {
                debug!(status = %status, "ignoring number submission");
                return NumberSubmission::Ignored;
            }
        };

        let candidate = PhoneNumber::candidate(&dial_code, raw);
        inner.local_number = raw.trim().to_string();
        inner.emit(Some(AuthNotice::NumberEntered {
            candidate: candidate.clone(),
        }));

        let number = match PhoneNumber::parse(&candidate) {
            Ok(number) => number,
            Err(e) => {
                debug!(dial_code = %dial_code, error = %e, "rejected phone number");
                inner.full_number = None;
                inner.emit(Some(AuthNotice::InvalidNumber));
                return NumberSubmission::Invalid;
            }
        };

        if let Err(e) = inner.transition(AuthMachineInput::NumberAccepted) {
            warn!(error = %e, "cannot start auth attempt");
            return NumberSubmission::Ignored;
        }
        inner.full_number = Some(number.clone());
        inner.attempts_made = 0;
        inner.display_name = None;
        inner.failure = None;

        self.start_attempt(&mut inner, number.clone());
        inner.emit(None);
        NumberSubmission::Accepted(number)
    }

    /// Return a failed or timed-out session to number entry.
    ///
    /// The chosen country is kept; attempts and the full number are reset.
    /// Returns false when the session is not in a retryable state.
    pub fn restart(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.status().is_retryable() {
            return false;
        }
        if let Err(e) = inner.transition(AuthMachineInput::Restart) {
            warn!(error = %e, "cannot restart auth session");
            return false;
        }

        inner.cancel_attempt();
        inner.clear_attempt();
        inner.emit(None);
        true
    }

    /// Cancel any attempt and return to a fresh `Idle` with no country.
    ///
    /// Once this returns, no callback of an earlier attempt mutates the
    /// session or reaches the listener.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.cancel_attempt();
        inner.machine = AuthMachine::new();
        inner.dial_code = None;
        inner.clear_attempt();
        info!("auth session reset");
        inner.emit(None);
    }

    /// Restore a chosen country without announcing it. Only valid from `Idle`.
    pub fn restore_dial_code(&self, dial_code: &str) -> bool {
        let dial_code = dial_code.trim();
        let mut inner = self.inner.lock();
        if inner.status() != AuthStatus::Idle || dial_code.is_empty() {
            return false;
        }
        inner.dial_code = Some(dial_code.to_string());
        inner.emit(None);
        true
    }

    /// Restore a previously authenticated session without contacting the
    /// service. Only valid from `Idle`.
    pub fn restore_authenticated(&self, number: &str, dial_code: Option<&str>) -> AuthResult<()> {
        let number = PhoneNumber::parse(number)?;
        let mut inner = self.inner.lock();
        if inner.status() != AuthStatus::Idle {
            return Err(AuthError::InvalidStateTransition(format!(
                "Cannot restore an authenticated session in state {}",
                inner.status()
            )));
        }

        for input in [
            AuthMachineInput::NumberAccepted,
            AuthMachineInput::RequestAccepted,
            AuthMachineInput::PollSucceeded,
        ] {
            inner.transition(input)?;
        }
        inner.dial_code = dial_code.map(str::to_string);
        inner.full_number = Some(number);
        info!("restored authenticated session");
        inner.emit(None);
        Ok(())
    }

    fn start_attempt(&self, inner: &mut SessionInner, number: PhoneNumber) {
        inner.cancel_attempt();
        let generation = inner.generation;
        let task = tokio::spawn(run_attempt(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.api),
            self.config,
            generation,
            number,
        ));
        inner.poll = Some(PollHandle::new(task, generation));
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("snapshot", &self.snapshot())
            .field("config", &self.config)
            .finish()
    }
}

/// Apply `step` if `generation` is still the current attempt.
///
/// Returns `None` when the task must stop: the attempt was replaced, the
/// session was dropped, or the step reached a terminal state. A terminal
/// step releases the session's poll handle in the same critical section.
fn advance<T>(
    session: &Weak<Mutex<SessionInner>>,
    generation: u64,
    step: impl FnOnce(&mut SessionInner) -> AuthResult<Option<T>>,
) -> Option<T> {
    let session = session.upgrade()?;
    let mut inner = session.lock();
    if inner.generation != generation {
        debug!(generation, current = inner.generation, "stale auth attempt stopped");
        return None;
    }

    match step(&mut inner) {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            inner.poll.take();
            None
        }
        Err(e) => {
            warn!(error = %e, "auth attempt aborted");
            inner.poll.take();
            None
        }
    }
}

async fn run_attempt(
    session: Weak<Mutex<SessionInner>>,
    api: Arc<dyn BiometricApi>,
    config: PollConfig,
    generation: u64,
    number: PhoneNumber,
) {
    let requested = api.request_auth(&number).await;
    if advance(&session, generation, |inner| inner.finish_request(requested)).is_none() {
        return;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(attempt) = advance(&session, generation, SessionInner::begin_poll) else {
            return;
        };
        let outcome = api.poll_result(&number).await;
        if advance(&session, generation, |inner| {
            inner.finish_poll(attempt, outcome, config.max_attempts)
        })
        .is_none()
        {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Accepts every request and never resolves the result.
    struct PendingApi;

    #[async_trait]
    impl BiometricApi for PendingApi {
        async fn request_auth(&self, _number: &PhoneNumber) -> AuthResult<()> {
            Ok(())
        }

        async fn poll_result(&self, _number: &PhoneNumber) -> AuthResult<PollOutcome> {
            Ok(PollOutcome::Pending)
        }
    }

    fn session() -> AuthSession {
        AuthSession::new(Arc::new(PendingApi), PollConfig::default())
    }

    fn usa() -> CountryOption {
        CountryOption::new("+1", "United States", "")
    }

    fn recorder(session: &AuthSession) -> Arc<Mutex<Vec<AuthEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        session.set_listener(Box::new(move |event| sink.lock().push(event)));
        events
    }

    #[test]
    fn test_new_session_is_idle_without_country() {
        let snapshot = session().snapshot();
        assert_eq!(snapshot.status, AuthStatus::Idle);
        assert!(snapshot.dial_code.is_none());
        assert!(!snapshot.awaiting_number());
    }

    #[test]
    fn test_number_ignored_before_country() {
        let session = session();
        let events = recorder(&session);

        assert_eq!(session.submit_number("5551234567"), NumberSubmission::Ignored);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_select_country_emits_confirmation() {
        let session = session();
        let events = recorder(&session);

        assert!(session.select_country(&usa()));
        assert!(session.snapshot().awaiting_number());

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].notice,
            Some(AuthNotice::CountrySelected { ref dial_code, .. }) if dial_code == "+1"
        ));
    }

    #[test]
    fn test_invalid_number_reprompts_once() {
        let session = session();
        session.select_country(&usa());
        let events = recorder(&session);

        for raw in ["555", "55512345678901", "55512x4567"] {
            events.lock().clear();
            assert_eq!(session.submit_number(raw), NumberSubmission::Invalid);

            let snapshot = session.snapshot();
            assert!(snapshot.awaiting_number());
            assert!(snapshot.full_number.is_none());

            let notices: Vec<_> = events.lock().iter().filter_map(|e| e.notice.clone()).collect();
            assert_eq!(
                notices,
                vec![
                    AuthNotice::NumberEntered {
                        candidate: format!("+1{}", raw)
                    },
                    AuthNotice::InvalidNumber,
                ]
            );
        }
        assert!(!session.has_active_poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_number_starts_single_attempt() {
        let session = session();
        session.select_country(&usa());

        let accepted = session.submit_number(" 5551234567 ");
        assert!(matches!(accepted, NumberSubmission::Accepted(ref n) if n.as_str() == "+15551234567"));
        assert_eq!(session.status(), AuthStatus::Requesting);
        assert!(session.has_active_poll());

        // Re-entrant submissions while in flight are ignored
        assert_eq!(session.submit_number("5551234567"), NumberSubmission::Ignored);
        assert!(!session.select_country(&usa()));

        session.reset();
        assert!(!session.has_active_poll());
    }

    #[test]
    fn test_restore_authenticated() {
        let session = session();
        session.restore_authenticated("+15551234567", Some("+1")).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, AuthStatus::Authenticated);
        assert_eq!(snapshot.full_number.as_deref(), Some("+15551234567"));
        assert!(!session.has_active_poll());

        // Second restore is an invalid transition
        assert!(session.restore_authenticated("+15551234567", None).is_err());
    }

    #[test]
    fn test_restore_rejects_invalid_number() {
        let session = session();
        assert!(matches!(
            session.restore_authenticated("12345", None),
            Err(AuthError::InvalidPhoneNumber(_))
        ));
        assert_eq!(session.status(), AuthStatus::Idle);
    }

    #[test]
    fn test_restart_only_from_retryable_states() {
        let session = session();
        assert!(!session.restart());
    }

    #[test]
    fn test_reset_clears_country() {
        let session = session();
        session.select_country(&usa());
        session.reset();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, AuthStatus::Idle);
        assert!(snapshot.dial_code.is_none());
    }
}
