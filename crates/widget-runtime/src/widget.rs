//! The chat widget: one authority for open/close, authentication and chat.

use crate::view::{InputMode, WidgetView};
use crate::WidgetResult;
use biometric_auth::{
    AuthEvent, AuthSession, AuthSnapshot, AuthStatus, BiometricApi, BiometricClient,
    NumberSubmission, PollConfig,
};
use chat_completion::{CompletionBackend, CompletionClient, Conversation, SendOutcome};
use country_directory::{find_country, CountryDirectory, CountryLoad, CountryOption, CountrySource};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use widget_config_and_utils::{Config, Paths, Secrets};
use widget_protocol_types::{AuthStep, Message, WidgetRecord};
use widget_storage::{FileStateStore, MemoryStateStore, StateStore, StorageResult};

/// First bot message of a fresh transcript.
pub const WELCOME_MESSAGE: &str = "Welcome! Please select your country code:";

/// Behavioural switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetOptions {
    /// When false, chat is unlocked from the start and no phone
    /// authentication is asked for.
    pub require_authentication: bool,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            require_authentication: true,
        }
    }
}

impl From<&Config> for WidgetOptions {
    fn from(config: &Config) -> Self {
        Self {
            require_authentication: config.require_authentication,
        }
    }
}

/// Result of [`ChatWidget::submit_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Routed to the conversation.
    Chat(SendOutcome),
    /// Routed to phone-number entry.
    Number(NumberSubmission),
    /// No country has been picked yet.
    NeedCountry,
    /// An authentication attempt is in flight.
    Busy,
}

#[derive(Debug, Default)]
struct Flags {
    open: bool,
    countries: Option<CountryLoad>,
    loading: bool,
}

struct WidgetInner {
    session: AuthSession,
    conversation: Conversation,
    countries: Arc<dyn CountrySource>,
    store: Arc<dyn StateStore>,
    options: WidgetOptions,
    flags: Mutex<Flags>,
    /// Latest auth state as reported by the session listener. Read when
    /// persisting so the session lock is never taken from a callback.
    auth_view: Mutex<AuthSnapshot>,
    /// Serializes record writes.
    persist_lock: Mutex<()>,
    revision: watch::Sender<u64>,
}

impl WidgetInner {
    fn record(&self) -> WidgetRecord {
        let auth = self.auth_view.lock().clone();
        WidgetRecord {
            is_authenticated: auth.status.is_authenticated(),
            phone_number: auth.full_number.unwrap_or_default(),
            auth_step: if auth.dial_code.is_some() {
                AuthStep::Phone
            } else {
                AuthStep::Country
            },
            selected_country_code: auth.dial_code.unwrap_or_default(),
            messages: self.conversation.messages(),
        }
    }

    /// Persist the current record and wake presentation watchers.
    fn changed(&self) {
        {
            let _guard = self.persist_lock.lock();
            let record = self.record();
            if let Err(e) = save_record(self.store.as_ref(), &record) {
                warn!(error = %e, "failed to persist widget state");
            }
        }
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Runs with the session locked, including from the background poll
    /// task. The record write happens here synchronously.
    fn on_auth_event(&self, event: AuthEvent) {
        *self.auth_view.lock() = event.snapshot.clone();

        if event.snapshot.status.is_authenticated() {
            self.conversation.unlock();
        }

        match event.notice {
            // The conversation listener persists after the push
            Some(notice) => self.conversation.push(notice.to_message()),
            None => self.changed(),
        }
    }
}

/// Chat widget runtime.
///
/// Cheap to clone; clones share the same widget.
#[derive(Clone)]
pub struct ChatWidget {
    inner: Arc<WidgetInner>,
}

impl ChatWidget {
    /// Assemble a widget and restore any persisted record.
    pub fn new(
        session: AuthSession,
        conversation: Conversation,
        countries: Arc<dyn CountrySource>,
        store: Arc<dyn StateStore>,
        options: WidgetOptions,
    ) -> Self {
        restore(&session, &conversation, store.as_ref());
        if !options.require_authentication {
            conversation.unlock();
        }

        let inner = Arc::new(WidgetInner {
            auth_view: Mutex::new(session.snapshot()),
            session,
            conversation,
            countries,
            store,
            options,
            flags: Mutex::new(Flags::default()),
            persist_lock: Mutex::new(()),
            revision: watch::channel(0).0,
        });

        let weak: Weak<WidgetInner> = Arc::downgrade(&inner);
        inner.session.set_listener(Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_auth_event(event);
            }
        }));

        let weak: Weak<WidgetInner> = Arc::downgrade(&inner);
        inner.conversation.set_listener(Box::new(move |_state| {
            if let Some(inner) = weak.upgrade() {
                inner.changed();
            }
        }));

        Self { inner }
    }

    /// Build a widget wired to the real HTTP services.
    pub fn from_config(config: &Config, secrets: &Secrets, paths: &Paths) -> WidgetResult<Self> {
        let auth_api: Arc<dyn BiometricApi> = Arc::new(BiometricClient::from_config(config, secrets)?);
        let completion: Arc<dyn CompletionBackend> =
            Arc::new(CompletionClient::from_config(config, secrets)?);
        let countries: Arc<dyn CountrySource> = Arc::new(CountryDirectory::from_config(config)?);
        let store: Arc<dyn StateStore> = if config.persist_state {
            Arc::new(FileStateStore::new(paths.state_file()))
        } else {
            Arc::new(MemoryStateStore::new())
        };

        Ok(Self::new(
            AuthSession::new(auth_api, PollConfig::from(config)),
            Conversation::new(completion),
            countries,
            store,
            WidgetOptions::from(config),
        ))
    }

    /// Open the widget.
    ///
    /// Greets a fresh transcript and loads the country list the first time
    /// (or again, if the previous load failed).
    pub async fn open(&self) {
        let needs_load = {
            let mut flags = self.inner.flags.lock();
            flags.open = true;
            let needs_load = !flags.loading
                && flags.countries.as_ref().map_or(true, |load| load.failed);
            if needs_load {
                flags.loading = true;
            }
            needs_load
        };
        info!("widget opened");

        if self.inner.conversation.messages().is_empty() {
            self.inner.conversation.push(Message::bot(WELCOME_MESSAGE));
        }

        if needs_load {
            let load = self.inner.countries.load().await;
            let failure = load.failure_message();
            {
                let mut flags = self.inner.flags.lock();
                flags.countries = Some(load);
                flags.loading = false;
            }
            match failure {
                Some(message) => self.inner.conversation.push(message),
                None => self.inner.changed(),
            }
        }
    }

    /// Close the widget.
    ///
    /// An unauthenticated session is reset (polling stops, the country is
    /// forgotten). An authenticated session and the transcript are kept.
    pub fn close(&self) {
        self.inner.flags.lock().open = false;
        if self.inner.session.status() == AuthStatus::Authenticated {
            debug!("widget closed, keeping authenticated session");
            self.inner.changed();
        } else {
            info!("widget closed, resetting auth session");
            self.inner.session.reset();
        }
    }

    /// Forget everything: session, transcript and persisted record.
    pub fn logout(&self) {
        self.inner.session.reset();
        if self.inner.options.require_authentication {
            self.inner.conversation.relock();
        }
        self.inner.conversation.clear();

        {
            let _guard = self.inner.persist_lock.lock();
            if let Err(e) = self.inner.store.clear() {
                warn!(error = %e, "failed to remove persisted widget state");
            }
        }
        info!("widget logged out");

        if self.inner.flags.lock().open {
            self.inner.conversation.push(Message::bot(WELCOME_MESSAGE));
        } else {
            self.inner.revision.send_modify(|revision| *revision += 1);
        }
    }

    /// Pick a country by dial code (`+44`, `44`) or name prefix from the
    /// loaded list. Returns the chosen country, or `None` when nothing
    /// matched or a country cannot be chosen right now.
    pub fn select_country(&self, query: &str) -> Option<CountryOption> {
        let country = {
            let flags = self.inner.flags.lock();
            let countries = flags.countries.as_ref().map(|l| l.countries.as_slice())?;
            find_country(countries, query).cloned()
        }?;
        self.choose_country(&country).then_some(country)
    }

    /// Pick a country directly.
    pub fn choose_country(&self, country: &CountryOption) -> bool {
        if self.inner.conversation.is_unlocked() {
            return false;
        }
        if self.inner.session.status().is_retryable() {
            self.inner.session.restart();
        }
        self.inner.session.select_country(country)
    }

    /// Submit a line of user input.
    ///
    /// Goes to the conversation once chat is unlocked, otherwise to phone
    /// number entry. After a failed or timed-out attempt the number starts
    /// a new attempt with the same country.
    pub async fn submit_text(&self, text: &str) -> SubmitOutcome {
        if self.inner.conversation.is_unlocked() {
            return SubmitOutcome::Chat(self.inner.conversation.send(text).await);
        }

        let auth = self.inner.session.snapshot();
        match auth.status {
            AuthStatus::Requesting | AuthStatus::Polling => return SubmitOutcome::Busy,
            AuthStatus::Failed | AuthStatus::TimedOut => {
                self.inner.session.restart();
            }
            AuthStatus::Idle if auth.dial_code.is_none() => return SubmitOutcome::NeedCountry,
            AuthStatus::Idle | AuthStatus::Authenticated => {}
        }

        SubmitOutcome::Number(self.inner.session.submit_number(text))
    }

    pub fn snapshot(&self) -> WidgetView {
        let auth = self.inner.session.snapshot();
        let conversation = self.inner.conversation.state();
        let input_mode = InputMode::derive(&auth, self.inner.conversation.is_unlocked());
        let flags = self.inner.flags.lock();
        let (country_count, countries_failed) = flags
            .countries
            .as_ref()
            .map_or((0, false), |load| (load.countries.len(), load.failed));

        WidgetView {
            open: flags.open,
            auth,
            messages: conversation.messages,
            pending: conversation.pending,
            input_mode,
            country_count,
            countries_failed,
        }
    }

    /// The loaded country list, empty until [`open`](Self::open) completed.
    pub fn countries(&self) -> Vec<CountryOption> {
        self.inner
            .flags
            .lock()
            .countries
            .as_ref()
            .map(|load| load.countries.clone())
            .unwrap_or_default()
    }

    /// Revision counter bumped after every change, including those made by
    /// the background poller.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn session(&self) -> &AuthSession {
        &self.inner.session
    }

    pub fn conversation(&self) -> &Conversation {
        &self.inner.conversation
    }
}

/// Save synchronously. On a multi-threaded runtime the worker is marked as
/// blocking for the duration so other tasks are moved off it.
fn save_record(store: &dyn StateStore, record: &WidgetRecord) -> StorageResult<()> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| store.save(record))
        }
        _ => store.save(record),
    }
}

/// Load the persisted record into a fresh session and transcript.
fn restore(session: &AuthSession, conversation: &Conversation, store: &dyn StateStore) {
    let record = match store.load() {
        Ok(Some(record)) => record,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "failed to read persisted widget state, starting fresh");
            return;
        }
    };

    conversation.restore(record.messages);
    let dial_code = Some(record.selected_country_code.as_str()).filter(|c| !c.is_empty());

    if record.is_authenticated {
        match session.restore_authenticated(&record.phone_number, dial_code) {
            Ok(()) => {
                conversation.unlock();
                return;
            }
            Err(e) => warn!(error = %e, "discarding persisted authentication"),
        }
    }

    if let (AuthStep::Phone, Some(code)) = (record.auth_step, dial_code) {
        session.restore_dial_code(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biometric_auth::{AuthResult, PhoneNumber, PollOutcome};
    use chat_completion::CompletionResult;
    use country_directory::CountryDirectoryResult;

    struct NoAuth;

    #[async_trait::async_trait]
    impl BiometricApi for NoAuth {
        async fn request_auth(&self, _number: &PhoneNumber) -> AuthResult<()> {
            Ok(())
        }

        async fn poll_result(&self, _number: &PhoneNumber) -> AuthResult<PollOutcome> {
            Ok(PollOutcome::Pending)
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl CompletionBackend for Echo {
        async fn complete(&self, prompt: &str) -> CompletionResult<String> {
            Ok(prompt.to_uppercase())
        }
    }

    struct NoCountries;

    #[async_trait::async_trait]
    impl CountrySource for NoCountries {
        async fn fetch_countries(&self) -> CountryDirectoryResult<Vec<CountryOption>> {
            Ok(Vec::new())
        }
    }

    fn widget(store: Arc<dyn StateStore>) -> ChatWidget {
        ChatWidget::new(
            AuthSession::new(Arc::new(NoAuth), PollConfig::default()),
            Conversation::new(Arc::new(Echo)),
            Arc::new(NoCountries),
            store,
            WidgetOptions::default(),
        )
    }

    #[test]
    fn test_restore_country_step() {
        let store = Arc::new(MemoryStateStore::with_record(WidgetRecord {
            selected_country_code: "+44".into(),
            auth_step: AuthStep::Phone,
            messages: vec![Message::bot(WELCOME_MESSAGE)],
            ..Default::default()
        }));
        let widget = widget(store);

        let view = widget.snapshot();
        assert_eq!(view.input_mode, InputMode::Phone);
        assert_eq!(view.auth.dial_code.as_deref(), Some("+44"));
        assert_eq!(view.messages.len(), 1);
    }

    #[test]
    fn test_invalid_persisted_authentication_starts_locked() {
        let store = Arc::new(MemoryStateStore::with_record(WidgetRecord {
            is_authenticated: true,
            phone_number: "not a number".into(),
            selected_country_code: "+1".into(),
            auth_step: AuthStep::Phone,
            messages: Vec::new(),
        }));
        let widget = widget(store);

        let view = widget.snapshot();
        assert_eq!(view.auth.status, AuthStatus::Idle);
        assert_eq!(view.input_mode, InputMode::Phone);
        assert!(!widget.conversation().is_unlocked());
    }

    #[test]
    fn test_record_tracks_country_step() {
        let store = Arc::new(MemoryStateStore::new());
        let widget = widget(store.clone());

        widget.choose_country(&CountryOption::new("+33", "France", ""));
        let record = store.load().unwrap().unwrap();
        assert_eq!(record.auth_step, AuthStep::Phone);
        assert_eq!(record.selected_country_code, "+33");
        assert!(!record.is_authenticated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_record_saved_before_return_on_worker_thread() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStateStore::new(dir.path().join("state.json")));
        let widget = widget(store.clone());

        widget.choose_country(&CountryOption::new("+44", "United Kingdom", ""));
        let record = store.load().unwrap().unwrap();
        assert_eq!(record.selected_country_code, "+44");

        widget.session().reset();
        let record = store.load().unwrap().unwrap();
        assert_eq!(record.auth_step, AuthStep::Country);
    }

    #[test]
    fn test_revision_bumps_on_change() {
        let widget = widget(Arc::new(MemoryStateStore::new()));
        let mut revisions = widget.subscribe();
        assert!(!revisions.has_changed().unwrap());

        widget.choose_country(&CountryOption::new("+33", "France", ""));
        assert!(revisions.has_changed().unwrap());
        assert!(*revisions.borrow_and_update() > 0);
    }
}
