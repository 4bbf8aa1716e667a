//! Conversation transcript and the per-message request cycle.

use crate::CompletionBackend;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use widget_protocol_types::Message;

/// Bot reply appended when a completion request fails.
pub const COMPLETION_FAILED_MESSAGE: &str = "Sorry, I couldn't process that request.";

/// Transcript plus the in-flight flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    /// True iff a completion request is in flight.
    pub pending: bool,
}

/// Why a send was refused. Refusals leave the transcript untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    /// Text was empty after trimming.
    Empty,
    /// A previous message is still waiting for its reply.
    Pending,
    /// Chat is not unlocked yet.
    Locked,
}

/// Result of [`Conversation::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The backend answered; carries the appended reply.
    Replied(Message),
    /// The backend failed; carries the appended apology.
    Failed(Message),
    Rejected(SendRejection),
    /// The transcript was cleared or relocked while waiting; the reply was
    /// dropped.
    Discarded,
}

/// Change notification. Called after the transcript lock is released, so it
/// may read the conversation again.
pub type ConversationListener = Box<dyn Fn(&ConversationState) + Send + Sync>;

struct Inner {
    state: ConversationState,
    unlocked: bool,
    /// Bumped by `clear` and `relock`. A reply is only appended if the
    /// epoch it was requested in is still current.
    epoch: u64,
}

/// The widget transcript and its completion request cycle.
///
/// Cheap to clone; clones share the same transcript.
#[derive(Clone)]
pub struct Conversation {
    inner: Arc<Mutex<Inner>>,
    listener: Arc<Mutex<Option<Arc<dyn Fn(&ConversationState) + Send + Sync>>>>,
    backend: Arc<dyn CompletionBackend>,
}

impl Conversation {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ConversationState::default(),
                unlocked: false,
                epoch: 0,
            })),
            listener: Arc::new(Mutex::new(None)),
            backend,
        }
    }

    pub fn set_listener(&self, listener: ConversationListener) {
        *self.listener.lock() = Some(Arc::from(listener));
    }

    /// Allow `send`. Called once the user is authenticated.
    pub fn unlock(&self) {
        self.inner.lock().unlocked = true;
    }

    /// Refuse `send` until unlocked again. A reply still in flight is dropped.
    pub fn relock(&self) {
        let snapshot = {
            let mut inner = self.inner.lock();
            inner.unlocked = false;
            inner.epoch += 1;
            inner.state.pending = false;
            inner.state.clone()
        };
        self.notify(&snapshot);
    }

    pub fn is_unlocked(&self) -> bool {
        self.inner.lock().unlocked
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().state.pending
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().state.messages.clone()
    }

    pub fn state(&self) -> ConversationState {
        self.inner.lock().state.clone()
    }

    /// Append a message produced outside the request cycle (welcome text,
    /// authentication notices).
    pub fn push(&self, message: Message) {
        self.mutate(|state| state.messages.push(message));
    }

    /// Replace the transcript, e.g. from a persisted record.
    pub fn restore(&self, messages: Vec<Message>) {
        self.mutate(|state| state.messages = messages);
    }

    /// Empty the transcript. A reply still in flight is dropped.
    pub fn clear(&self) {
        let snapshot = {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.state = ConversationState::default();
            inner.state.clone()
        };
        self.notify(&snapshot);
    }

    /// Send one user message and append the reply.
    ///
    /// The user message is appended before the backend is called. Exactly
    /// one bot message follows, either the reply or
    /// [`COMPLETION_FAILED_MESSAGE`], unless the transcript was cleared or
    /// relocked in the meantime. Nothing is retried.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let prompt = text.trim();
        if prompt.is_empty() {
            return SendOutcome::Rejected(SendRejection::Empty);
        }

        let accepted = {
            let mut inner = self.inner.lock();
            if !inner.unlocked {
                Err(SendRejection::Locked)
            } else if inner.state.pending {
                Err(SendRejection::Pending)
            } else {
                inner.state.messages.push(Message::user(prompt));
                inner.state.pending = true;
                Ok((inner.epoch, inner.state.clone()))
            }
        };
        let (epoch, snapshot) = match accepted {
            Ok(accepted) => accepted,
            Err(rejection) => {
                debug!(?rejection, "send rejected");
                return SendOutcome::Rejected(rejection);
            }
        };
        self.notify(&snapshot);

        let (reply, replied) = match self.backend.complete(prompt).await {
            Ok(reply) => {
                info!(reply_len = reply.len(), "chat reply received");
                (Message::bot(reply), true)
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "chat completion failed");
                (Message::bot(COMPLETION_FAILED_MESSAGE), false)
            }
        };

        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                None
            } else {
                inner.state.messages.push(reply.clone());
                inner.state.pending = false;
                Some(inner.state.clone())
            }
        };
        let Some(snapshot) = snapshot else {
            debug!("transcript reset while waiting, dropping reply");
            return SendOutcome::Discarded;
        };
        self.notify(&snapshot);

        if replied {
            SendOutcome::Replied(reply)
        } else {
            SendOutcome::Failed(reply)
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut ConversationState)) {
        let snapshot = {
            let mut inner = self.inner.lock();
            f(&mut inner.state);
            inner.state.clone()
        };
        self.notify(&snapshot);
    }

    fn notify(&self, state: &ConversationState) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(state);
        }
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Conversation")
            .field("messages", &inner.state.messages.len())
            .field("pending", &inner.state.pending)
            .field("unlocked", &inner.unlocked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionError, CompletionResult};
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, prompt: &str) -> CompletionResult<String> {
            Ok(format!("echo: {}", prompt))
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _prompt: &str) -> CompletionResult<String> {
            Err(CompletionError::EmptyResponse)
        }
    }

    /// Answers after one second.
    struct SlowBackend;

    #[async_trait]
    impl CompletionBackend for SlowBackend {
        async fn complete(&self, prompt: &str) -> CompletionResult<String> {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            Ok(format!("late: {}", prompt))
        }
    }

    fn unlocked(backend: Arc<dyn CompletionBackend>) -> Conversation {
        let conversation = Conversation::new(backend);
        conversation.unlock();
        conversation
    }

    #[tokio::test]
    async fn test_send_appends_user_then_reply() {
        let conversation = unlocked(Arc::new(EchoBackend));

        let outcome = conversation.send("  hello  ").await;
        assert_eq!(outcome, SendOutcome::Replied(Message::bot("echo: hello")));
        assert_eq!(
            conversation.messages(),
            vec![Message::user("hello"), Message::bot("echo: hello")]
        );
        assert!(!conversation.is_pending());
    }

    #[tokio::test]
    async fn test_blank_send_is_noop() {
        let conversation = unlocked(Arc::new(EchoBackend));

        for text in ["", "   ", "\n\t"] {
            assert_eq!(
                conversation.send(text).await,
                SendOutcome::Rejected(SendRejection::Empty)
            );
        }
        assert!(conversation.messages().is_empty());
        assert!(!conversation.is_pending());
    }

    #[tokio::test]
    async fn test_locked_conversation_rejects() {
        let conversation = Conversation::new(Arc::new(EchoBackend));

        assert_eq!(
            conversation.send("hi").await,
            SendOutcome::Rejected(SendRejection::Locked)
        );
        assert!(conversation.messages().is_empty());

        conversation.unlock();
        conversation.relock();
        assert!(!conversation.is_unlocked());
    }

    #[tokio::test]
    async fn test_failure_appends_single_apology() {
        let conversation = unlocked(Arc::new(FailingBackend));

        let outcome = conversation.send("hi").await;
        assert_eq!(
            outcome,
            SendOutcome::Failed(Message::bot(COMPLETION_FAILED_MESSAGE))
        );
        assert_eq!(
            conversation.messages(),
            vec![Message::user("hi"), Message::bot(COMPLETION_FAILED_MESSAGE)]
        );
        assert!(!conversation.is_pending());
    }

    #[tokio::test]
    async fn test_listener_sees_optimistic_user_message() {
        let conversation = unlocked(Arc::new(EchoBackend));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        conversation.set_listener(Box::new(move |state| {
            sink.lock().push((state.messages.len(), state.pending));
        }));

        conversation.send("hi").await;
        assert_eq!(*seen.lock(), vec![(1, true), (2, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_inflight_reply() {
        let conversation = unlocked(Arc::new(SlowBackend));
        let sending = tokio::spawn({
            let conversation = conversation.clone();
            async move { conversation.send("secret question").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(conversation.is_pending());

        conversation.clear();
        assert!(!conversation.is_pending());

        assert_eq!(sending.await.unwrap(), SendOutcome::Discarded);
        assert!(conversation.messages().is_empty());
        assert!(!conversation.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_relock_drops_inflight_reply() {
        let conversation = unlocked(Arc::new(SlowBackend));
        let sending = tokio::spawn({
            let conversation = conversation.clone();
            async move { conversation.send("hi").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        conversation.relock();
        assert_eq!(sending.await.unwrap(), SendOutcome::Discarded);
        assert_eq!(conversation.messages(), vec![Message::user("hi")]);
        assert!(!conversation.is_pending());
    }

    #[test]
    fn test_push_restore_clear() {
        let conversation = Conversation::new(Arc::new(EchoBackend));
        conversation.push(Message::bot("Welcome!"));
        assert_eq!(conversation.messages().len(), 1);

        conversation.restore(vec![Message::user("a"), Message::bot("b")]);
        assert_eq!(conversation.messages().len(), 2);

        conversation.clear();
        assert!(conversation.messages().is_empty());
    }
}
