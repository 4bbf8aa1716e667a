//! Conversation transcript and chat-completion client.
//!
//! A [`Conversation`] owns the widget transcript. Once unlocked (the user
//! authenticated, or authentication is disabled) each [`Conversation::send`]
//! appends the user's message, asks the [`CompletionBackend`] for a reply
//! and appends that reply, with at most one request in flight.
//!
//! # Usage
//!
//! ```ignore
//! use chat_completion::{CompletionClient, Conversation};
//!
//! let client = CompletionClient::from_config(&config, &secrets)?;
//! let conversation = Conversation::new(Arc::new(client));
//! conversation.unlock();
//! conversation.send("What is the capital of France?").await;
//! ```

mod client;
mod conversation;
mod error;

pub use client::{CompletionBackend, CompletionClient};
pub use conversation::{
    Conversation, ConversationListener, ConversationState, SendOutcome, SendRejection,
    COMPLETION_FAILED_MESSAGE,
};
pub use error::{CompletionError, CompletionResult};
