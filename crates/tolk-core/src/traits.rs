use crate::{
    error::TolkError,
    message::{IncomingMessage, OutgoingMessage},
    outcome::TranslateError,
};
use async_trait::async_trait;

/// Translation backend trait.
///
/// The dispatcher only ever talks to this trait, so the HTTP client can be swapped
/// for a test double or another service.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Translate `text` into the language called `language_name` (e.g. "Spanish").
    ///
    /// Makes exactly one attempt. Never panics on service failures.
    async fn translate(&self, text: &str, language_name: &str) -> Result<String, TranslateError>;
}

/// Messaging Channel trait.
///
/// Every messaging platform implements this trait to receive and send messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    /// Returns a receiver that yields incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, TolkError>;

    /// Send a response back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), TolkError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), TolkError>;
}
