use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Platform-specific message ID.
    pub id: String,
    /// Channel name (e.g. "telegram").
    pub channel: String,
    /// Platform-specific user ID.
    pub sender_id: String,
    /// Human-readable sender name.
    pub sender_name: Option<String>,
    /// Message text content.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// If this is a reply, the message it replies to.
    #[serde(default)]
    pub reply_to: Option<QuotedMessage>,
    /// Platform-specific target for routing the response (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
    /// Whether this message comes from a group chat.
    #[serde(default)]
    pub is_group: bool,
}

/// The body of a message that another message replies to, as resolved by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    /// Platform-specific message ID of the quoted message.
    pub id: String,
    /// Text body of the quoted message.
    pub text: String,
}

/// An outgoing message to send back through a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    /// Platform-specific target for routing (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
    /// Message ID this message should be threaded under, if any.
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

impl OutgoingMessage {
    /// Build a reply to `incoming`, threaded under `reply_to_id`.
    pub fn reply(incoming: &IncomingMessage, text: impl Into<String>, reply_to_id: &str) -> Self {
        Self {
            text: text.into(),
            reply_target: incoming.reply_target.clone(),
            reply_to_id: Some(reply_to_id.to_string()),
        }
    }
}
