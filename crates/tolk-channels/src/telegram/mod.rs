//! Telegram Bot API channel.
//!
//! Uses long polling via `getUpdates` and `sendMessage` for responses.
//! Docs: <https://core.telegram.org/bots/api>

mod polling;
pub(crate) mod send;
pub(crate) mod types;


use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tolk_core::{
    config::TelegramConfig,
    message::{IncomingMessage, QuotedMessage},
};
use tracing::warn;
use types::TgMessage;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram channel using the Bot API with long polling.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
    /// Commands advertised in the client's autocomplete menu.
    commands: Vec<(String, String)>,
    /// Tracks the last update_id to avoid reprocessing.
    last_update_id: Arc<Mutex<Option<i64>>>,
    shutdown: watch::Sender<bool>,
}

impl TelegramChannel {
    /// Create a new Telegram channel from config.
    pub fn new(config: TelegramConfig) -> Self {
        let base_url = format!("{TELEGRAM_API}/bot{}", config.bot_token);
        Self::with_base_url(config, base_url)
    }

    /// Create a channel talking to a custom Bot API server.
    pub fn with_base_url(config: TelegramConfig, base_url: impl Into<String>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            commands: Vec::new(),
            last_update_id: Arc::new(Mutex::new(None)),
            shutdown,
        }
    }

    /// Set the `(command, description)` pairs registered on start.
    pub fn with_commands(mut self, commands: Vec<(String, String)>) -> Self {
        self.commands = commands;
        self
    }
}

/// Convert a Telegram message into an [`IncomingMessage`].
///
/// Returns `None` for messages without a body, without a sender, from bots, or from
/// users outside `allowed_users` (when that list is non-empty).
pub(crate) fn to_incoming(msg: TgMessage, allowed_users: &[i64]) -> Option<IncomingMessage> {
    let text = msg.body()?.to_string();
    let user = msg.from.as_ref()?;
    if user.is_bot {
        return None;
    }

    if !allowed_users.is_empty() && !allowed_users.contains(&user.id) {
        warn!("telegram: ignoring message from unauthorized user {}", user.id);
        return None;
    }

    let reply_to = msg.reply_to_message.as_deref().and_then(|quoted| {
        quoted.body().map(|body| QuotedMessage {
            id: quoted.message_id.to_string(),
            text: body.to_string(),
        })
    });

    Some(IncomingMessage {
        id: msg.message_id.to_string(),
        channel: "telegram".to_string(),
        sender_id: user.id.to_string(),
        sender_name: Some(user.display_name()),
        text,
        timestamp: DateTime::<Utc>::from_timestamp(msg.date, 0)
            .filter(|_| msg.date > 0)
            .unwrap_or_else(Utc::now),
        reply_to,
        reply_target: Some(msg.chat.id.to_string()),
        is_group: msg.chat.is_group(),
    })
}
