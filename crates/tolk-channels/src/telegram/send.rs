//! Outbound Bot API calls.

use super::TelegramChannel;
use tolk_core::error::TolkError;
use tracing::{info, warn};

/// Telegram's per-message text limit.
pub(crate) const MAX_MESSAGE_LEN: usize = 4096;

impl TelegramChannel {
    /// Send a text message to a chat, optionally threaded under `reply_to`.
    ///
    /// Long texts are split; only the first chunk is threaded. Sent as plain text so
    /// translated content is never reinterpreted as markup.
    pub(crate) async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TolkError> {
        let url = format!("{}/sendMessage", self.base_url);

        for (i, chunk) in split_message(text, MAX_MESSAGE_LEN).into_iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if let (0, Some(message_id)) = (i, reply_to) {
                body["reply_parameters"] = serde_json::json!({
                    "message_id": message_id,
                    "allow_sending_without_reply": true,
                });
            }

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| TolkError::Channel(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                return Err(TolkError::Channel(format!(
                    "telegram send got {status}: {error_text}"
                )));
            }
        }

        Ok(())
    }

    /// Register bot commands with Telegram so users see an autocomplete menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(crate) async fn register_commands(&self) {
        if self.commands.is_empty() {
            return;
        }
        let commands: Vec<_> = self
            .commands
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();

        let url = format!("{}/setMyCommands", self.base_url);
        let body = serde_json::json!({ "commands": commands });
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("telegram: registered {} bot commands", commands.len());
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("telegram: failed to register bot commands: {body}");
            }
            Err(e) => {
                warn!("telegram: failed to register bot commands: {e}");
            }
        }
    }
}

/// Split a long message into chunks that respect Telegram's limit.
///
/// Prefers breaking after a newline and never splits inside a UTF-8 character.
pub(crate) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
