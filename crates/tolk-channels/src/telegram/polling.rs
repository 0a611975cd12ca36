//! Long-polling update loop and Channel trait implementation.

use super::types::{TgResponse, TgUpdate};
use super::{to_incoming, TelegramChannel};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tolk_core::{
    error::TolkError,
    message::{IncomingMessage, OutgoingMessage},
    traits::Channel,
};
use tracing::{error, info};

/// Server-side long-poll duration in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 60;

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, TolkError> {
        self.register_commands().await;

        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let allowed_users = self.config.allowed_users.clone();
        let last_update_id = self.last_update_id.clone();
        let mut shutdown = self.shutdown.subscribe();

        info!("telegram: starting long polling");

        tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let offset = last_update_id.lock().await.map(|id| id + 1);

                let mut url = format!("{base_url}/getUpdates?timeout={POLL_TIMEOUT_SECS}");
                if let Some(off) = offset {
                    url.push_str(&format!("&offset={off}"));
                }

                let poll = async {
                    let resp = client
                        .get(&url)
                        .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 5))
                        .send()
                        .await
                        .map_err(|e| format!("poll error: {e}"))?;
                    let body: TgResponse<Vec<TgUpdate>> = resp
                        .json()
                        .await
                        .map_err(|e| format!("parse error: {e}"))?;
                    if !body.ok {
                        return Err(format!(
                            "API error: {}",
                            body.description.unwrap_or_default()
                        ));
                    }
                    Ok(body.result.unwrap_or_default())
                };

                let result = tokio::select! {
                    r = poll => r,
                    _ = shutdown.changed() => {
                        info!("telegram: polling stopped");
                        return;
                    }
                };

                let updates = match result {
                    Ok(updates) => updates,
                    Err(e) => {
                        error!("telegram: {e} (retry in {backoff_secs}s)");
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
                            _ = shutdown.changed() => return,
                        }
                        backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        continue;
                    }
                };

                // Successful poll, reset backoff.
                backoff_secs = 1;

                if let Some(last_update) = updates.last() {
                    *last_update_id.lock().await = Some(last_update.update_id);
                }

                for update in updates {
                    let Some(incoming) = update
                        .message
                        .and_then(|msg| to_incoming(msg, &allowed_users))
                    else {
                        continue;
                    };

                    if tx.send(incoming).await.is_err() {
                        info!("telegram: receiver dropped, stopping poll");
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), TolkError> {
        let chat_id_str = message
            .reply_target
            .as_deref()
            .ok_or_else(|| TolkError::Channel("no reply_target on outgoing message".into()))?;

        let chat_id: i64 = chat_id_str.parse().map_err(|e| {
            TolkError::Channel(format!("invalid telegram chat_id '{chat_id_str}': {e}"))
        })?;

        let reply_to = match message.reply_to_id.as_deref() {
            Some(id) => Some(id.parse::<i64>().map_err(|e| {
                TolkError::Channel(format!("invalid telegram message_id '{id}': {e}"))
            })?),
            None => None,
        };

        self.send_message(chat_id, &message.text, reply_to).await
    }

    async fn stop(&self) -> Result<(), TolkError> {
        self.shutdown.send_replace(true);
        info!("telegram: channel stopped");
        Ok(())
    }
}
