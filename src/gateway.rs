//! Gateway: fans in channel messages, runs commands, and sends replies.

use crate::commands::{self, Command};
use crate::dispatch::Dispatcher;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tolk_core::{
    config,
    languages::LanguageTable,
    message::{IncomingMessage, OutgoingMessage},
    rate_limit::RateLimiter,
    traits::Channel,
};
use tracing::{debug, error, info, warn};

/// How long shutdown waits for in-flight translations.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The main event loop connecting channels to the dispatcher.
pub struct Gateway {
    channels: HashMap<String, Arc<dyn Channel>>,
    dispatcher: Arc<Dispatcher>,
    limiter: Arc<RateLimiter>,
    languages: Arc<LanguageTable>,
    command: String,
    config_path: String,
}

impl Gateway {
    pub fn new(
        channels: HashMap<String, Arc<dyn Channel>>,
        dispatcher: Arc<Dispatcher>,
        limiter: Arc<RateLimiter>,
        languages: Arc<LanguageTable>,
        command: String,
        config_path: String,
    ) -> Self {
        Self {
            channels,
            dispatcher,
            limiter,
            languages,
            command,
            config_path,
        }
    }

    /// Run until ctrl-c or until every channel closes.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let limit = self.limiter.config();
        info!(
            "tolk gateway running | channels: {} | command: /{} | languages: {} | rate limit: {}",
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
            self.command,
            self.languages.len(),
            if limit.is_unlimited() {
                "off".to_string()
            } else {
                format!("{}/{}s", limit.max_requests, limit.window.as_secs())
            },
        );

        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = channel_rx.recv().await {
                    if tx.send(msg).await.is_err() {
                        info!("gateway: receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("gateway: channel started: {name}");
        }

        drop(tx);

        let sweep_handle = tokio::spawn(Self::sweep_loop(self.limiter.clone()));
        let reload_handle = self.clone().spawn_reload_on_hangup();

        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(incoming) = msg else {
                        info!("gateway: all channels closed");
                        break;
                    };
                    let gw = self.clone();
                    in_flight.spawn(async move {
                        gw.handle_message(incoming).await;
                    });
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        error!("gateway: message task failed: {e}");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("gateway: received shutdown signal");
                    break;
                }
            }
        }

        sweep_handle.abort();
        if let Some(handle) = reload_handle {
            handle.abort();
        }
        self.shutdown(in_flight).await;
        Ok(())
    }

    /// Stop channels, then give in-flight translations a bounded time to finish.
    async fn shutdown(&self, mut in_flight: JoinSet<()>) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("gateway: failed to stop channel {name}: {e}");
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            info!("gateway: waiting for {pending} in-flight translations");
            let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
                while in_flight.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(
                    "gateway: abandoning {} translations after {}s",
                    in_flight.len(),
                    DRAIN_TIMEOUT.as_secs()
                );
                in_flight.abort_all();
            }
        }
        info!("gateway: shutdown complete");
    }

    /// Periodically drop senders whose history has fully expired.
    async fn sweep_loop(limiter: Arc<RateLimiter>) {
        let config = limiter.config();
        if config.is_unlimited() {
            return;
        }
        let mut ticker = tokio::time::interval(config.window);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = limiter.sweep(Instant::now());
            if evicted > 0 {
                debug!("gateway: evicted {evicted} idle senders from rate limiter");
            }
        }
    }

    #[cfg(unix)]
    fn spawn_reload_on_hangup(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!("gateway: SIGHUP reload unavailable: {e}");
                return None;
            }
        };
        Some(tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                info!("gateway: SIGHUP received, reloading languages");
                self.reload_languages();
            }
        }))
    }

    #[cfg(not(unix))]
    fn spawn_reload_on_hangup(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        None
    }

    /// Re-read `[languages]` from the config file and swap the table.
    ///
    /// A missing or broken file keeps the current table.
    pub(crate) fn reload_languages(&self) {
        if !std::path::Path::new(&self.config_path).exists() {
            warn!(
                "gateway: config {} not found, keeping current languages",
                self.config_path
            );
            return;
        }
        match config::load(&self.config_path) {
            Ok(cfg) => self
                .languages
                .reload(&cfg.languages.codes, cfg.languages.replace_list),
            Err(e) => warn!("gateway: language reload failed, keeping current table: {e}"),
        }
    }

    async fn handle_message(&self, incoming: IncomingMessage) {
        let Some(reply) = self.respond(&incoming).await else {
            return;
        };
        let Some(channel) = self.channels.get(&incoming.channel) else {
            warn!("gateway: no channel named {}", incoming.channel);
            return;
        };
        if let Err(e) = channel.send(reply).await {
            error!("gateway: failed to send reply: {e}");
        }
    }

    /// Work out the reply to `incoming`, if any.
    pub(crate) async fn respond(&self, incoming: &IncomingMessage) -> Option<OutgoingMessage> {
        let command = Command::parse(&incoming.text, &self.command)?;
        let text = match command {
            Command::Help => commands::help_text(&self.command),
            Command::Languages => commands::languages_text(&self.languages),
            Command::Translate(args) => {
                let result = self
                    .dispatcher
                    .dispatch(&incoming.sender_id, args, incoming.reply_to.as_ref())
                    .await;
                let age_ms = (Utc::now() - incoming.timestamp).num_milliseconds();
                info!(
                    "gateway: {} for {} ({}) in {} {} chat, {age_ms}ms after send",
                    result.outcome.label(),
                    incoming.sender_name.as_deref().unwrap_or("unknown"),
                    incoming.sender_id,
                    incoming.channel,
                    if incoming.is_group { "group" } else { "private" },
                );
                let reply = result.reply?;
                let anchor = reply.reply_to_id.as_deref().unwrap_or(&incoming.id);
                return Some(OutgoingMessage::reply(incoming, reply.text, anchor));
            }
        };
        Some(OutgoingMessage::reply(incoming, text, &incoming.id))
    }
}
