//! Translate command pipeline: parse, resolve, rate limit, translate, reply.
//!
//! Every invocation ends in exactly one [`TranslationOutcome`]. The dispatcher keeps no
//! state between commands apart from the shared rate limiter.


use std::sync::Arc;
use std::time::Instant;
use tolk_core::{
    config::BotConfig,
    languages::LanguageTable,
    message::QuotedMessage,
    outcome::TranslationOutcome,
    rate_limit::RateLimiter,
    traits::Translator,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A validated unit of work for the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub sender_id: String,
    pub language_code: String,
    pub text: String,
}

/// What to send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Message to thread the reply under. `None` = the command message itself.
    pub reply_to_id: Option<String>,
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub outcome: TranslationOutcome,
    /// `None` only when rate limited with a silent rate message.
    pub reply: Option<Reply>,
}

/// Split the command's trailing text into a language code and optional text.
///
/// The code is the first whitespace-delimited token. The text is everything after the
/// single separating whitespace character, kept verbatim. A remainder that is only
/// whitespace counts as absent.
pub fn parse_args(args: &str) -> (&str, Option<&str>) {
    let args = args.trim_start();
    match args.split_once(char::is_whitespace) {
        Some((code, rest)) if !rest.trim().is_empty() => (code, Some(rest)),
        Some((code, _)) => (code, None),
        None => (args, None),
    }
}

/// Orchestrates translate commands against shared collaborators.
pub struct Dispatcher {
    languages: Arc<LanguageTable>,
    limiter: Arc<RateLimiter>,
    translator: Arc<dyn Translator>,
    bot: BotConfig,
}

impl Dispatcher {
    pub fn new(
        languages: Arc<LanguageTable>,
        limiter: Arc<RateLimiter>,
        translator: Arc<dyn Translator>,
        bot: BotConfig,
    ) -> Self {
        Self {
            languages,
            limiter,
            translator,
            bot,
        }
    }

    /// Run one translate command.
    ///
    /// `args` is the text after the command token. `quoted` is the message the command
    /// replies to, if any.
    pub async fn dispatch(
        &self,
        sender_id: &str,
        args: &str,
        quoted: Option<&QuotedMessage>,
    ) -> Dispatch {
        let request_id = Uuid::new_v4();
        let (code, inline_text) = parse_args(args);

        let Some(language) = self.languages.resolve(code) else {
            debug!("dispatch {request_id}: unknown language code {code:?} from {sender_id}");
            return self.finish(TranslationOutcome::UnknownLanguage, code, None);
        };

        // Inline text wins over the quoted message.
        let (text, anchor) = match (inline_text, quoted) {
            (Some(text), _) => (text, None),
            (None, Some(q)) if !q.text.trim().is_empty() => (q.text.as_str(), Some(q.id.as_str())),
            _ => {
                debug!("dispatch {request_id}: nothing to translate from {sender_id}");
                return self.finish(TranslationOutcome::EmptyInput, code, None);
            }
        };

        if !self.limiter.admit(sender_id, Instant::now()) {
            info!("dispatch {request_id}: rate limited {sender_id}");
            return self.finish(TranslationOutcome::RateLimited, code, None);
        }

        let request = TranslationRequest {
            sender_id: sender_id.to_string(),
            language_code: code.to_string(),
            text: text.to_string(),
        };
        let outcome = self.translate(request_id, &request, &language).await;
        self.finish(outcome, code, anchor)
    }

    async fn translate(
        &self,
        request_id: Uuid,
        request: &TranslationRequest,
        language: &str,
    ) -> TranslationOutcome {
        let started = Instant::now();
        let outcome = TranslationOutcome::from(
            self.translator.translate(&request.text, language).await,
        );
        let elapsed_ms = started.elapsed().as_millis();
        let provider = self.translator.name();

        match &outcome {
            TranslationOutcome::Success(_) => info!(
                "dispatch {request_id}: translated {} chars to {language} for {} via {provider} in {elapsed_ms}ms",
                request.text.chars().count(),
                request.sender_id
            ),
            TranslationOutcome::AuthFailure => {
                error!("dispatch {request_id}: {provider} rejected the API key")
            }
            TranslationOutcome::Throttled => {
                warn!("dispatch {request_id}: {provider} is throttling requests")
            }
            TranslationOutcome::NetworkFailure => warn!(
                "dispatch {request_id}: {provider} unreachable after {elapsed_ms}ms"
            ),
            TranslationOutcome::UpstreamError(detail) => {
                error!("dispatch {request_id}: {provider} error: {detail}")
            }
            _ => {}
        }
        outcome
    }

    /// Map an outcome to the user-facing reply.
    fn finish(
        &self,
        outcome: TranslationOutcome,
        code: &str,
        anchor: Option<&str>,
    ) -> Dispatch {
        let reply = match &outcome {
            TranslationOutcome::Success(translation) => Some(match anchor {
                Some(id) => Reply {
                    text: format!("{}: {translation}", code.to_uppercase()),
                    reply_to_id: Some(id.to_string()),
                },
                None => Reply {
                    text: translation.clone(),
                    reply_to_id: None,
                },
            }),
            TranslationOutcome::RateLimited => self.bot.rate_reply().map(|text| Reply {
                text: text.to_string(),
                reply_to_id: None,
            }),
            TranslationOutcome::EmptyInput => Some(Reply {
                text: self.bot.empty_reply(code),
                reply_to_id: None,
            }),
            TranslationOutcome::UnknownLanguage => Some(Reply {
                text: self.bot.unknown_reply(code),
                reply_to_id: None,
            }),
            TranslationOutcome::AuthFailure
            | TranslationOutcome::Throttled
            | TranslationOutcome::NetworkFailure
            | TranslationOutcome::UpstreamError(_) => Some(Reply {
                text: self.bot.failure_message.clone(),
                reply_to_id: None,
            }),
        };
        Dispatch { outcome, reply }
    }
}
