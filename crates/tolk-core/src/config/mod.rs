mod defaults;


use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::TolkError;
use crate::rate_limit::RateLimitConfig;
use defaults::*;

/// Chat completions endpoint used when no custom endpoint is configured.
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Placeholder for the target language name in the prompt template.
pub const LANGUAGE_PLACEHOLDER: &str = "{language}";

/// Placeholder for the user's language code in reply messages.
pub const LANGUAGE_CODE_PLACEHOLDER: &str = "{language_code}";

/// Top-level tolk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tolk: TolkConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub languages: LanguagesConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TolkConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for a daily rolling log file. Unset = stdout only.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Command token, without the leading slash.
    #[serde(default = "default_command")]
    pub command: String,
}

impl Default for TolkConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_dir: None,
            command: default_command(),
        }
    }
}

/// Rate limiting and reply texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Translations allowed per sender per window. Zero disables the limit.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Window length in seconds.
    #[serde(default = "default_rate_window")]
    pub rate_window: u64,
    /// Reply when a sender is over the limit. Empty = stay silent.
    #[serde(default = "default_rate_message")]
    pub rate_message: String,
    /// Reply when there is nothing to translate.
    #[serde(default = "default_empty_message")]
    pub empty_message: String,
    /// Reply for an unrecognized language code.
    #[serde(default = "default_unknown_message")]
    pub unknown_message: String,
    /// Reply when the translation service fails.
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            rate_window: default_rate_window(),
            rate_message: default_rate_message(),
            empty_message: default_empty_message(),
            unknown_message: default_unknown_message(),
            failure_message: default_failure_message(),
        }
    }
}

impl BotConfig {
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.rate_limit, self.rate_window)
    }

    /// Rate limit reply, or `None` when configured to stay silent.
    pub fn rate_reply(&self) -> Option<&str> {
        let msg = self.rate_message.trim();
        (!msg.is_empty()).then_some(msg)
    }

    pub fn empty_reply(&self, language_code: &str) -> String {
        self.empty_message
            .replace(LANGUAGE_CODE_PLACEHOLDER, language_code)
    }

    pub fn unknown_reply(&self, language_code: &str) -> String {
        self.unknown_message
            .replace(LANGUAGE_CODE_PLACEHOLDER, language_code)
    }
}

/// Language table configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguagesConfig {
    /// Replace the built-in table with `codes` instead of overlaying them.
    #[serde(default)]
    pub replace_list: bool,
    /// Extra or overriding codes (code → display name).
    #[serde(default)]
    pub codes: HashMap<String, String>,
}

/// OpenAI-compatible chat completions config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Lower values give more literal translations.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// System prompt template with a `{language}` placeholder.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Full URL of a compatible chat completions endpoint. Empty = OpenAI.
    #[serde(default)]
    pub custom_endpoint: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            prompt: default_prompt(),
            custom_endpoint: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OpenAiConfig {
    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        let custom = self.custom_endpoint.trim();
        if custom.is_empty() {
            DEFAULT_OPENAI_ENDPOINT
        } else {
            custom
        }
    }

    /// The system prompt for `language_name`.
    pub fn system_prompt(&self, language_name: &str) -> String {
        self.prompt.replace(LANGUAGE_PLACEHOLDER, language_name)
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Telegram user IDs allowed to use the bot. Empty = allow all.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl Config {
    /// Fill empty secrets from the environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.openai.api_key.is_empty() {
            if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
                self.openai.api_key = key;
            }
        }
        if let Some(tg) = self.channel.telegram.as_mut() {
            if tg.bot_token.is_empty() {
                if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()) {
                    tg.bot_token = token;
                }
            }
        }
    }

    /// Check the values the translation pipeline depends on.
    pub fn validate(&self) -> Result<(), TolkError> {
        let openai = &self.openai;
        if openai.api_key.trim().is_empty() {
            return Err(TolkError::Config(
                "openai.api_key is not set (config or OPENAI_API_KEY)".into(),
            ));
        }
        if openai.max_tokens == 0 {
            return Err(TolkError::Config("openai.max_tokens must be positive".into()));
        }
        if !(0.0..=1.0).contains(&openai.temperature) {
            return Err(TolkError::Config(format!(
                "openai.temperature must be within [0, 1], got {}",
                openai.temperature
            )));
        }
        if openai.timeout_secs == 0 {
            return Err(TolkError::Config("openai.timeout_secs must be positive".into()));
        }
        if !openai.prompt.contains(LANGUAGE_PLACEHOLDER) {
            return Err(TolkError::Config(format!(
                "openai.prompt must contain the {LANGUAGE_PLACEHOLDER} placeholder"
            )));
        }
        let endpoint = openai.endpoint();
        let url = url::Url::parse(endpoint).map_err(|e| {
            TolkError::Config(format!("openai.custom_endpoint is not a valid URL ({e}): {endpoint}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(TolkError::Config(format!(
                "openai.custom_endpoint is not an http(s) URL: {endpoint}"
            )));
        }
        if self.bot.rate_window == 0 {
            return Err(TolkError::Config("bot.rate_window must be positive".into()));
        }
        let command = self.tolk.command.trim();
        if command.is_empty() || command.contains(char::is_whitespace) || command.starts_with('/')
        {
            return Err(TolkError::Config(format!(
                "tolk.command must be a single word without '/', got {:?}",
                self.tolk.command
            )));
        }
        Ok(())
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Empty secrets are filled
/// from the environment; validation is left to the caller.
pub fn load(path: &str) -> Result<Config, TolkError> {
    let mut config = read(path)?;
    config.apply_env();
    Ok(config)
}

fn read(path: &str) -> Result<Config, TolkError> {
    let path = Path::new(path);
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| TolkError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    parse(&content)
}

/// Parse configuration from TOML text.
pub fn parse(content: &str) -> Result<Config, TolkError> {
    toml::from_str(content).map_err(|e| TolkError::Config(format!("failed to parse config: {}", e)))
}
