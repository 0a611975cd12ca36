// --- Default value functions ---

pub(super) fn default_name() -> String {
    "tolk".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_command() -> String {
    "tr".to_string()
}
pub(super) fn default_rate_limit() -> u32 {
    10
}
pub(super) fn default_rate_window() -> u64 {
    3600
}
pub(super) fn default_rate_message() -> String {
    "You've reached the translation limit. Please try again later.".to_string()
}
pub(super) fn default_empty_message() -> String {
    "Nothing to translate into {language_code}. Add some text after the code, \
     or reply to a message with the command."
        .to_string()
}
pub(super) fn default_unknown_message() -> String {
    "Unknown language code: {language_code}".to_string()
}
pub(super) fn default_failure_message() -> String {
    "Failed to translate the message.".to_string()
}
pub(super) fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}
pub(super) fn default_max_tokens() -> u32 {
    2048
}
pub(super) fn default_temperature() -> f32 {
    0.4
}
pub(super) fn default_prompt() -> String {
    "Translate the following message to {language}. Write nothing except the translation."
        .to_string()
}
pub(super) fn default_timeout_secs() -> u64 {
    30
}
