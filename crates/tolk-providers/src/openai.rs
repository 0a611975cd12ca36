//! OpenAI-compatible chat completions translator.
//!
//! Works with OpenAI's API and any endpoint speaking the same protocol.
//! One request per call, bounded by a per-request timeout, no retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tolk_core::{
    config::OpenAiConfig, error::TolkError, outcome::TranslateError, traits::Translator,
};
use tracing::debug;

/// Longest slice of an error body carried into diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// Translator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    config: OpenAiConfig,
    timeout: Duration,
}

impl OpenAiTranslator {
    /// Create from config values with a fresh connection pool.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, TolkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TolkError::Provider(format!("openai: failed to build client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Create from config values, sharing an existing client.
    pub fn with_client(client: reqwest::Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            config: config.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.config.endpoint()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, text: &str, language_name: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(self.config.system_prompt(language_name)),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(text.to_string()),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatMessage>,
}

/// First choice's content, trimmed. `None` when missing or blank.
fn extract_text(response: &ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Map an HTTP failure status to a translation error.
fn classify_status(status: reqwest::StatusCode, body: &str) -> TranslateError {
    match status.as_u16() {
        401 => TranslateError::Auth,
        429 => TranslateError::Throttled,
        _ => TranslateError::Upstream(format!("{status}: {}", truncate(body, MAX_ERROR_BODY))),
    }
}

/// Map a reqwest error raised while sending or reading.
fn classify_transport(e: reqwest::Error) -> TranslateError {
    if e.is_builder() {
        TranslateError::Upstream(format!("invalid request: {e}"))
    } else if e.is_timeout() {
        TranslateError::Network(format!("timed out: {e}"))
    } else {
        TranslateError::Network(e.to_string())
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn translate(&self, text: &str, language_name: &str) -> Result<String, TranslateError> {
        let body = self.build_request(text, language_name);
        let start = Instant::now();
        let endpoint = self.endpoint();
        debug!(
            "openai: POST {endpoint} model={} language={language_name}",
            self.config.model
        );

        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(&self.config.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        // The per-request timeout also covers reading the body.
        let raw = resp.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            return Err(classify_status(status, &raw));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&raw).map_err(|e| {
            TranslateError::Upstream(format!("failed to parse response: {e}"))
        })?;

        let translation = extract_text(&parsed)
            .ok_or_else(|| TranslateError::Upstream("response contained no translation".into()))?;

        debug!(
            "openai: translated {} chars in {}ms",
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".into(),
            model: "gpt-test".into(),
            max_tokens: 256,
            temperature: 0.5,
            custom_endpoint: format!("{}/v1/chat/completions", server.uri()),
            ..Default::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
            "model": "gpt-test",
            "usage": {"total_tokens": 12}
        })
    }

    async fn translator_with(status: u16, body: serde_json::Value) -> (MockServer, OpenAiTranslator) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        let translator = OpenAiTranslator::from_config(&config_for(&server)).unwrap();
        (server, translator)
    }

    #[test]
    fn test_build_request_shape() {
        let cfg = OpenAiConfig {
            model: "gpt-4o-mini".into(),
            prompt: "Into {language}, please.".into(),
            ..Default::default()
        };
        let t = OpenAiTranslator::with_client(reqwest::Client::new(), &cfg);
        let req = t.build_request("Good morning", "Spanish");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "Into Spanish, please.");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "Good morning");
        assert_eq!(value["max_tokens"], 2048);
        assert_eq!(value["top_p"], 1.0);
        assert_eq!(value["frequency_penalty"], 0.0);
        assert_eq!(value["presence_penalty"], 0.0);
    }

    #[test]
    fn test_extract_text_variants() {
        let parse = |s: &str| serde_json::from_str::<ChatCompletionResponse>(s).unwrap();
        assert_eq!(
            extract_text(&parse(r#"{"choices":[{"message":{"role":"assistant","content":"  Hola \n"}}]}"#)),
            Some("Hola".into())
        );
        assert_eq!(extract_text(&parse(r#"{"choices":[]}"#)), None);
        assert_eq!(extract_text(&parse(r#"{}"#)), None);
        assert_eq!(
            extract_text(&parse(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)),
            None
        );
        assert_eq!(
            extract_text(&parse(r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#)),
            None
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // "é" is two bytes; cutting inside it backs off.
        assert_eq!(truncate("aé", 2), "a");
    }

    #[tokio::test]
    async fn test_translate_success_sends_expected_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-test",
                "max_tokens": 256,
                "temperature": 0.5,
                "messages": [
                    {"role": "system", "content": "Translate the following message to Spanish. Write nothing except the translation."},
                    {"role": "user", "content": "Good morning"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  Buenos días\n")))
            .expect(1)
            .mount(&server)
            .await;

        let t = OpenAiTranslator::from_config(&config_for(&server)).unwrap();
        let result = t.translate("Good morning", "Spanish").await;
        assert_eq!(result, Ok("Buenos días".to_string()));
    }

    #[tokio::test]
    async fn test_translate_401_is_auth_failure() {
        let (_server, t) = translator_with(401, json!({"error": {"message": "bad key"}})).await;
        assert_eq!(t.translate("hi", "French").await, Err(TranslateError::Auth));
    }

    #[tokio::test]
    async fn test_translate_429_is_throttled() {
        let (_server, t) = translator_with(429, json!({"error": {"message": "slow down"}})).await;
        assert_eq!(t.translate("hi", "French").await, Err(TranslateError::Throttled));
    }

    #[tokio::test]
    async fn test_translate_other_status_is_upstream_with_detail() {
        let (_server, t) = translator_with(503, json!({"error": "overloaded"})).await;
        match t.translate("hi", "French").await {
            Err(TranslateError::Upstream(detail)) => {
                assert!(detail.contains("503"), "{detail}");
                assert!(detail.contains("overloaded"), "{detail}");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_translate_empty_choices_is_upstream() {
        let (_server, t) = translator_with(200, json!({"choices": []})).await;
        assert!(matches!(
            t.translate("hi", "French").await,
            Err(TranslateError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_translate_malformed_body_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let t = OpenAiTranslator::from_config(&config_for(&server)).unwrap();
        match t.translate("hi", "French").await {
            Err(TranslateError::Upstream(detail)) => assert!(detail.contains("parse")),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_translate_timeout_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        let t = OpenAiTranslator::from_config(&config_for(&server))
            .unwrap()
            .with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let result = t.translate("hi", "French").await;
        assert!(matches!(result, Err(TranslateError::Network(_))), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_translate_connection_refused_is_network_failure() {
        let cfg = OpenAiConfig {
            api_key: "sk-test".into(),
            custom_endpoint: "http://127.0.0.1:1/v1/chat/completions".into(),
            ..Default::default()
        };
        let t = OpenAiTranslator::from_config(&cfg).unwrap();
        assert!(matches!(
            t.translate("hi", "French").await,
            Err(TranslateError::Network(_))
        ));
    }

    #[test]
    fn test_translator_name() {
        let t = OpenAiTranslator::with_client(reqwest::Client::new(), &OpenAiConfig::default());
        assert_eq!(t.name(), "openai");
        assert_eq!(t.endpoint(), tolk_core::config::DEFAULT_OPENAI_ENDPOINT);
        assert_eq!(t.model(), "gpt-3.5-turbo");
    }
}
