//! Results of a translation attempt.
//!
//! [`TranslateError`] is what a [`Translator`](crate::traits::Translator) returns on failure;
//! [`TranslationOutcome`] is the terminal result of one dispatch, covering both input errors
//! and provider failures.

use thiserror::Error;

/// Failure of a single call to the translation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The service rejected the credential (HTTP 401).
    #[error("authentication rejected by translation service")]
    Auth,

    /// The service is throttling us (HTTP 429).
    #[error("throttled by translation service")]
    Throttled,

    /// Timeout, connection failure, or other transport problem.
    #[error("network failure: {0}")]
    Network(String),

    /// Any other non-success response or unexpected failure.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Terminal result of one translate command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// The translated text.
    Success(String),
    /// The sender exhausted their quota for the current window.
    RateLimited,
    /// Neither trailing text nor a replied-to message was available.
    EmptyInput,
    /// The language code did not resolve.
    UnknownLanguage,
    AuthFailure,
    Throttled,
    NetworkFailure,
    UpstreamError(String),
}

impl TranslationOutcome {
    /// Whether this outcome is a provider failure (as opposed to success or an input/policy rejection).
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthFailure | Self::Throttled | Self::NetworkFailure | Self::UpstreamError(_)
        )
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited => "rate_limited",
            Self::EmptyInput => "empty_input",
            Self::UnknownLanguage => "unknown_language",
            Self::AuthFailure => "auth_failure",
            Self::Throttled => "throttled",
            Self::NetworkFailure => "network_failure",
            Self::UpstreamError(_) => "upstream_error",
        }
    }
}

impl From<Result<String, TranslateError>> for TranslationOutcome {
    fn from(result: Result<String, TranslateError>) -> Self {
        match result {
            Ok(text) => Self::Success(text),
            Err(e) => e.into(),
        }
    }
}

impl From<TranslateError> for TranslationOutcome {
    fn from(error: TranslateError) -> Self {
        match error {
            TranslateError::Auth => Self::AuthFailure,
            TranslateError::Throttled => Self::Throttled,
            TranslateError::Network(_) => Self::NetworkFailure,
            TranslateError::Upstream(detail) => Self::UpstreamError(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_error_maps_to_outcome() {
        assert_eq!(
            TranslationOutcome::from(TranslateError::Auth),
            TranslationOutcome::AuthFailure
        );
        assert_eq!(
            TranslationOutcome::from(TranslateError::Throttled),
            TranslationOutcome::Throttled
        );
        assert_eq!(
            TranslationOutcome::from(TranslateError::Network("timed out".into())),
            TranslationOutcome::NetworkFailure
        );
        assert_eq!(
            TranslationOutcome::from(TranslateError::Upstream("500: boom".into())),
            TranslationOutcome::UpstreamError("500: boom".into())
        );
    }

    #[test]
    fn test_ok_result_maps_to_success() {
        let outcome = TranslationOutcome::from(Ok::<_, TranslateError>("Hola".to_string()));
        assert_eq!(outcome, TranslationOutcome::Success("Hola".into()));
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_is_failure_only_for_provider_errors() {
        assert!(TranslationOutcome::AuthFailure.is_failure());
        assert!(TranslationOutcome::Throttled.is_failure());
        assert!(TranslationOutcome::NetworkFailure.is_failure());
        assert!(TranslationOutcome::UpstreamError(String::new()).is_failure());
        assert!(!TranslationOutcome::RateLimited.is_failure());
        assert!(!TranslationOutcome::EmptyInput.is_failure());
        assert!(!TranslationOutcome::UnknownLanguage.is_failure());
    }
}
