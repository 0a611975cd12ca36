use thiserror::Error;

/// Top-level error type for tolk.
#[derive(Debug, Error)]
pub enum TolkError {
    /// Error from a translation provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}
