//! Top-level error types for Snarkbot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors. These are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    MissingKey(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Durable document store errors.
///
/// Reads never produce these: a missing or corrupt document falls back to a
/// caller-supplied default. Only writes can fail.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to serialize document {name}: {source}")]
    Serialize {
        name: String,
        source: serde_json::Error,
    },

    #[error("failed to write document {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Generation backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("generation response was malformed: {0}")]
    MalformedResponse(String),

    #[error("generation response contained no text")]
    EmptyResponse,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
