use thiserror::Error;

/// Top-level error type for the virobench library.
#[derive(Debug, Error)]
pub enum VirobenchError {
    #[error("Question error: {0}")]
    Question(#[from] QuestionError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors from constructing, rendering, or scoring a question.
#[derive(Debug, Error)]
pub enum QuestionError {
    #[error("Expected exactly 4 answer choices, got {got}")]
    ChoiceCount { got: usize },

    #[error("Correct answer index must be in 0..=3, got {got}")]
    CorrectIndex { got: usize },

    #[error("Question has no worked reasoning; only few-shot questions render an assistant turn")]
    NotFewShot,

    #[error("No answer letter recognized in model output (extracted {got:?})")]
    UnrecognizedAnswer { got: String },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Model returned no textual content")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed corpus row at line {line}: {reason}")]
    Record { line: u64, reason: String },
}

pub type Result<T> = std::result::Result<T, VirobenchError>;
