use std::fmt;

use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        AppError::Configuration(msg.into())
    }
}

/// Failure of a single source, carried inside its `FetchOutcome`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {status}: {url}")]
    HttpStatus { status: u16, url: String },
    #[error("malformed JSON body: {0}")]
    JsonParse(String),
    #[error("unexpected payload: {0}")]
    Schema(String),
    #[error("{0}")]
    Configuration(String),
}

/// Short classification printed in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    HttpStatus,
    JsonParse,
    Schema,
    Configuration,
}

impl FetchError {
    pub fn schema<T: Into<String>>(msg: T) -> Self {
        FetchError::Schema(msg.into())
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) => FetchErrorKind::Network,
            FetchError::HttpStatus { .. } => FetchErrorKind::HttpStatus,
            FetchError::JsonParse(_) => FetchErrorKind::JsonParse,
            FetchError::Schema(_) => FetchErrorKind::Schema,
            FetchError::Configuration(_) => FetchErrorKind::Configuration,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FetchErrorKind::Network => "NetworkError",
            FetchErrorKind::HttpStatus => "HttpStatusError",
            FetchErrorKind::JsonParse => "JsonParseError",
            FetchErrorKind::Schema => "SchemaError",
            FetchErrorKind::Configuration => "ConfigurationError",
        };
        f.write_str(label)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the API key, keep it out of diagnostics.
        if err.is_timeout() {
            return FetchError::Network("request timed out".to_string());
        }
        FetchError::Network(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::JsonParse(err.to_string())
    }
}
