use std::path::PathBuf;
use thiserror::Error;

/// Whether a failure ends the run because of bad input, or because something
/// outside our control went wrong and a retry may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Fatal,
    Recoverable,
}

#[derive(Error, Debug)]
pub enum TubescopeError {
    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("{service} rejected the API key: {reason}")]
    InvalidCredentials { service: String, reason: String },

    #[error("Channel not found for handle {handle}")]
    ChannelNotFound { handle: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Shorts probe failed for {video_id}: {source}")]
    Probe {
        video_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Report generation failed: {reason}")]
    ReportFailed { reason: String },

    #[error("Export to {path} failed: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl TubescopeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TubescopeError::MissingApiKey { .. }
            | TubescopeError::InvalidCredentials { .. }
            | TubescopeError::ChannelNotFound { .. }
            | TubescopeError::InvalidInput { .. } => ErrorClass::Fatal,
            TubescopeError::Api { .. }
            | TubescopeError::Probe { .. }
            | TubescopeError::ReportFailed { .. }
            | TubescopeError::Export { .. }
            | TubescopeError::IoError(_)
            | TubescopeError::JsonError(_)
            | TubescopeError::ApiError(_) => ErrorClass::Recoverable,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.class() == ErrorClass::Recoverable
    }
}

pub type Result<T> = std::result::Result<T, TubescopeError>;
