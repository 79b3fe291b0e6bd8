use std::io;
use thiserror::Error;

/// Generic message shown when the backend reports a failure without text.
pub const FALLBACK_BACKEND_MESSAGE: &str = "Request failed";
pub const TRANSPORT_MESSAGE: &str = "Could not load data. Check your connection and try again.";
pub const UNEXPECTED_SHAPE_MESSAGE: &str = "Received an unexpected response from the server.";

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error), // Connection failures, timeouts, non-JSON bodies

    #[error("Backend error: {}", message.as_deref().unwrap_or(FALLBACK_BACKEND_MESSAGE))]
    Backend { message: Option<String> },

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("Unknown filter field: '{0}'")]
    UnknownFilter(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidFilterValue { key: String, reason: String },

    #[error("Page {requested} is out of range (1..={total_pages})")]
    PageOutOfRange { requested: u32, total_pages: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}

impl DeckError {
    /// Builds a backend failure, treating blank server text as absent.
    pub fn backend(message: Option<String>) -> Self {
        let message = message
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty());
        DeckError::Backend { message }
    }

    /// The string a user should see for this error.
    pub fn user_message(&self) -> String {
        match self {
            DeckError::Transport(_) => TRANSPORT_MESSAGE.to_owned(),
            DeckError::Backend { message } => message
                .clone()
                .unwrap_or_else(|| FALLBACK_BACKEND_MESSAGE.to_owned()),
            DeckError::UnexpectedShape(_) | DeckError::JsonError(_) => {
                UNEXPECTED_SHAPE_MESSAGE.to_owned()
            }
            other => other.to_string(),
        }
    }

    /// Transport failures are the only ones worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeckError::Transport(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e
                        .status()
                        .map(|s| matches!(s.as_u16(), 408 | 429 | 500 | 502 | 503 | 504))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }
}
