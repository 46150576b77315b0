//! Error handling and custom error types
//!
//! Provides unified error handling across the generator using thiserror.

use thiserror::Error;

/// Substrings that mark an upstream failure as rate-limit-like.
const RATE_LIMIT_MARKERS: [&str; 4] = ["429", "rate", "quota", "exhausted"];

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Rate limit exceeded after {attempts} attempts. Please wait 5 minutes and try again.")]
    RateLimitExceeded { attempts: u32 },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    /// True when the message carries one of the upstream rate-limit markers.
    ///
    /// Transport errors are judged by status code alone: their messages embed
    /// the request URL, and `:generateContent` contains "rate".
    pub fn is_rate_limited(&self) -> bool {
        if let Error::Http(e) = self {
            return e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS);
        }
        let message = self.to_string().to_lowercase();
        RATE_LIMIT_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
