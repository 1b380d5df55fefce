//! Error types for payload decoding.

use thiserror::Error;

/// Error that can occur while decoding a single message.
///
/// Decoding errors are always scoped to one message: a consumer is expected
/// to log them and move on to the next delivery.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The declared `content_encoding` is not one we know how to read
    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    /// The payload was declared as JSON but did not parse
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl CodecError {
    /// Short, stable label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CodecError::UnsupportedEncoding(_) => "unsupported_encoding",
            CodecError::InvalidJson(_) => "invalid_json",
        }
    }
}
