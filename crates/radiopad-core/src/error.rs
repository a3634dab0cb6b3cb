//! Error types for RadioPad.

use thiserror::Error;

/// Result type alias using RadioPad's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for RadioPad.
#[derive(Error, Debug)]
pub enum Error {
    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Network error: {0}")]
    Network(String),

    // Sound store errors
    #[error("Sound store error: {0}")]
    Store(String),

    #[error("Sound not found: {0}")]
    NotFound(String),

    // Audio errors
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    // Media resource errors
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    #[error("Seek rejected: {0}")]
    SeekRejected(String),

    #[error("No source loaded")]
    NoSource,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Player has shut down")]
    Closed,
}

/// HTTP-specific errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed with status {status}: {message}")]
    StatusError { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Returns true if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http(HttpError::ConnectionFailed(_) | HttpError::Timeout)
        )
    }

    /// Returns true if the store answered that the sound does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Http(HttpError::StatusError { status: 404, .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::Network("test".into()).is_retryable());
        assert!(Error::Http(HttpError::Timeout).is_retryable());
        assert!(!Error::InvalidArgument("test".into()).is_retryable());
        assert!(!Error::PlaybackRejected("autoplay".into()).is_retryable());
    }

    #[test]
    fn test_not_found() {
        let err = Error::Http(HttpError::StatusError {
            status: 404,
            message: "missing".into(),
        });
        assert!(err.is_not_found());
        assert!(Error::NotFound("sound 7".into()).is_not_found());
        assert!(!Error::Store("bad ack".into()).is_not_found());
        assert!(!Error::Closed.is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = Error::PlaybackRejected("autoplay blocked".into());
        assert_eq!(err.to_string(), "Playback rejected: autoplay blocked");
    }
}
