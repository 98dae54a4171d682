//! Error types for the Surge core library.

use thiserror::Error;

/// Main error type for Surge operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid message format or content
    #[error("Invalid message: {message}")]
    InvalidMessage { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The broker client rejected or failed a produce call
    #[error("Broker error: {message}")]
    Broker { message: String },

    /// The producer was used after `close()`
    #[error("Producer is closed")]
    Closed,

    /// A batch must carry at least one message
    #[error("Batch cannot be empty")]
    EmptyBatch,

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Shorthand for a broker error.
    pub fn broker(message: impl Into<String>) -> Self {
        Self::Broker { message: message.into() }
    }
}

/// Result type alias for Surge operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::EmptyBatch.to_string(), "Batch cannot be empty");
        assert_eq!(
            Error::broker("leader not available").to_string(),
            "Broker error: leader not available"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(Error::from(err), Error::Serialization { .. }));
    }
}
