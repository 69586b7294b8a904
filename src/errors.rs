/// Errors surfaced to the consumer through [`RequestState::error`](crate::state::RequestState::error).
///
/// Cancellation is not part of this enum: an aborted operation never reaches the consumer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("HTTP error! status: {status} {status_text}")]
    HttpStatus { status: u16, status_text: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

impl FetchError {
    /// Returns the HTTP status code when the failure came from a received response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Rejections produced by an [`HttpTransport`](crate::net::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The call was aborted through its cancellation token
    #[error("request aborted")]
    Aborted,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_abort(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::InvalidRequest(message) => FetchError::InvalidRequest { message },
            other => FetchError::Transport {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse {
            message: e.to_string(),
        }
    }
}

/// Validation failures from the configuration builders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("channel_capacity must be at least 1")]
    ZeroCapacity,

    #[error("user_agent must not be empty")]
    EmptyUserAgent,
}
