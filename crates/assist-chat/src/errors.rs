/// Errors produced by the transport seam before they are normalized for the
/// public turn stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be issued (connection refused, DNS, timeout).
    #[error("request failed: {message}")]
    Request { message: String },
    /// The response arrived with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body failed mid-stream.
    #[error("stream read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates a request-level error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates a non-success-status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Creates a mid-stream read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }
}

/// Terminal turn failure sent through `TurnEvent::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum TurnFailure {
    /// The chat request was rejected before any event was framed.
    #[error("request failure: {message}")]
    Request { message: String },
    /// The response body failed while the stream was being drained.
    #[error("stream failure: {message}")]
    Stream { message: String },
    /// The turn was cancelled by the caller.
    #[error("turn cancelled")]
    Cancelled,
}

/// Errors returned by conversation-directory CRUD calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The request could not be issued.
    #[error("request failed: {0}")]
    Request(String),
    /// The server rejected the call with an error envelope.
    #[error("server rejected request ({status}): {code}")]
    Api { status: u16, code: String },
    /// The response body did not match the expected envelope.
    #[error("invalid response body: {0}")]
    Decode(String),
    /// Invalid input to the directory API.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input.
    #[error("validation error: {0}")]
    Validation(String),
    /// A turn is already in flight for this session.
    #[error("a turn is already in flight")]
    TurnInFlight,
    /// Terminal failure surfaced by a started turn.
    #[error(transparent)]
    TurnFailed(TurnFailure),
    /// Directory CRUD failure.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<TurnFailure> for ChatError {
    fn from(value: TurnFailure) -> Self {
        ChatError::TurnFailed(value)
    }
}

pub(crate) fn turn_failure_from_transport(err: &TransportError) -> TurnFailure {
    match err {
        TransportError::Request { .. } | TransportError::Status { .. } => TurnFailure::Request {
            message: err.to_string(),
        },
        TransportError::Read { message } => TurnFailure::Stream {
            message: message.clone(),
        },
    }
}
