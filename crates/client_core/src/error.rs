use shared::error::BackendRejection;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Network, HTTP-layer or response decoding failure.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Non-success HTTP status; the message is the backend's error body when it sent one.
    #[error("backend responded {status}: {message}")]
    Status { status: u16, message: String },
    /// The backend explicitly reported a failure in an otherwise valid response.
    #[error("{0}")]
    Backend(String),
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("requested view is not available for this document")]
    UnsupportedView,
    #[error("no document selected")]
    NoDocument,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl ClientError {
    /// Failures below the job level, which polling retries instead of surfacing.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }

    /// Text suitable for showing to the user, without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(message)
            | Self::Backend(message)
            | Self::FetchFailed(message)
            | Self::InvalidPayload(message) => message.clone(),
            Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Wraps a failed fetch for the view renderer, keeping the upstream message.
    pub fn into_fetch_failed(self) -> Self {
        match self {
            Self::FetchFailed(_) | Self::UnsupportedView => self,
            other => Self::FetchFailed(other.user_message()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            return Self::Status {
                status: status.as_u16(),
                message: value.to_string(),
            };
        }
        Self::Transport(value.to_string())
    }
}

impl From<BackendRejection> for ClientError {
    fn from(value: BackendRejection) -> Self {
        Self::Status {
            status: value.status,
            message: value.message,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
