use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the network server's device management API, mapped to causes an operator can act on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Authentication failed: API token is invalid or missing")]
    Unauthenticated,
    #[error("Permission denied: API token does not have the required permissions")]
    PermissionDenied,
    #[error("Device already exists in ChirpStack")]
    AlreadyExists,
    #[error("Invalid data: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("ChirpStack server is unavailable: {0}")]
    Unavailable(String),
    #[error("ChirpStack server did not respond in time")]
    DeadlineExceeded,
    #[error("Unexpected response [{status}]: {details}")]
    Unexpected { status: u16, details: String },
    #[error("request error: {0}")]
    Transport(String),
    #[error("API token contains characters that are not allowed in a header")]
    InvalidToken,
    #[error("client is not connected")]
    NotConnected,
}

impl ClientError {
    /// Maps a non-success HTTP status of the REST gateway. `details` is the message of the gateway's error body.
    pub fn from_status(status: StatusCode, details: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthenticated,
            StatusCode::FORBIDDEN => ClientError::PermissionDenied,
            StatusCode::CONFLICT => ClientError::AlreadyExists,
            StatusCode::BAD_REQUEST => ClientError::InvalidArgument(details),
            StatusCode::NOT_FOUND => ClientError::NotFound(details),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => ClientError::Unavailable(details),
            StatusCode::GATEWAY_TIMEOUT => ClientError::DeadlineExceeded,
            _ => ClientError::Unexpected {
                status: status.as_u16(),
                details,
            },
        }
    }

    /// Connectivity problems that may go away by dialing again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Unavailable(_) | ClientError::DeadlineExceeded | ClientError::Transport(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::DeadlineExceeded
        } else if error.is_connect() {
            ClientError::Unavailable(error.to_string())
        } else {
            ClientError::Transport(error.to_string())
        }
    }
}

impl From<reqwest::header::InvalidHeaderValue> for ClientError {
    fn from(_: reqwest::header::InvalidHeaderValue) -> Self {
        ClientError::InvalidToken
    }
}
