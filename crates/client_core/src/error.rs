use reqwest::StatusCode;
use thiserror::Error;

/// Coarse classification used by views to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected client-side; no request was sent.
    Validation,
    /// The presented credential was missing, invalid or expired.
    Authorization,
    /// The requested artifact does not exist.
    NotFound,
    /// Network or server failure.
    Request,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("authorization failed: {message}")]
    Unauthorized { message: String },
    #[error("not found: {resource}")]
    NotFound { resource: String },
    #[error("request failed with status {status}: {message}")]
    Request { status: StatusCode, message: String },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("result discarded: superseded by a newer session operation")]
    Superseded,
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Request { .. }
            | Self::Transport(_)
            | Self::Superseded => ErrorKind::Request,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }
}
