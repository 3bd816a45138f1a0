use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    /// Classifies an HTTP status returned by the artifact backend.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            400 | 409 | 413 | 422 => Some(Self::Validation),
            429 => Some(Self::RateLimited),
            500..=599 => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Structured error body. The backend may also answer with plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Extracts a human readable message from a raw error body.
    pub fn message_from_body(body: &str) -> Option<String> {
        if let Ok(parsed) = serde_json::from_str::<ApiError>(body) {
            return Some(parsed.message);
        }
        let trimmed = body.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
