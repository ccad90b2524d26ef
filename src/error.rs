// Client Error Types
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Postgres SQLSTATE for unique_violation, passed through by the backend
pub const UNIQUE_VIOLATION: &str = "23505";

/// Failure reported by a backend collaborator (table, auth or function call)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub code: Option<String>,
    pub message: String,
    pub status: Option<u16>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn unique_violation(message: impl Into<String>) -> Self {
        Self::with_code(UNIQUE_VIOLATION, message)
    }

    /// True when the backend rejected the write because of a uniqueness constraint
    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        RemoteError {
            code: None,
            message: err.to_string(),
            status,
        }
    }
}

/// Error body shapes returned by the backend's REST, auth and function endpoints
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: Option<Value>,
    pub message: Option<String>,
    pub msg: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_remote(self, status: u16) -> RemoteError {
        let code = match self.code {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let message = self
            .message
            .or(self.error_description)
            .or(self.msg)
            .or(self.error)
            .unwrap_or_else(|| format!("request failed with status {}", status));

        RemoteError {
            code,
            message,
            status: Some(status),
        }
    }
}

/// Failures surfaced by view operations. Each one has already been reported
/// to the notification sink by the time the caller sees it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Duplicate { message: String, source: RemoteError },

    #[error("{message}")]
    Remote { message: String, source: RemoteError },

    #[error("{0}")]
    Generation(String),

    #[error("No active session")]
    SignedOut,

    #[error("No record is being edited")]
    NotEditing,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    pub fn duplicate(message: impl Into<String>, source: RemoteError) -> Self {
        ClientError::Duplicate {
            message: message.into(),
            source,
        }
    }

    pub fn remote(message: impl Into<String>, source: RemoteError) -> Self {
        ClientError::Remote {
            message: message.into(),
            source,
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        ClientError::Generation(message.into())
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => "VALIDATION_ERROR",
            ClientError::Duplicate { .. } => "UNIQUE_VIOLATION",
            ClientError::Remote { .. } => "REMOTE_ERROR",
            ClientError::Generation(_) => "GENERATION_ERROR",
            ClientError::SignedOut => "UNAUTHENTICATED",
            ClientError::NotEditing => "NOT_EDITING",
        }
    }

    /// Whether the failure happened before any collaborator was contacted
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_) | ClientError::SignedOut | ClientError::NotEditing
        )
    }

    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "error": true,
            "message": self.to_string(),
            "code": self.error_code(),
        });

        if let ClientError::Duplicate { source, .. } | ClientError::Remote { source, .. } = self {
            response["remote"] = json!({
                "code": source.code,
                "message": source.message,
                "status": source.status,
            });
        }

        response
    }
}
