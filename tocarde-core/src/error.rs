use serde::Serialize;

/// A validation failure detected before any write. Every variant carries
/// the name of the input field it scopes and a human-readable message, so
/// the API layer can surface field-keyed errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
pub enum DomainError {
    #[error("{field}: {message}")]
    Forbidden { field: String, message: String },

    #[error("{field}: {message}")]
    InvalidState { field: String, message: String },

    #[error("{field}: {message}")]
    CapacityExceeded { field: String, message: String },

    #[error("{field}: {message}")]
    Conflict { field: String, message: String },
}

impl DomainError {
    pub fn forbidden(field: &str, message: impl Into<String>) -> Self {
        Self::Forbidden {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_state(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidState {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn capacity_exceeded(field: &str, message: impl Into<String>) -> Self {
        Self::CapacityExceeded {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn conflict(field: &str, message: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// The input field this error is scoped to.
    pub fn field(&self) -> &str {
        match self {
            Self::Forbidden { field, .. }
            | Self::InvalidState { field, .. }
            | Self::CapacityExceeded { field, .. }
            | Self::Conflict { field, .. } => field,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Forbidden { message, .. }
            | Self::InvalidState { message, .. }
            | Self::CapacityExceeded { message, .. }
            | Self::Conflict { message, .. } => message,
        }
    }
}
