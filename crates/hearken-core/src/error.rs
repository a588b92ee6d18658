//! Error taxonomy for administrative operations
//!
//! Expected outcomes (`PermissionDenied`, `Validation`, `Compilation`,
//! `NotFound`) are returned to the caller as-is. `Storage` and
//! `RegistryInconsistency` indicate a broken collaborator or a bug; callers
//! should show [`ListenerError::public_message`] instead of the full error.

use crate::script::ScriptDiagnostic;
use crate::types::ListenerId;
use thiserror::Error;

/// Error raised by a [`ListenerStore`](crate::store::ListenerStore) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted data detected: {0}")]
    CorruptedData(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// How a transport layer should classify an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Forbidden,
    BadRequest,
    NotFound,
    Internal,
}

/// Errors returned by [`ListenerRepository`](crate::repository::ListenerRepository)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListenerError {
    /// Caller lacks the administrative capability
    #[error("Permission denied: {user} lacks {capability}")]
    PermissionDenied { user: String, capability: String },

    /// Malformed form input
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Script body failed to compile
    #[error("Compilation failed: {0}")]
    Compilation(ScriptDiagnostic),

    /// Unknown listener id
    #[error("Listener not found: {0}")]
    NotFound(ListenerId),

    /// Persistence collaborator failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Store and registry disagree after a failed mutation
    #[error("Registry inconsistency for listener {id} during {operation}: {detail}")]
    RegistryInconsistency {
        id: ListenerId,
        operation: &'static str,
        detail: String,
    },

    /// Unexpected internal failure (e.g. a panicked worker task)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for repository operations
pub type ListenerResult<T> = Result<T, ListenerError>;

impl ListenerError {
    /// Build a validation error for `field`
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Transport classification
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::PermissionDenied { .. } => StatusClass::Forbidden,
            Self::Validation { .. } | Self::Compilation(_) => StatusClass::BadRequest,
            Self::NotFound(_) => StatusClass::NotFound,
            Self::Storage(_) | Self::RegistryInconsistency { .. } | Self::Internal(_) => {
                StatusClass::Internal
            }
        }
    }

    /// Input field the error is attached to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::Compilation(diag) => Some(&diag.field),
            _ => None,
        }
    }

    /// Whether the caller can fix this by changing the request
    pub fn is_client_error(&self) -> bool {
        !matches!(self.status_class(), StatusClass::Internal)
    }

    /// Message safe to return to a client; internal failures are opaque
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "Internal error while processing listener request".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_error_maps_to_bad_request_with_field() {
        let err = ListenerError::Compilation(ScriptDiagnostic::new("unexpected symbol").at_line(1));
        assert_eq!(err.status_class(), StatusClass::BadRequest);
        assert_eq!(err.field(), Some("scriptBody"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_storage_error_is_opaque_to_clients() {
        let err: ListenerError = StorageError::Backend("disk I/O error at /var/db".into()).into();
        assert_eq!(err.status_class(), StatusClass::Internal);
        assert!(!err.public_message().contains("/var/db"));
        assert!(err.field().is_none());
    }

    #[test]
    fn test_permission_denied_is_forbidden() {
        let err = ListenerError::PermissionDenied {
            user: "bob".into(),
            capability: "ADMINISTER".into(),
        };
        assert_eq!(err.status_class(), StatusClass::Forbidden);
    }

    #[test]
    fn test_registry_inconsistency_hides_detail() {
        let err = ListenerError::RegistryInconsistency {
            id: ListenerId(4),
            operation: "create",
            detail: "selector full".into(),
        };
        assert_eq!(err.status_class(), StatusClass::Internal);
        assert!(!err.public_message().contains("selector"));
    }
}
