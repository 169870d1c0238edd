//! Error types raised by host code

use std::sync::Arc;

/// Result type for host member implementations
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by host-side code.
///
/// These are the failures of code that actually executed on the host. The
/// engine wraps them as execution faults when they surface in script.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// Host code threw an exception
    #[error("{message}")]
    Exception {
        /// Exception type name (e.g. "InvalidOperationException")
        type_name: String,
        /// Exception message
        message: String,
        /// Inner exception, if any
        inner: Option<Box<HostError>>,
    },

    /// Type mismatch during conversion of a host value
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Invalid argument
    #[error("Argument error: {0}")]
    Argument(String),

    /// Offset or length outside a buffer, array or view
    #[error("Range error: {0}")]
    Range(String),

    /// Member access on a null value
    #[error("Null reference: {0}")]
    NullReference(String),

    /// The object or its owning engine has been disposed
    #[error("Object has been disposed: {0}")]
    Disposed(String),

    /// An error raised by a script engine while host code was calling into it
    #[error("{0}")]
    Nested(Arc<dyn std::error::Error + Send + Sync>),
}

impl HostError {
    /// Create a generic host exception
    pub fn exception(message: impl Into<String>) -> Self {
        HostError::Exception {
            type_name: "Exception".to_string(),
            message: message.into(),
            inner: None,
        }
    }

    /// Create a host exception with an explicit type name
    pub fn exception_of(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        HostError::Exception {
            type_name: type_name.into(),
            message: message.into(),
            inner: None,
        }
    }

    /// Attach an inner cause to an exception. Other variants are returned unchanged.
    pub fn with_inner(self, cause: HostError) -> Self {
        match self {
            HostError::Exception {
                type_name, message, ..
            } => HostError::Exception {
                type_name,
                message,
                inner: Some(Box::new(cause)),
            },
            other => other,
        }
    }

    /// Wrap an engine error that passed through host code
    pub fn nested<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HostError::Nested(Arc::new(error))
    }

    /// Downcast a nested engine error
    pub fn nested_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            HostError::Nested(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Exception type name, or the variant name for non-exception errors
    pub fn type_name(&self) -> &str {
        match self {
            HostError::Exception { type_name, .. } => type_name,
            HostError::TypeMismatch { .. } => "InvalidCastException",
            HostError::Argument(_) => "ArgumentException",
            HostError::Range(_) => "RangeError",
            HostError::NullReference(_) => "NullReferenceException",
            HostError::Disposed(_) => "ObjectDisposedException",
            HostError::Nested(_) => "ScriptEngineException",
        }
    }
}

impl From<String> for HostError {
    fn from(s: String) -> Self {
        HostError::exception(s)
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        HostError::exception(s)
    }
}
