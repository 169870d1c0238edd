//! Engine error taxonomy
//!
//! Binder-level errors (`AccessDenied`, `MissingMember`, `AmbiguousMember`,
//! `ArgumentConversion`, `NotSupported`, `Range`) are raised synchronously and
//! are catchable by script. Host failures surface as [`ExecutionFault`]s that
//! keep the whole causal chain across engines. `Interrupted` unwinds to the
//! host and is never catchable by script.

use std::fmt;

use hostbind_sdk::HostError;

use crate::value::ScriptValue;

/// Engine result type
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Why a value could not be converted to a host type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// The value is of a convertible kind but outside the target's range
    #[error("value {value} is outside the range of {target}")]
    Overflow {
        /// The offending value
        value: String,
        /// Target type name
        target: String,
    },

    /// The value's kind cannot be converted to the target type
    #[error("cannot convert {actual} to {target}")]
    Incompatible {
        /// Description of the script value
        actual: String,
        /// Target type name
        target: String,
    },
}

impl ConversionError {
    /// Overflow of `value` converting to `target`
    pub fn overflow(value: impl fmt::Display, target: impl fmt::Display) -> Self {
        ConversionError::Overflow {
            value: value.to_string(),
            target: target.to_string(),
        }
    }

    /// `actual` has no conversion to `target`
    pub fn incompatible(actual: impl fmt::Display, target: impl fmt::Display) -> Self {
        ConversionError::Incompatible {
            actual: actual.to_string(),
            target: target.to_string(),
        }
    }

    /// Is this an overflow?
    pub fn is_overflow(&self) -> bool {
        matches!(self, ConversionError::Overflow { .. })
    }
}

// ============================================================================
// Execution faults
// ============================================================================

/// What caused an [`ExecutionFault`]
#[derive(Debug, Clone)]
pub enum FaultCause {
    /// Host code failed
    Host(HostError),
    /// An error surfaced from a nested engine call
    Nested(Box<ScriptError>),
}

/// A host-side failure during a script-invoked host call
#[derive(Debug, Clone)]
pub struct ExecutionFault {
    message: String,
    cause: FaultCause,
}

impl ExecutionFault {
    /// Fault caused directly by host code
    pub fn host(error: HostError) -> Self {
        let message = match error.nested_ref::<ScriptError>() {
            Some(inner) => inner.innermost_message(),
            None => error.to_string(),
        };
        ExecutionFault {
            message,
            cause: FaultCause::Host(error),
        }
    }

    /// Fault wrapping an error that crossed from a nested engine call
    pub fn nested(inner: ScriptError) -> Self {
        ExecutionFault {
            message: inner.innermost_message(),
            cause: FaultCause::Nested(Box::new(inner)),
        }
    }

    /// Message of the innermost failure
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Immediate cause
    pub fn cause(&self) -> &FaultCause {
        &self.cause
    }

    /// Number of engine crossings in the chain, this one included
    pub fn depth(&self) -> usize {
        match &self.cause {
            FaultCause::Host(_) => 1,
            FaultCause::Nested(inner) => match inner.as_ref() {
                ScriptError::Execution(fault) => 1 + fault.depth(),
                _ => 2,
            },
        }
    }

    /// Host error at the bottom of the chain, if the chain ends in host code
    pub fn host_error(&self) -> Option<&HostError> {
        match &self.cause {
            FaultCause::Host(err) => Some(err),
            FaultCause::Nested(inner) => match inner.as_ref() {
                ScriptError::Execution(fault) => fault.host_error(),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// An error raised by script code itself
#[derive(Debug, Clone)]
pub struct ScriptFault {
    /// Error name (e.g. "Error", "SyntaxError")
    pub name: String,
    /// Message
    pub message: String,
    /// Document and position, if known
    pub location: Option<String>,
    /// Value passed to `throw`, if the fault came from one
    pub thrown: Option<ScriptValue>,
}

impl ScriptFault {
    /// Fault named `Error`
    pub fn new(message: impl Into<String>) -> Self {
        Self::named("Error", message)
    }

    /// Fault with an explicit error name
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        ScriptFault {
            name: name.into(),
            message: message.into(),
            location: None,
            thrown: None,
        }
    }

    /// Attach a location
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {} ({})", self.name, self.message, location),
            None => write!(f, "{}: {}", self.name, self.message),
        }
    }
}

// ============================================================================
// ScriptError
// ============================================================================

/// Errors surfaced by engine operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    /// The member exists but the requested operation is not permitted
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No visible member matches the name and arguments
    #[error("Object has no suitable member named '{0}'")]
    MissingMember(String),

    /// Several overloads match equally well
    #[error("Ambiguous match for member '{0}'")]
    AmbiguousMember(String),

    /// An argument could not be converted to its parameter type
    #[error("Invalid argument: {0}")]
    ArgumentConversion(ConversionError),

    /// The target does not support the operation
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Host code failed during a script-invoked call
    #[error("{0}")]
    Execution(ExecutionFault),

    /// Script code raised an error
    #[error("{0}")]
    Script(ScriptFault),

    /// Execution was interrupted by the host
    #[error("Script execution interrupted")]
    Interrupted,

    /// The object or its engine has been disposed
    #[error("Object has been disposed: {0}")]
    ObjectDisposed(String),

    /// Offset, index or length out of range
    #[error("Range error: {0}")]
    Range(String),
}

impl ScriptError {
    /// Script fault with `message`
    pub fn fault(message: impl Into<String>) -> Self {
        ScriptError::Script(ScriptFault::new(message))
    }

    /// Can script `try`/`catch` observe this error?
    pub fn is_catchable(&self) -> bool {
        !matches!(self, ScriptError::Interrupted)
    }

    /// Is this an interrupt?
    pub fn is_interrupt(&self) -> bool {
        matches!(self, ScriptError::Interrupted)
    }

    /// Message of the innermost failure in the chain
    pub fn innermost_message(&self) -> String {
        match self {
            ScriptError::Execution(fault) => fault.message().to_string(),
            ScriptError::Script(fault) => fault.message.clone(),
            other => other.to_string(),
        }
    }

    /// Short error name exposed to script handlers
    pub fn name(&self) -> &str {
        match self {
            ScriptError::AccessDenied(_) => "AccessDenied",
            ScriptError::MissingMember(_) => "MissingMember",
            ScriptError::AmbiguousMember(_) => "AmbiguousMember",
            ScriptError::ArgumentConversion(ConversionError::Overflow { .. }) => "OverflowError",
            ScriptError::ArgumentConversion(_) => "ArgumentConversion",
            ScriptError::NotSupported(_) => "NotSupported",
            ScriptError::Execution(_) => "ExecutionFault",
            ScriptError::Script(fault) => &fault.name,
            ScriptError::Interrupted => "Interrupted",
            ScriptError::ObjectDisposed(_) => "ObjectDisposed",
            ScriptError::Range(_) => "RangeError",
        }
    }
}

impl From<ConversionError> for ScriptError {
    fn from(err: ConversionError) -> Self {
        ScriptError::ArgumentConversion(err)
    }
}

/// Host code calling back into an engine propagates engine errors with `?`
impl From<ScriptError> for HostError {
    fn from(err: ScriptError) -> Self {
        HostError::nested(err)
    }
}

/// Translate a failure of host code called from script.
///
/// `own_interrupt` is whether the calling engine's interrupt flag is set: an
/// interrupt only unwinds the engine it was requested on, so an interrupt
/// raised by some other engine is an ordinary fault here.
pub(crate) fn from_host_call(error: HostError, own_interrupt: bool) -> ScriptError {
    if let Some(inner) = error.nested_ref::<ScriptError>() {
        if inner.is_interrupt() {
            return if own_interrupt {
                ScriptError::Interrupted
            } else {
                ScriptError::Execution(ExecutionFault::nested(inner.clone()))
            };
        }
        return ScriptError::Execution(ExecutionFault::nested(inner.clone()));
    }
    ScriptError::Execution(ExecutionFault::host(error))
}
