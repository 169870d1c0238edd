//! Runtime error types.

use hostbind_engine::ScriptError;

/// Errors surfaced by the runtime and its engines
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Failed to read a configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration parsed but is not usable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Engine operation failed
    #[error("{0}")]
    Script(#[from] ScriptError),
}

impl RuntimeError {
    /// Engine error, if this is one
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            RuntimeError::Script(err) => Some(err),
            _ => None,
        }
    }

    /// Was execution interrupted?
    pub fn is_interrupt(&self) -> bool {
        self.script_error().map(ScriptError::is_interrupt).unwrap_or(false)
    }
}

/// Result alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
