//! Error types for the Pulse metrics engine.
//!
//! The analyzers themselves are total: insufficient data and unknown
//! identifiers are reported as `None`, never as errors. `EngineError` covers
//! the fallible edges around them: loading and validating configuration, and
//! parsing identifiers that arrive as strings from the API layer.

use thiserror::Error;

/// The main error type for the Pulse engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Error related to configuration values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error when an input value cannot be interpreted.
    #[error("Invalid input for '{field}': {message}")]
    InvalidInput {
        /// Name of the offending field or parameter
        field: String,
        /// Detailed error message
        message: String,
    },

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, EngineError>`.
///
/// # Examples
///
/// ```rust
/// use pulse_engine::error::Result;
///
/// fn load() -> Result<()> {
///     Ok(())
/// }
/// # load().unwrap();
/// ```
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new invalid input error for the given field.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<EngineError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| wrap(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(&f(), e.into()))
    }
}

/// Prefixes `msg` onto the error while keeping its kind.
fn wrap(msg: &str, err: EngineError) -> EngineError {
    match err {
        EngineError::Configuration(inner) => EngineError::configuration(format!("{msg}: {inner}")),
        EngineError::InvalidInput { field, message } => {
            EngineError::invalid_input(field, format!("{msg}: {message}"))
        }
        EngineError::Serialization(inner) => EngineError::Serialization(format!("{msg}: {inner}")),
        EngineError::Io(inner) => {
            EngineError::Io(std::io::Error::new(inner.kind(), format!("{msg}: {inner}")))
        }
        EngineError::Internal(inner) => EngineError::internal(format!("{msg}: {inner}")),
    }
}
