//! Error types reported by a host runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by the host's dynamic call mechanism or its object model.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum HostError {
    /// No function of this name exists in the host's global namespace.
    #[error("Undefined function '{0}'")]
    UndefinedFunction(String),

    /// A value was used as a call target but is not callable.
    #[error("Value of class '{class}' is not callable")]
    NotCallable { class: String },

    /// The callee returned fewer values than the caller requested.
    #[error("Function '{function}' returned {returned} value(s), {requested} requested")]
    TooFewOutputs {
        function: String,
        requested: usize,
        returned: usize,
    },

    /// The host function itself raised an error.
    #[error("{identifier}: {message}")]
    Raised { identifier: String, message: String },

    /// Array data did not match the declared shape.
    #[error("Shape {rows}x{cols} does not hold {len} elements")]
    ShapeMismatch { rows: usize, cols: usize, len: usize },
}

impl HostError {
    /// Create an error raised from inside a host function.
    pub fn raised(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            identifier: identifier.into(),
            message: message.into(),
        }
    }
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// A host-level fatal error: the signal that aborts the current host command
/// and prints `message` on the host's error channel under `identifier`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFault {
    /// Symbolic category, e.g. `ParaMonte:invalidNumInputs`.
    pub identifier: String,

    /// Human-readable description.
    pub message: String,
}

impl HostFault {
    pub fn new(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for HostFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.identifier)
    }
}

impl std::error::Error for HostFault {}
