//! Error types for bridge operations.

use lib_types::{HostError, HostFault};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where in a run an error arises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed call from the host.
    Usage,
    /// String or number coercion failed.
    Conversion,
    /// The objective function failed during a callback.
    Dispatch,
    /// The sampler returned a non-zero status.
    Sampler,
}

/// Errors that can occur while validating, dispatching or running.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum BridgeError {
    /// Neither 3 (named mode) nor 4 (handle mode) input arguments.
    #[error("Input variable mismatch: expected 3 or 4 input arguments, got {got}")]
    InvalidArgumentCount { got: usize },

    /// Input #4 is present but not callable.
    #[error("Input #4 must be a function handle, got a value of class '{class}'")]
    InvalidHandleType { class: String },

    /// The caller asked for return values; the bridge produces none.
    #[error("Too many output arguments: {requested} requested, the sampler returns none")]
    TooManyOutputs { requested: usize },

    /// Input #2 cannot be read as a positive integer scalar.
    #[error("Input #2 (ndim) must be a positive integer scalar: {reason}")]
    InvalidDimension { reason: String },

    /// Input #3 is not a character array.
    #[error("Input #3 must be a string, got a value of class '{class}'")]
    InputNotString { class: String },

    /// Input #3 is a character array but not a single row.
    #[error("Input #3 must be a row vector, got a {rows}x{cols} character array")]
    InputNotRowVector { rows: usize, cols: usize },

    /// Input #3 could not be converted to a native string.
    #[error("Could not convert input #3 to a native string: {reason}")]
    StringConversionFailed { reason: String },

    /// A host value could not be read back as a point.
    #[error("Expected an ndim x 1 double column, got {class} of size {rows}x{cols}")]
    MalformedPoint {
        class: String,
        rows: usize,
        cols: usize,
    },

    /// The host call mechanism or the objective function failed.
    #[error("Objective function '{function}' failed: {source}")]
    DispatchFailed {
        function: String,
        #[source]
        source: HostError,
    },

    /// The objective returned something other than one numeric scalar.
    #[error("Objective function '{function}' must return a numeric scalar, got {class} of size {rows}x{cols}")]
    NonScalarResult {
        function: String,
        class: String,
        rows: usize,
        cols: usize,
    },

    /// The sampler called back with a different dimensionality than the run.
    #[error("Callback dimension mismatch: run has ndim={expected}, sampler passed {actual}")]
    DimensionMismatch { expected: usize, actual: i64 },

    /// The sampler called back with a null point buffer.
    #[error("Sampler passed a null point buffer")]
    NullPoint,

    /// The objective function panicked.
    #[error("Objective function panicked: {0}")]
    ObjectivePanicked(String),

    /// The sampler finished with a non-zero status.
    #[error("Runtime Error Occurred (sampler status {status})")]
    Runtime { status: i32 },
}

impl BridgeError {
    /// Create a dimension error.
    pub fn invalid_dimension(reason: impl Into<String>) -> Self {
        Self::InvalidDimension {
            reason: reason.into(),
        }
    }

    /// Create a string conversion error.
    pub fn conversion_failed(reason: impl Into<String>) -> Self {
        Self::StringConversionFailed {
            reason: reason.into(),
        }
    }

    /// Create a dispatch error.
    pub fn dispatch_failed(function: impl Into<String>, source: HostError) -> Self {
        Self::DispatchFailed {
            function: function.into(),
            source,
        }
    }

    /// Symbolic identifier raised to the host.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::InvalidArgumentCount { .. } => "ParaMonte:invalidNumInputs",
            Self::InvalidHandleType { .. } => "ParaMonte:invalidHandle",
            Self::TooManyOutputs { .. } => "ParaMonte:maxlhs",
            Self::InvalidDimension { .. } => "ParaMonte:invalidNdim",
            Self::InputNotString { .. } => "ParaMonte:inputNotString",
            Self::InputNotRowVector { .. } => "ParaMonte:inputNotVector",
            Self::StringConversionFailed { .. } => "ParaMonte:conversionFailed",
            Self::MalformedPoint { .. } => "ParaMonte:malformedPoint",
            Self::DispatchFailed { .. } => "ParaMonte:dispatchFailed",
            Self::NonScalarResult { .. } => "ParaMonte:nonScalarLogFunc",
            Self::DimensionMismatch { .. } => "ParaMonte:dimensionMismatch",
            Self::NullPoint => "ParaMonte:nullPoint",
            Self::ObjectivePanicked(_) => "ParaMonte:objectivePanicked",
            Self::Runtime { .. } => "ParaMonte:runtimeError",
        }
    }

    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgumentCount { .. }
            | Self::InvalidHandleType { .. }
            | Self::TooManyOutputs { .. }
            | Self::InputNotString { .. }
            | Self::InputNotRowVector { .. } => ErrorCategory::Usage,
            Self::InvalidDimension { .. }
            | Self::StringConversionFailed { .. }
            | Self::MalformedPoint { .. } => ErrorCategory::Conversion,
            Self::DispatchFailed { .. }
            | Self::NonScalarResult { .. }
            | Self::DimensionMismatch { .. }
            | Self::NullPoint
            | Self::ObjectivePanicked(_) => ErrorCategory::Dispatch,
            Self::Runtime { .. } => ErrorCategory::Sampler,
        }
    }

    /// Check if the error was detected before any native call was made.
    pub fn is_pre_native(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Usage | ErrorCategory::Conversion
        )
    }

    /// Convert to the host-level fatal signal.
    pub fn to_host_fault(&self) -> HostFault {
        HostFault::new(
            self.identifier(),
            format!("Internal ParaMonte library error occurred: {self}."),
        )
    }
}

impl From<BridgeError> for HostFault {
    fn from(err: BridgeError) -> Self {
        err.to_host_fault()
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
