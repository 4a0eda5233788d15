//! Error types for sampler FFI operations.

use thiserror::Error;

/// Errors that can occur while preparing or loading the native sampler.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// Failed to load the shared library.
    #[error("Failed to load library '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// Required symbol not found in library.
    #[error("Symbol '{symbol}' not found in library")]
    SymbolNotFound { symbol: String },

    /// Configuration path does not fit the native `int32` length argument.
    #[error("Input file path of {len} bytes exceeds the native length limit")]
    InputFileTooLong { len: usize },

    /// Configuration path contains an interior NUL byte.
    #[error("Input file path contains a NUL byte at offset {position}")]
    InteriorNul { position: usize },
}

impl SamplerError {
    /// Create a load error.
    pub fn load_error(path: impl Into<String>, source: libloading::Error) -> Self {
        Self::LoadError {
            path: path.into(),
            source,
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.into(),
        }
    }
}

/// Result type for sampler FFI operations.
pub type SamplerResult<T> = Result<T, SamplerError>;
