//! Dynamic library loading for the native sampler.
//!
//! This module handles loading the ParaMonte shared library and extracting
//! the `runParaDRAM` entry point.

use crate::abi::{InputFileBuffer, LogFuncFn, RunParaDramFn, SamplerAdapter};
use crate::error::{SamplerError, SamplerResult};
use libloading::Library;
use std::path::Path;
use std::sync::Arc;

/// Name of the entry-point symbol.
pub const RUN_PARADRAM_SYMBOL: &str = "runParaDRAM";

/// Loaded sampler library with the extracted entry point.
pub struct ParaDramLibrary {
    /// The underlying dynamic library handle.
    #[allow(dead_code)]
    library: Library,

    /// Path to the library file.
    pub path: String,

    /// runParaDRAM function pointer.
    run_paradram: RunParaDramFn,
}

impl ParaDramLibrary {
    /// Load the sampler from a shared library file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.dll` (Windows), `.so` (Linux) or `.dylib` (macOS) file
    ///
    /// # Safety
    ///
    /// The library must export a `runParaDRAM` with the documented signature.
    /// A library exporting a different signature under that name causes
    /// undefined behavior on the first run.
    pub fn load<P: AsRef<Path>>(path: P) -> SamplerResult<Arc<Self>> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let format = LibraryFormat::from_path(path);
        if format == LibraryFormat::Unknown {
            tracing::warn!(path = %path_str, "Unrecognized shared library extension");
        }

        let library = unsafe { Library::new(path) }
            .map_err(|e| SamplerError::load_error(&path_str, e))?;

        let run_paradram: RunParaDramFn = unsafe {
            *library
                .get::<RunParaDramFn>(b"runParaDRAM\0")
                .map_err(|_| SamplerError::symbol_not_found(RUN_PARADRAM_SYMBOL))?
        };

        tracing::info!(path = %path_str, ?format, "Loaded ParaDRAM library");

        Ok(Arc::new(Self {
            library,
            path: path_str,
            run_paradram,
        }))
    }
}

impl SamplerAdapter for ParaDramLibrary {
    fn name(&self) -> &str {
        &self.path
    }

    fn run(&self, ndim: i32, log_func: LogFuncFn, input_file: &mut InputFileBuffer) -> i32 {
        let input_file_len = input_file.native_len();
        // SAFETY: the buffer outlives the call and is NUL-terminated at
        // `input_file_len - 1`; `log_func` is a plain function pointer. An
        // unwind out of `log_func` passes through the sampler's frames, which
        // the "C-unwind" ABI permits.
        unsafe { (self.run_paradram)(ndim, log_func, input_file.as_mut_ptr(), input_file_len) }
    }
}

// ParaDramLibrary is Send + Sync because we only store a function pointer
// and the Library handle, which are thread-safe to access.
unsafe impl Send for ParaDramLibrary {}
unsafe impl Sync for ParaDramLibrary {}

/// Platform-specific library format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryFormat {
    /// Windows DLL.
    Dll,
    /// Linux/Unix shared object.
    So,
    /// macOS dynamic library.
    Dylib,
    /// Unknown format.
    Unknown,
}

impl LibraryFormat {
    /// Detect format from file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("dll") | Some("DLL") => Self::Dll,
            Some("so") => Self::So,
            Some("dylib") => Self::Dylib,
            _ => Self::Unknown,
        }
    }

    /// Format used by the current platform.
    pub fn native() -> Self {
        if cfg!(target_os = "windows") {
            Self::Dll
        } else if cfg!(target_os = "macos") {
            Self::Dylib
        } else if cfg!(unix) {
            Self::So
        } else {
            Self::Unknown
        }
    }

    /// Conventional file name of the sampler library for this format.
    pub fn default_library_name(self) -> Option<&'static str> {
        match self {
            Self::Dll => Some("libparamonte.dll"),
            Self::So => Some("libparamonte.so"),
            Self::Dylib => Some("libparamonte.dylib"),
            Self::Unknown => None,
        }
    }
}
