//! Native signatures and argument types of the ParaDRAM entry point.

use crate::error::{SamplerError, SamplerResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ffi::{c_char, c_double, CString};
use std::sync::Arc;

/// Function signature of the log-density callback.
///
/// ```c
/// double getLogFunc(int32_t ndim, double Point[]);
/// ```
///
/// `point` holds exactly `ndim` doubles owned by the sampler for the
/// duration of the call. The callback may unwind to abort the run, so the
/// sampler library must be built with unwind tables.
pub type LogFuncFn = unsafe extern "C-unwind" fn(ndim: i32, point: *mut c_double) -> c_double;

/// Function signature of the sampler entry point.
///
/// ```c
/// int32_t runParaDRAM(
///     int32_t ndim,
///     double (*getLogFunc)(int32_t, double[]),
///     char    inputFile[],
///     int32_t inputFileLen
/// );
/// ```
pub type RunParaDramFn = unsafe extern "C-unwind" fn(
    ndim: i32,
    get_log_func: LogFuncFn,
    input_file: *mut c_char,
    input_file_len: i32,
) -> i32;

/// Owned, NUL-terminated configuration path handed to the sampler.
///
/// The sampler only borrows the buffer for the duration of `runParaDRAM`;
/// it is released when this value drops, whatever the run's outcome.
#[derive(Debug)]
pub struct InputFileBuffer {
    bytes: Vec<u8>,
    native_len: i32,
}

impl InputFileBuffer {
    /// Build a buffer from raw path bytes.
    pub fn new(path: impl Into<Vec<u8>>) -> SamplerResult<Self> {
        let cstring = CString::new(path).map_err(|e| SamplerError::InteriorNul {
            position: e.nul_position(),
        })?;
        Self::from_cstring(cstring)
    }

    /// Build a buffer from an already NUL-terminated string.
    pub fn from_cstring(path: CString) -> SamplerResult<Self> {
        let bytes = path.into_bytes_with_nul();
        let native_len = i32::try_from(bytes.len())
            .map_err(|_| SamplerError::InputFileTooLong { len: bytes.len() })?;
        Ok(Self { bytes, native_len })
    }

    /// Byte length including the terminating NUL.
    pub fn len_with_nul(&self) -> usize {
        self.bytes.len()
    }

    /// Length argument for the native call (includes the terminator).
    pub fn native_len(&self) -> i32 {
        self.native_len
    }

    /// Pointer for the native call. Valid while `self` is alive and not moved.
    pub fn as_mut_ptr(&mut self) -> *mut c_char {
        self.bytes.as_mut_ptr().cast()
    }

    /// Path bytes without the terminator.
    pub fn path_bytes(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    pub fn path_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.path_bytes())
    }
}

/// Terminal outcome of a sampler run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "code", rename_all = "snake_case")]
pub enum RunStatus {
    /// Status code 0.
    Success,
    /// Any non-zero status code.
    Aborted(i32),
}

impl RunStatus {
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            Self::Success
        } else {
            Self::Aborted(code)
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Aborted(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A sampler that can be driven with the fixed callback signature.
///
/// Implementations may call `log_func` any number of times, in any order,
/// from any number of threads, until `run` returns. A call to `log_func`
/// may unwind; implementations must let that unwind leave `run`.
pub trait SamplerAdapter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run one sampling job to completion and return its status code.
    fn run(&self, ndim: i32, log_func: LogFuncFn, input_file: &mut InputFileBuffer) -> i32;
}

impl<T: SamplerAdapter + ?Sized> SamplerAdapter for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, ndim: i32, log_func: LogFuncFn, input_file: &mut InputFileBuffer) -> i32 {
        (**self).run(ndim, log_func, input_file)
    }
}

impl<T: SamplerAdapter + ?Sized> SamplerAdapter for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, ndim: i32, log_func: LogFuncFn, input_file: &mut InputFileBuffer) -> i32 {
        (**self).run(ndim, log_func, input_file)
    }
}
