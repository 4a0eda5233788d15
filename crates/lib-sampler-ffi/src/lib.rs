//! # lib-sampler-ffi
//!
//! ABI definitions and loaders for the native ParaDRAM sampler.
//!
//! The sampler is an externally supplied shared library exposing a single
//! entry point, `runParaDRAM`, which drives a whole Monte Carlo run and calls
//! back into a log-density function of fixed signature. This crate provides:
//!
//! - The callback and entry-point signatures as Rust function pointer types
//! - An owned, NUL-terminated configuration path buffer
//! - Dynamic loading of the native library with `libloading`
//! - A replay sampler that evaluates the callback on known points, for dry
//!   runs and tests without the native library
//!
//! # Safety
//!
//! The native sampler is trusted to honor the callback contract: every call
//! passes a buffer of exactly `ndim` doubles that stays valid for the
//! duration of the call. Nothing here can verify that for a foreign library.

pub mod abi;
pub mod error;
pub mod loader;
pub mod replay;

pub use abi::{InputFileBuffer, LogFuncFn, RunParaDramFn, RunStatus, SamplerAdapter};
pub use error::{SamplerError, SamplerResult};
pub use loader::{LibraryFormat, ParaDramLibrary};
pub use replay::ReplaySampler;
