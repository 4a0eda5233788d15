//! # lib-bridge
//!
//! Objective-function bridge between a host scripting runtime and the
//! native ParaDRAM sampler.
//!
//! The sampler calls a flat `double f(int32_t, double[])` callback, possibly
//! millions of times and from several threads; the host only exposes user
//! functions through its own dynamic call mechanism. This crate sits in
//! between:
//!
//! - [`entry`]: validates the host call and runs the sampler once
//! - [`dispatch`]: named-function and function-handle dispatchers, their
//!   native trampolines and the process-wide run slot
//! - [`marshal`]: copies points out of native memory into host arrays and
//!   scalars back out
//! - [`host`]: the host runtime seam and an in-process script host
//!
//! # Safety
//!
//! Host panics never reach native code: trampolines catch them. The only
//! unwind that crosses the sampler's frames is the deliberate
//! [`RunAborted`] abort after a failed callback, which the entry point
//! catches. Every point is copied before the host sees it, and the
//! captured function handle is released when the run slot is cleared.

pub mod dispatch;
pub mod entry;
pub mod error;
pub mod host;
pub mod marshal;
mod sync;

pub use dispatch::{CallTarget, DispatchKind, Dispatcher, RunAborted, DEFAULT_OBJECTIVE_NAME};
pub use entry::{BridgeOptions, InvocationMode, RunSummary, SamplerBridge};
pub use error::{BridgeError, BridgeResult, ErrorCategory};
pub use host::{HostRuntime, ScriptHost, FEVAL};
pub use marshal::OwnedPoint;
