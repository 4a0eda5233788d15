//! Objective dispatch: the native callbacks handed to the sampler.
//!
//! The callback signature `double f(int32_t ndim, double point[])` has no
//! user-data slot, so the state of the current run lives in one
//! process-wide slot. [`ActiveRun`] installs a dispatcher there for the
//! duration of a sampler call and clears it on every exit path. A
//! process-wide run lock makes runs mutually exclusive; a nested run
//! started from inside an objective function deadlocks and is unsupported.
//!
//! Each [`DispatchKind`] has its own `extern "C-unwind"` trampoline. An
//! error or panic in the objective is latched on the dispatcher as the run's
//! fault, then the callback unwinds with a [`RunAborted`] payload through the
//! sampler's frames back to the entry point, which reports the fault. Any
//! callback already in flight on another thread unwinds the same way without
//! calling the host.

use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostRuntime, FEVAL};
use crate::marshal::{self, OwnedPoint};
use crate::sync::{RecoverLock, RecoverRwLock};
use lib_sampler_ffi::LogFuncFn;
use lib_types::HostValue;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Global function called in named-function mode.
pub const DEFAULT_OBJECTIVE_NAME: &str = "getLogFunc";

/// Dispatcher installed for the run in progress.
static ACTIVE_RUN: RwLock<Option<Arc<dyn ActiveObjective>>> = RwLock::new(None);

/// Held for the whole duration of a run.
static RUN_LOCK: Mutex<()> = Mutex::new(());

/// Serializes host calls for hosts that are not reentrant.
static HOST_CALL_LOCK: Mutex<()> = Mutex::new(());

/// Unwind payload that carries a run abort out through the sampler.
///
/// Sampler adapters written in Rust must not swallow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunAborted;

/// Leave the current run by unwinding out of the sampler.
fn abort_run() -> ! {
    panic::resume_unwind(Box::new(RunAborted))
}

/// How the objective function is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    /// Resolve a global function by name on every call.
    Named,
    /// Call a captured function handle through `feval`.
    Handle,
}

impl DispatchKind {
    /// Native callback for this kind.
    pub fn log_func(self) -> LogFuncFn {
        match self {
            Self::Named => named_log_func,
            Self::Handle => handle_log_func,
        }
    }
}

/// Call target of a run, fixed before the sampler starts.
#[derive(Clone, Debug, PartialEq)]
pub enum CallTarget {
    /// Global function name.
    Named(String),
    /// Duplicated function handle.
    Handle(HostValue),
}

impl CallTarget {
    pub fn kind(&self) -> DispatchKind {
        match self {
            Self::Named(_) => DispatchKind::Named,
            Self::Handle(_) => DispatchKind::Handle,
        }
    }

    /// Name for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Handle(HostValue::Function(handle)) => handle.name().to_string(),
            Self::Handle(other) => other.class_name().to_string(),
        }
    }
}

/// Object-safe view of a dispatcher, as stored in the run slot.
pub trait ActiveObjective: Send + Sync {
    fn kind(&self) -> DispatchKind;

    /// Evaluate the objective at a sampler-owned point.
    ///
    /// On failure the fault is latched and the call unwinds with
    /// [`RunAborted`]; it never returns a value for a failed evaluation.
    ///
    /// # Safety
    ///
    /// `point` must be null or valid for reads of `ndim` doubles for the
    /// duration of the call.
    unsafe fn log_func(&self, ndim: i32, point: *const f64) -> f64;
}

/// Marshals points into the host and evaluates one call target.
pub struct Dispatcher<H: HostRuntime> {
    host: Arc<H>,
    target: CallTarget,
    ndim: usize,
    serialize: bool,
    evaluations: AtomicU64,
    faulted: AtomicBool,
    fault: Mutex<Option<BridgeError>>,
}

impl<H: HostRuntime> Dispatcher<H> {
    /// Create a dispatcher. Host calls are serialized unless the host is
    /// reentrant.
    pub fn new(host: Arc<H>, target: CallTarget, ndim: usize) -> Self {
        let serialize = !host.is_reentrant();
        Self {
            host,
            target,
            ndim,
            serialize,
            evaluations: AtomicU64::new(0),
            faulted: AtomicBool::new(false),
            fault: Mutex::new(None),
        }
    }

    /// Override the host-call serialization policy.
    pub fn serialize_host_calls(mut self, serialize: bool) -> Self {
        self.serialize = serialize;
        self
    }

    pub fn target(&self) -> &CallTarget {
        &self.target
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn serializes_host_calls(&self) -> bool {
        self.serialize
    }

    /// Successful evaluations so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::SeqCst)
    }

    /// Evaluate the objective at an owned point.
    pub fn evaluate(&self, point: OwnedPoint) -> BridgeResult<f64> {
        if point.ndim() != self.ndim {
            return Err(BridgeError::DimensionMismatch {
                expected: self.ndim,
                actual: point.ndim() as i64,
            });
        }
        let arg = point.into_host_value();

        let (function, outputs) = {
            let _serialized: Option<MutexGuard<'_, ()>> =
                self.serialize.then(|| HOST_CALL_LOCK.lock_recover());
            match &self.target {
                CallTarget::Named(name) => (
                    name.as_str(),
                    self.host.call(name, std::slice::from_ref(&arg), 1),
                ),
                CallTarget::Handle(handle) => {
                    (FEVAL, self.host.call(FEVAL, &[handle.clone(), arg], 1))
                }
            }
        };

        let outputs = outputs.map_err(|source| BridgeError::dispatch_failed(function, source))?;
        let value = marshal::scalar_from_outputs(function, outputs)?;
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    /// Whether a callback of this run has failed.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    /// Take the first failure latched during the run.
    pub fn take_fault(&self) -> Option<BridgeError> {
        self.fault.lock_recover().take()
    }

    fn record_fault(&self, err: BridgeError) {
        let mut fault = self.fault.lock_recover();
        if fault.is_none() {
            tracing::error!(
                target_fn = %self.target.describe(),
                identifier = err.identifier(),
                error = %err,
                "Objective dispatch failed, aborting run"
            );
            *fault = Some(err);
        }
        self.faulted.store(true, Ordering::SeqCst);
    }
}

impl<H: HostRuntime> ActiveObjective for Dispatcher<H> {
    fn kind(&self) -> DispatchKind {
        self.target.kind()
    }

    unsafe fn log_func(&self, ndim: i32, point: *const f64) -> f64 {
        if self.is_faulted() {
            abort_run();
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: forwarded from the caller's contract.
            let point = unsafe { OwnedPoint::copy_from_raw(ndim, point, self.ndim) }?;
            self.evaluate(point)
        }));

        match outcome {
            Ok(Ok(value)) => {
                tracing::trace!(value, "Objective evaluated");
                value
            }
            Ok(Err(err)) => {
                self.record_fault(err);
                abort_run()
            }
            Err(payload) => {
                self.record_fault(BridgeError::ObjectivePanicked(panic_message(payload.as_ref())));
                abort_run()
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Guard for the process-wide run slot.
///
/// Holds the run lock while alive; dropping it clears the slot, which
/// releases the slot's reference to the dispatcher and any captured handle.
pub struct ActiveRun {
    _exclusive: MutexGuard<'static, ()>,
}

impl ActiveRun {
    /// Wait for any other run to finish, then install `objective`.
    pub fn install(objective: Arc<dyn ActiveObjective>) -> Self {
        let exclusive = RUN_LOCK.lock_recover();
        let kind = objective.kind();
        *ACTIVE_RUN.write_recover() = Some(objective);
        tracing::debug!(?kind, "Installed objective in run slot");
        Self {
            _exclusive: exclusive,
        }
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        ACTIVE_RUN.write_recover().take();
        tracing::debug!("Released run slot");
    }
}

/// Kind of the dispatcher currently installed, if any.
pub fn active_kind() -> Option<DispatchKind> {
    ACTIVE_RUN.read_recover().as_ref().map(|objective| objective.kind())
}

unsafe fn dispatch_active(kind: DispatchKind, ndim: i32, point: *const f64) -> f64 {
    let active = ACTIVE_RUN.read_recover().clone();
    match active {
        Some(objective) if objective.kind() == kind => {
            // SAFETY: forwarded from the sampler's calling contract.
            unsafe { objective.log_func(ndim, point) }
        }
        Some(objective) => {
            tracing::error!(
                callback = ?kind,
                installed = ?objective.kind(),
                "Callback does not match the installed objective"
            );
            f64::NAN
        }
        None => {
            tracing::error!(callback = ?kind, "Callback invoked outside of a run");
            f64::NAN
        }
    }
}

/// Named-function callback handed to the sampler.
///
/// Unwinds with [`RunAborted`] when the objective fails.
///
/// # Safety
///
/// `point` must be null or valid for reads of `ndim` doubles.
pub unsafe extern "C-unwind" fn named_log_func(ndim: i32, point: *mut f64) -> f64 {
    unsafe { dispatch_active(DispatchKind::Named, ndim, point) }
}

/// Function-handle callback handed to the sampler.
///
/// Unwinds with [`RunAborted`] when the objective fails.
///
/// # Safety
///
/// `point` must be null or valid for reads of `ndim` doubles.
pub unsafe extern "C-unwind" fn handle_log_func(ndim: i32, point: *mut f64) -> f64 {
    unsafe { dispatch_active(DispatchKind::Handle, ndim, point) }
}

#[cfg(test)]
pub(crate) fn lock_runs_for_test() -> MutexGuard<'static, ()> {
    RUN_LOCK.lock_recover()
}
