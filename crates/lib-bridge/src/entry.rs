//! Boundary entry point: the host-invocable procedure that starts a run.
//!
//! Host call shape, positions fixed:
//!
//! | # | Argument                                     |
//! |---|----------------------------------------------|
//! | 1 | invocation mode (0 = interactive, else batch)|
//! | 2 | ndim                                         |
//! | 3 | configuration file path (1 x n char)         |
//! | 4 | optional objective function handle           |
//!
//! Nothing is returned to the host; every failure is a host-level fault.

use crate::dispatch::{ActiveRun, CallTarget, DispatchKind, Dispatcher, DEFAULT_OBJECTIVE_NAME};
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostRuntime;
use lib_sampler_ffi::{InputFileBuffer, RunStatus, SamplerAdapter};
use lib_types::{HostFault, HostValue};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Input count selecting named-function dispatch.
pub const NAMED_MODE_ARGS: usize = 3;

/// Input count selecting function-handle dispatch.
pub const HANDLE_MODE_ARGS: usize = 4;

/// How the host session was started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// Desktop session; console output may need a platform console.
    #[default]
    Interactive,
    /// Command-line or batch session.
    Batch,
}

impl InvocationMode {
    /// Read the discriminator leniently: a non-zero numeric scalar means
    /// batch, anything else interactive.
    pub fn from_host(value: &HostValue) -> Self {
        match value.scalar() {
            Some(flag) if flag != 0.0 && !flag.is_nan() => Self::Batch,
            _ => Self::Interactive,
        }
    }
}

/// Options of a bridge instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Global function called in named-function mode.
    pub objective_name: String,

    /// Force (or lift) serialization of host calls; `None` asks the host.
    pub serialize_host_calls: Option<bool>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            objective_name: DEFAULT_OBJECTIVE_NAME.to_string(),
            serialize_host_calls: None,
        }
    }
}

/// A validated run, ready for the sampler.
#[derive(Debug)]
pub(crate) struct RunRequest {
    pub(crate) mode: InvocationMode,
    pub(crate) ndim: i32,
    pub(crate) input_file: InputFileBuffer,
    pub(crate) target: CallTarget,
}

impl RunRequest {
    /// Validate host arguments.
    ///
    /// Checks run in a fixed order and the first failure wins: input count,
    /// handle type, output count, ndim, path type, path shape, path
    /// conversion. In handle mode the handle is duplicated last, once every
    /// check has passed.
    pub(crate) fn from_host_args(nlhs: usize, rhs: &[HostValue], objective_name: &str) -> BridgeResult<Self> {
        if rhs.len() != NAMED_MODE_ARGS && rhs.len() != HANDLE_MODE_ARGS {
            return Err(BridgeError::InvalidArgumentCount { got: rhs.len() });
        }

        let handle = rhs.get(3);
        if let Some(handle) = handle {
            if !handle.is_class("function_handle") {
                return Err(BridgeError::InvalidHandleType {
                    class: handle.class_name().to_string(),
                });
            }
        }

        if nlhs > 0 {
            return Err(BridgeError::TooManyOutputs { requested: nlhs });
        }

        let mode = InvocationMode::from_host(&rhs[0]);
        let ndim = coerce_ndim(&rhs[1])?;
        let input_file = convert_input_file(&rhs[2])?;

        let target = match handle {
            Some(handle) => CallTarget::Handle(handle.duplicate()),
            None => CallTarget::Named(objective_name.to_string()),
        };

        tracing::debug!(
            ?mode,
            ndim,
            input_file = %input_file.path_lossy(),
            dispatch = ?target.kind(),
            "Validated run arguments"
        );

        Ok(Self {
            mode,
            ndim,
            input_file,
            target,
        })
    }
}

/// Read ndim as a positive integer that fits the native `int32`.
fn coerce_ndim(value: &HostValue) -> BridgeResult<i32> {
    let raw = value.scalar().ok_or_else(|| {
        let (rows, cols) = value.shape();
        BridgeError::invalid_dimension(format!(
            "expected a numeric scalar, got {} of size {rows}x{cols}",
            value.class_name()
        ))
    })?;

    if !raw.is_finite() || raw.fract() != 0.0 {
        return Err(BridgeError::invalid_dimension(format!("{raw} is not an integer")));
    }
    if raw < 1.0 || raw > f64::from(i32::MAX) {
        return Err(BridgeError::invalid_dimension(format!(
            "{raw} is outside 1..={}",
            i32::MAX
        )));
    }
    Ok(raw as i32)
}

/// Convert the configuration path into a native, NUL-terminated buffer.
fn convert_input_file(value: &HostValue) -> BridgeResult<InputFileBuffer> {
    let chars = value.as_char().ok_or_else(|| BridgeError::InputNotString {
        class: value.class_name().to_string(),
    })?;

    if chars.rows() != 1 {
        return Err(BridgeError::InputNotRowVector {
            rows: chars.rows(),
            cols: chars.cols(),
        });
    }

    let path = chars
        .to_utf8()
        .map_err(|e| BridgeError::conversion_failed(e.to_string()))?;
    InputFileBuffer::new(path).map_err(|e| BridgeError::conversion_failed(e.to_string()))
}

/// Platform console setup is reserved; only the decision is logged.
fn prepare_console(mode: InvocationMode) {
    tracing::debug!(?mode, "Console setup skipped");
}

/// Rust-side record of a finished run. The host receives nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub sampler: String,
    pub mode: InvocationMode,
    pub dispatch: DispatchKind,
    pub ndim: i32,
    pub evaluations: u64,
    pub status: RunStatus,
}

/// Binds a host runtime to a sampler.
pub struct SamplerBridge<H: HostRuntime, S: SamplerAdapter> {
    host: Arc<H>,
    sampler: S,
    options: BridgeOptions,
}

impl<H: HostRuntime, S: SamplerAdapter> SamplerBridge<H, S> {
    pub fn new(host: Arc<H>, sampler: S) -> Self {
        Self {
            host,
            sampler,
            options: BridgeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Host entry: validate `rhs`, run the sampler, map the outcome.
    ///
    /// `nlhs` is the number of outputs the host caller requested.
    pub fn invoke(&self, nlhs: usize, rhs: &[HostValue]) -> BridgeResult<RunSummary> {
        let request = RunRequest::from_host_args(nlhs, rhs, &self.options.objective_name)?;
        self.execute(request)
    }

    /// Like [`invoke`](Self::invoke), reporting failures as host faults.
    pub fn invoke_from_host(&self, nlhs: usize, rhs: &[HostValue]) -> Result<(), HostFault> {
        self.invoke(nlhs, rhs).map(|_| ()).map_err(HostFault::from)
    }

    /// Run a validated request to completion.
    ///
    /// Blocks until the sampler returns or a failed callback unwinds out of
    /// it. A latched failure takes precedence over the sampler's status code.
    fn execute(&self, request: RunRequest) -> BridgeResult<RunSummary> {
        let RunRequest {
            mode,
            ndim,
            mut input_file,
            target,
        } = request;

        prepare_console(mode);

        let dispatch = target.kind();
        let expected = usize::try_from(ndim).unwrap_or(0);
        let mut dispatcher = Dispatcher::new(self.host.clone(), target, expected);
        if let Some(serialize) = self.options.serialize_host_calls {
            dispatcher = dispatcher.serialize_host_calls(serialize);
        }
        let dispatcher = Arc::new(dispatcher);

        tracing::info!(
            sampler = self.sampler.name(),
            ndim,
            ?dispatch,
            objective = %dispatcher.target().describe(),
            serialized = dispatcher.serializes_host_calls(),
            "Starting ParaDRAM run"
        );

        let outcome = {
            let _run = ActiveRun::install(dispatcher.clone());
            panic::catch_unwind(AssertUnwindSafe(|| {
                self.sampler.run(ndim, dispatch.log_func(), &mut input_file)
            }))
        };
        drop(input_file);

        let evaluations = dispatcher.evaluations();
        if let Some(fault) = dispatcher.take_fault() {
            tracing::error!(evaluations, identifier = fault.identifier(), "ParaDRAM run aborted by objective");
            return Err(fault);
        }
        // Aborts always latch a fault first; any other unwind came from the
        // sampler itself.
        let code = match outcome {
            Ok(code) => code,
            Err(payload) => panic::resume_unwind(payload),
        };

        let status = RunStatus::from_code(code);
        if let RunStatus::Aborted(status) = status {
            tracing::error!(status, evaluations, "ParaDRAM run aborted");
            return Err(BridgeError::Runtime { status });
        }

        tracing::info!(evaluations, "ParaDRAM run completed");
        Ok(RunSummary {
            sampler: self.sampler.name().to_string(),
            mode,
            dispatch,
            ndim,
            evaluations,
            status,
        })
    }
}
