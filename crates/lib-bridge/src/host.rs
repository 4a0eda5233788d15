//! The host runtime's dynamic call mechanism.
//!
//! [`HostRuntime`] is the only way the bridge reaches user code: a call by
//! name into the host's global function namespace, requesting a number of
//! outputs. Anonymous functions are reached through the host's generic
//! [`FEVAL`] entry with the handle as first argument.
//!
//! [`ScriptHost`] is an in-process implementation whose "scripts" are Rust
//! closures. It backs the command line driver and the tests.

use crate::sync::RecoverRwLock;
use lib_types::{FunctionHandle, HostError, HostResult, HostValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Name of the host's generic "invoke with arguments" function.
pub const FEVAL: &str = "feval";

/// A host environment that can call functions by name.
pub trait HostRuntime: Send + Sync + 'static {
    /// Call `function` with `args`, requesting `nargout` outputs.
    fn call(&self, function: &str, args: &[HostValue], nargout: usize)
        -> HostResult<Vec<HostValue>>;

    /// Whether `call` may run concurrently on several native threads.
    ///
    /// Calls into a host that returns `false` are serialized behind a
    /// single process-wide lock.
    fn is_reentrant(&self) -> bool {
        false
    }
}

/// In-process host with a global function namespace.
#[derive(Debug)]
pub struct ScriptHost {
    functions: RwLock<HashMap<String, FunctionHandle>>,
    reentrant: bool,
    calls: AtomicU64,
}

impl ScriptHost {
    /// Create an empty, non-reentrant host.
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            reentrant: false,
            calls: AtomicU64::new(0),
        }
    }

    /// Declare whether functions may be called from several threads at once.
    pub fn with_reentrant(mut self, reentrant: bool) -> Self {
        self.reentrant = reentrant;
        self
    }

    /// Define (or redefine) a global function.
    pub fn register<F>(&self, name: impl Into<String>, body: F)
    where
        F: Fn(&[HostValue], usize) -> HostResult<Vec<HostValue>> + Send + Sync + 'static,
    {
        let name = name.into();
        let handle = FunctionHandle::new(name.clone(), body);
        self.register_handle(name, handle);
    }

    /// Bind an existing handle under a global name.
    pub fn register_handle(&self, name: impl Into<String>, handle: FunctionHandle) {
        let name = name.into();
        tracing::debug!(function = %name, "Registered host function");
        self.functions.write_recover().insert(name, handle);
    }

    /// Remove a global function. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.functions.write_recover().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.read_recover().contains_key(name)
    }

    /// A function handle to a global function (`@name`).
    pub fn handle_for(&self, name: &str) -> Option<HostValue> {
        self.lookup(name).ok().map(HostValue::Function)
    }

    /// Total number of `call`s made so far, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, name: &str) -> HostResult<FunctionHandle> {
        self.functions
            .read_recover()
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::UndefinedFunction(name.to_string()))
    }

    fn feval(&self, args: &[HostValue], nargout: usize) -> HostResult<(String, Vec<HostValue>)> {
        let (target, rest) = args
            .split_first()
            .ok_or_else(|| HostError::raised("ScriptHost:feval", "Not enough input arguments."))?;

        let handle = match target {
            HostValue::Function(handle) => handle.clone(),
            HostValue::Char(name) => {
                let name = name
                    .to_utf8()
                    .map_err(|e| HostError::raised("ScriptHost:feval", e.to_string()))?;
                self.lookup(&name)?
            }
            other => {
                return Err(HostError::NotCallable {
                    class: other.class_name().to_string(),
                })
            }
        };

        let outputs = handle.invoke(rest, nargout)?;
        Ok((handle.name().to_string(), outputs))
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for ScriptHost {
    fn call(
        &self,
        function: &str,
        args: &[HostValue],
        nargout: usize,
    ) -> HostResult<Vec<HostValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (callee, outputs) = if function == FEVAL {
            self.feval(args, nargout)?
        } else {
            let handle = self.lookup(function)?;
            (function.to_string(), handle.invoke(args, nargout)?)
        };

        if outputs.len() < nargout {
            return Err(HostError::TooFewOutputs {
                function: callee,
                requested: nargout,
                returned: outputs.len(),
            });
        }
        Ok(outputs)
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}
