//! Function handles: opaque, host-managed references to callable values.

use crate::error::HostResult;
use crate::value::HostValue;
use std::fmt;
use std::sync::Arc;

/// Body of a host function: positional arguments and the number of
/// requested outputs in, output values out.
pub type HostFn = dyn Fn(&[HostValue], usize) -> HostResult<Vec<HostValue>> + Send + Sync;

/// A callable host value.
///
/// Cloning a handle shares the underlying body; the body is immutable, so a
/// handle captured once can be invoked from any thread for as long as one
/// clone is alive.
#[derive(Clone)]
pub struct FunctionHandle {
    name: Arc<str>,
    body: Arc<HostFn>,
}

impl FunctionHandle {
    /// Wrap a closure as a function handle.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[HostValue], usize) -> HostResult<Vec<HostValue>> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            body: Arc::new(body),
        }
    }

    /// Display name of the handle (`@(x) ...` or a function name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the handle.
    pub fn invoke(&self, args: &[HostValue], nargout: usize) -> HostResult<Vec<HostValue>> {
        (self.body)(args, nargout)
    }

    /// Number of live handles sharing this body.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.body)
    }

    /// Whether both handles refer to the same callable.
    pub fn same_callable(&self, other: &FunctionHandle) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for FunctionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_callable(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NumericArray;

    fn double_it() -> FunctionHandle {
        FunctionHandle::new("@(x) 2*x", |args, _nargout| {
            let x = args[0].scalar().unwrap_or(f64::NAN);
            Ok(vec![HostValue::Numeric(NumericArray::scalar(2.0 * x))])
        })
    }

    #[test]
    fn test_invoke() {
        let handle = double_it();
        let out = handle
            .invoke(&[HostValue::Numeric(NumericArray::scalar(3.5))], 1)
            .unwrap();
        assert_eq!(out[0].scalar(), Some(7.0));
    }

    #[test]
    fn test_clone_shares_body() {
        let handle = double_it();
        assert_eq!(handle.ref_count(), 1);

        let copy = handle.clone();
        assert_eq!(handle.ref_count(), 2);
        assert!(handle.same_callable(&copy));

        drop(copy);
        assert_eq!(handle.ref_count(), 1);
        assert_ne!(handle, double_it());
    }
}
