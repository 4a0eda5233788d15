//! Marshaling between native buffers and host values.
//!
//! Both directions go through an owned intermediate:
//!
//! ```text
//! sampler double[ndim] --copy--> OwnedPoint --move--> HostValue (ndim x 1)
//! host outputs --------------------------------------> f64
//! ```
//!
//! The copy is the ownership boundary. After it, nothing the host does can
//! reach the sampler's buffer, and the bridge holds no pointer into it.

use crate::error::{BridgeError, BridgeResult};
use lib_types::{HostError, HostValue, NumericArray};

/// A point copied out of native memory.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedPoint(Vec<f64>);

impl OwnedPoint {
    pub fn from_slice(values: &[f64]) -> Self {
        Self(values.to_vec())
    }

    /// Copy `ndim` doubles out of a sampler-owned buffer.
    ///
    /// Fails if `ndim` differs from `expected` or `point` is null; nothing
    /// is read in either case.
    ///
    /// # Safety
    ///
    /// When `ndim == expected` and `point` is non-null, `point` must be valid
    /// for reads of `ndim` doubles for the duration of this call.
    pub unsafe fn copy_from_raw(ndim: i32, point: *const f64, expected: usize) -> BridgeResult<Self> {
        if usize::try_from(ndim).ok() != Some(expected) {
            return Err(BridgeError::DimensionMismatch {
                expected,
                actual: i64::from(ndim),
            });
        }
        if point.is_null() {
            return Err(BridgeError::NullPoint);
        }
        // SAFETY: caller guarantees `point` covers `expected` doubles.
        let values = unsafe { std::slice::from_raw_parts(point, expected) };
        Ok(Self(values.to_vec()))
    }

    /// Read a point back out of an `n x 1` double column.
    pub fn from_host_value(value: &HostValue) -> BridgeResult<Self> {
        match value {
            HostValue::Numeric(array) if array.cols() == 1 => Ok(Self(array.as_slice().to_vec())),
            other => {
                let (rows, cols) = other.shape();
                Err(BridgeError::MalformedPoint {
                    class: other.class_name().to_string(),
                    rows,
                    cols,
                })
            }
        }
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Hand the storage to the host as an `ndim x 1` column.
    pub fn into_host_value(self) -> HostValue {
        HostValue::Numeric(NumericArray::column(self.0))
    }
}

/// Extract the log-density from the outputs of a host call.
pub fn scalar_from_outputs(function: &str, outputs: Vec<HostValue>) -> BridgeResult<f64> {
    let first = outputs.into_iter().next().ok_or_else(|| {
        BridgeError::dispatch_failed(
            function,
            HostError::TooFewOutputs {
                function: function.to_string(),
                requested: 1,
                returned: 0,
            },
        )
    })?;

    first.scalar().ok_or_else(|| {
        let (rows, cols) = first.shape();
        BridgeError::NonScalarResult {
            function: function.to_string(),
            class: first.class_name().to_string(),
            rows,
            cols,
        }
    })
}
