//! Host values: the boxed objects that cross the bridge.
//!
//! All arrays are stored column-major, matching the host's memory layout, so
//! an `ndim x 1` column is just `ndim` contiguous doubles.

use crate::error::{HostError, HostResult};
use crate::handle::FunctionHandle;
use serde::{Deserialize, Serialize};

/// Dense column-major matrix of doubles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericArray {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl NumericArray {
    /// Create a `rows x cols` array of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create an `n x 1` column that takes ownership of `data`.
    pub fn column(data: Vec<f64>) -> Self {
        Self {
            rows: data.len(),
            cols: 1,
            data,
        }
    }

    /// Create a `1 x 1` array.
    pub fn scalar(value: f64) -> Self {
        Self {
            rows: 1,
            cols: 1,
            data: vec![value],
        }
    }

    /// Create an array from column-major data.
    pub fn from_shape(rows: usize, cols: usize, data: Vec<f64>) -> HostResult<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(HostError::ShapeMismatch {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Column-major element storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// The single element of a `1 x 1` array.
    pub fn scalar_value(&self) -> Option<f64> {
        match self.data.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }
}

/// Column-major matrix of UTF-16 code units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharArray {
    rows: usize,
    cols: usize,
    units: Vec<u16>,
}

impl CharArray {
    /// Create a `1 x n` row holding `text`.
    pub fn row(text: &str) -> Self {
        let units: Vec<u16> = text.encode_utf16().collect();
        Self {
            rows: 1,
            cols: units.len(),
            units,
        }
    }

    /// Create a multi-row array, right-padding shorter rows with spaces.
    pub fn from_rows(rows: &[&str]) -> Self {
        let encoded: Vec<Vec<u16>> = rows.iter().map(|r| r.encode_utf16().collect()).collect();
        let cols = encoded.iter().map(Vec::len).max().unwrap_or(0);
        let mut units = vec![u16::from(b' '); rows.len() * cols];
        for (r, row) in encoded.iter().enumerate() {
            for (c, &unit) in row.iter().enumerate() {
                units[c * rows.len() + r] = unit;
            }
        }
        Self {
            rows: rows.len(),
            cols,
            units,
        }
    }

    /// Create an array from raw column-major code units.
    pub fn from_units(rows: usize, cols: usize, units: Vec<u16>) -> HostResult<Self> {
        if rows.checked_mul(cols) != Some(units.len()) {
            return Err(HostError::ShapeMismatch {
                rows,
                cols,
                len: units.len(),
            });
        }
        Ok(Self { rows, cols, units })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Decode the code units, read in column-major order, as UTF-8.
    pub fn to_utf8(&self) -> Result<String, std::string::FromUtf16Error> {
        String::from_utf16(&self.units)
    }
}

/// A boxed host object.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    /// Double-precision matrix.
    Numeric(NumericArray),

    /// Character matrix.
    Char(CharArray),

    /// Callable reference.
    Function(FunctionHandle),
}

impl HostValue {
    /// Host class name of this value.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "double",
            Self::Char(_) => "char",
            Self::Function(_) => "function_handle",
        }
    }

    /// Check the value's class by name.
    pub fn is_class(&self, class: &str) -> bool {
        self.class_name() == class
    }

    /// `(rows, cols)` of the value. Function handles are `1 x 1`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Numeric(a) => (a.rows(), a.cols()),
            Self::Char(a) => (a.rows(), a.cols()),
            Self::Function(_) => (1, 1),
        }
    }

    /// Deep copy of the value.
    ///
    /// Array storage is copied; a function handle's body is shared, so the
    /// duplicate keeps the callable alive independently of the original.
    pub fn duplicate(&self) -> HostValue {
        self.clone()
    }

    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            Self::Numeric(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<&CharArray> {
        match self {
            Self::Char(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionHandle> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The value of a `1 x 1` numeric array.
    pub fn scalar(&self) -> Option<f64> {
        self.as_numeric().and_then(NumericArray::scalar_value)
    }
}

impl From<NumericArray> for HostValue {
    fn from(value: NumericArray) -> Self {
        Self::Numeric(value)
    }
}

impl From<CharArray> for HostValue {
    fn from(value: CharArray) -> Self {
        Self::Char(value)
    }
}

impl From<FunctionHandle> for HostValue {
    fn from(value: FunctionHandle) -> Self {
        Self::Function(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Numeric(NumericArray::scalar(value))
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::Char(CharArray::row(value))
    }
}
