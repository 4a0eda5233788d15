//! # lib-types
//!
//! Host object model shared by the ParaDRAM bridge crates.
//!
//! The host environment hands values across the bridge as boxed, dynamically
//! typed objects. This crate models the handful of object kinds the bridge
//! ever sees:
//! - Column-major double matrices (points, scalars, dimensionality)
//! - Character arrays (the run configuration path)
//! - Function handles (anonymous objective functions)
//!
//! plus the error and fatal-signal types a host runtime reports.

pub mod error;
pub mod handle;
pub mod value;

pub use error::{HostError, HostFault, HostResult};
pub use handle::FunctionHandle;
pub use value::{CharArray, HostValue, NumericArray};
