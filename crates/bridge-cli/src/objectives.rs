//! Built-in objective functions standing in for host scripts.

use lib_bridge::{OwnedPoint, ScriptHost};
use lib_types::{FunctionHandle, HostError, HostResult, HostValue};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Log-densities shipped with the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    /// Standard multivariate normal.
    Normal,
    /// Negated Rosenbrock valley, ndim >= 2.
    Rosenbrock,
    /// Negated Himmelblau function, ndim == 2.
    Himmelblau,
}

impl Builtin {
    pub const ALL: [Builtin; 3] = [Builtin::Normal, Builtin::Rosenbrock, Builtin::Himmelblau];

    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Rosenbrock => "rosenbrock",
            Self::Himmelblau => "himmelblau",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Normal => "log of the standard multivariate normal density",
            Self::Rosenbrock => "-sum(100 (x[i+1] - x[i]^2)^2 + (1 - x[i])^2)",
            Self::Himmelblau => "-((x^2 + y - 11)^2 + (x + y^2 - 7)^2)",
        }
    }

    /// Human-readable dimension constraint.
    pub fn dimensions(self) -> &'static str {
        match self {
            Self::Normal => ">= 1",
            Self::Rosenbrock => ">= 2",
            Self::Himmelblau => "2",
        }
    }

    pub fn supports(self, ndim: usize) -> bool {
        match self {
            Self::Normal => ndim >= 1,
            Self::Rosenbrock => ndim >= 2,
            Self::Himmelblau => ndim == 2,
        }
    }

    /// Evaluate at `x`. Callers check [`supports`](Self::supports) first.
    pub fn log_density(self, x: &[f64]) -> f64 {
        match self {
            Self::Normal => {
                let n = x.len() as f64;
                -0.5 * (n * (2.0 * PI).ln() + x.iter().map(|v| v * v).sum::<f64>())
            }
            Self::Rosenbrock => -x
                .windows(2)
                .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
                .sum::<f64>(),
            Self::Himmelblau => {
                let (a, b) = (x[0], x[1]);
                -((a * a + b - 11.0).powi(2) + (a + b * b - 7.0).powi(2))
            }
        }
    }

    /// Host-callable body: one `ndim x 1` double argument, one scalar output.
    pub fn host_body(self) -> impl Fn(&[HostValue], usize) -> HostResult<Vec<HostValue>> + Send + Sync + 'static {
        move |args, _nargout| {
            let arg = args.first().ok_or_else(|| {
                HostError::raised("bridge:notEnoughInputs", "Not enough input arguments.")
            })?;
            let point = OwnedPoint::from_host_value(arg)
                .map_err(|e| HostError::raised("bridge:badPoint", e.to_string()))?;
            if !self.supports(point.ndim()) {
                return Err(HostError::raised(
                    "bridge:unsupportedDimension",
                    format!("{} is not defined for ndim = {}", self.name(), point.ndim()),
                ));
            }
            Ok(vec![HostValue::from(self.log_density(point.as_slice()))])
        }
    }

    /// Bind the objective under a global name of `host`.
    pub fn register(self, host: &ScriptHost, function_name: &str) {
        host.register(function_name, self.host_body());
    }

    /// An anonymous handle to the objective, as a script would create with `@(x) ...`.
    pub fn anonymous_handle(self) -> HostValue {
        HostValue::Function(FunctionHandle::new(
            format!("@(x) {}(x)", self.name()),
            self.host_body(),
        ))
    }
}
