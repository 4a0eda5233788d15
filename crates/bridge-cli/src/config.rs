//! Run configuration loading and validation.

use crate::objectives::Builtin;
use anyhow::{Context, Result};
use lib_bridge::{DispatchKind, DEFAULT_OBJECTIVE_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level run configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Run name, used in logs only.
    #[serde(default = "default_name")]
    pub name: String,

    /// Path to the native ParaDRAM shared library.
    pub library: Option<PathBuf>,

    /// Number of dimensions of the objective's domain.
    #[serde(default)]
    pub ndim: i64,

    /// Sampler configuration file, forwarded to the sampler uninterpreted.
    #[serde(default)]
    pub input_file: String,

    /// Whether the host session counts as batch (non-interactive).
    #[serde(default = "default_true")]
    pub batch: bool,

    /// Objective function selection.
    #[serde(default)]
    pub objective: ObjectiveConfig,

    /// Host runtime behavior.
    #[serde(default)]
    pub host: HostConfig,
}

fn default_name() -> String { "paradram".to_string() }
fn default_true() -> bool { true }

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            library: None,
            ndim: 0,
            input_file: String::new(),
            batch: true,
            objective: ObjectiveConfig::default(),
            host: HostConfig::default(),
        }
    }
}

/// Objective function configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectiveConfig {
    /// Built-in log-density to evaluate.
    #[serde(default = "default_builtin")]
    pub builtin: Builtin,

    /// Named global function, or an anonymous handle passed with the call.
    #[serde(default = "default_dispatch")]
    pub dispatch: DispatchKind,

    /// Global name the sampler calls in named mode.
    #[serde(default = "default_function_name")]
    pub function_name: String,
}

fn default_builtin() -> Builtin { Builtin::Normal }
fn default_dispatch() -> DispatchKind { DispatchKind::Named }
fn default_function_name() -> String { DEFAULT_OBJECTIVE_NAME.to_string() }

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            builtin: default_builtin(),
            dispatch: default_dispatch(),
            function_name: default_function_name(),
        }
    }
}

/// Host runtime configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Allow concurrent calls into the host from sampler threads.
    #[serde(default)]
    pub reentrant: bool,

    /// Override serialization of host calls; unset follows `reentrant`.
    #[serde(default)]
    pub serialize_host_calls: Option<bool>,
}

/// Command-line values taking precedence over the configuration file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub library: Option<PathBuf>,
    pub ndim: Option<i64>,
    pub input_file: Option<String>,
    pub builtin: Option<Builtin>,
    pub dispatch: Option<DispatchKind>,
    pub function_name: Option<String>,
    pub reentrant: Option<bool>,
    pub serialize_host_calls: Option<bool>,
}

impl BridgeConfig {
    /// Apply command-line overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(library) = overrides.library {
            self.library = Some(library);
        }
        if let Some(ndim) = overrides.ndim {
            self.ndim = ndim;
        }
        if let Some(input_file) = overrides.input_file {
            self.input_file = input_file;
        }
        if let Some(builtin) = overrides.builtin {
            self.objective.builtin = builtin;
        }
        if let Some(dispatch) = overrides.dispatch {
            self.objective.dispatch = dispatch;
        }
        if let Some(name) = overrides.function_name {
            self.objective.function_name = name;
        }
        if let Some(reentrant) = overrides.reentrant {
            self.host.reentrant = reentrant;
        }
        if overrides.serialize_host_calls.is_some() {
            self.host.serialize_host_calls = overrides.serialize_host_calls;
        }
    }
}

/// Load configuration from a file. JSON by extension, TOML otherwise.
pub fn load_config(path: &Path) -> Result<BridgeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: BridgeConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config as JSON: {:?}", path))?
    } else {
        toml::from_str(&content).with_context(|| "Failed to parse config as TOML")?
    };

    tracing::debug!(name = %config.name, "Loaded run configuration");
    Ok(config)
}

/// Check a configuration before any host or sampler work starts.
///
/// Only the driver's own settings are checked here; the values forwarded
/// into the bridge are validated again at the boundary.
pub fn validate_config(config: &BridgeConfig, require_library: bool) -> Result<()> {
    if config.ndim < 1 || config.ndim > i64::from(i32::MAX) {
        anyhow::bail!("ndim must be in 1..={} (got {})", i32::MAX, config.ndim);
    }

    let builtin = config.objective.builtin;
    if !builtin.supports(config.ndim as usize) {
        anyhow::bail!(
            "Objective '{}' requires ndim {} (got {})",
            builtin.name(),
            builtin.dimensions(),
            config.ndim
        );
    }

    if config.input_file.is_empty() {
        anyhow::bail!("input_file must not be empty");
    }

    if config.objective.dispatch == DispatchKind::Named
        && config.objective.function_name.trim().is_empty()
    {
        anyhow::bail!("objective.function_name must not be empty in named dispatch");
    }

    match &config.library {
        Some(library) if !library.exists() => {
            anyhow::bail!("Sampler library not found: {:?}", library);
        }
        None if require_library => {
            anyhow::bail!("No sampler library given (set `library` or pass --library)");
        }
        _ => {}
    }

    if !Path::new(&config.input_file).exists() {
        tracing::warn!(input_file = %config.input_file, "Sampler input file does not exist");
    }

    Ok(())
}
