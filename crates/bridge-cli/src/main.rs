//! ParaDRAM bridge CLI: drive sampler runs with built-in objective functions.
//!
//! The driver plays the host: it registers an objective in an in-process
//! script host and calls the bridge entry point exactly as a script would.

mod config;
mod objectives;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{BridgeConfig, Overrides};
use lib_bridge::{BridgeOptions, DispatchKind, SamplerBridge, ScriptHost};
use lib_sampler_ffi::{ParaDramLibrary, ReplaySampler, SamplerAdapter};
use lib_types::{HostFault, HostValue};
use objectives::Builtin;
use output::{ProbePoint, ProbeReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "paradram-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the native ParaDRAM sampler on a built-in objective
    Run {
        /// Path to a run configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Evaluate the objective through the bridge on points from a JSON file
    Probe {
        /// JSON file holding an array of points, each an array of numbers
        #[arg(short, long)]
        points: PathBuf,

        /// Path to a run configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Evaluate points concurrently
        #[arg(long)]
        parallel: bool,

        /// Status code the replay sampler reports when done
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        status: i32,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// List the built-in objective functions
    Objectives,
}

#[derive(Args, Clone, Debug, Default)]
struct OverrideArgs {
    /// Native sampler library (.so, .dylib or .dll)
    #[arg(long)]
    library: Option<PathBuf>,

    /// Number of dimensions
    #[arg(long)]
    ndim: Option<i64>,

    /// Sampler input file forwarded to the sampler
    #[arg(long)]
    input_file: Option<String>,

    /// Built-in objective
    #[arg(long, value_enum)]
    objective: Option<Builtin>,

    /// Pass the objective as an anonymous function handle
    #[arg(long, conflicts_with = "function_name")]
    handle: bool,

    /// Global function name called in named dispatch
    #[arg(long)]
    function_name: Option<String>,

    /// Let sampler threads call into the host concurrently
    #[arg(long)]
    reentrant: bool,

    /// Force host calls to be serialized (true) or concurrent (false)
    #[arg(long)]
    serialize: Option<bool>,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            library: args.library,
            ndim: args.ndim,
            input_file: args.input_file,
            builtin: args.objective,
            dispatch: args.handle.then_some(DispatchKind::Handle),
            function_name: args.function_name,
            reentrant: args.reentrant.then_some(true),
            serialize_host_calls: args.serialize,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Run { config, overrides } => {
            run_native(config.as_deref(), overrides.into(), cli.format)?;
        }
        Commands::Probe { points, config, parallel, status, overrides } => {
            run_probe(&points, config.as_deref(), overrides.into(), parallel, status, cli.format)?;
        }
        Commands::Objectives => {
            output::write_objectives(&mut std::io::stdout().lock(), cli.format)?;
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<BridgeConfig> {
    let mut config = match path {
        Some(path) => {
            tracing::info!("Loading configuration from {:?}", path);
            config::load_config(path)?
        }
        None => BridgeConfig::default(),
    };
    config.apply(overrides);
    Ok(config)
}

/// Host, bridge options and call arguments for a configuration.
struct HostCall {
    host: Arc<ScriptHost>,
    options: BridgeOptions,
    rhs: Vec<HostValue>,
}

fn prepare_host_call(config: &BridgeConfig) -> HostCall {
    let host = ScriptHost::new().with_reentrant(config.host.reentrant);
    let builtin = config.objective.builtin;

    let mut rhs = vec![
        HostValue::from(if config.batch { 1.0 } else { 0.0 }),
        HostValue::from(config.ndim as f64),
        HostValue::from(config.input_file.as_str()),
    ];
    match config.objective.dispatch {
        DispatchKind::Named => builtin.register(&host, &config.objective.function_name),
        DispatchKind::Handle => rhs.push(builtin.anonymous_handle()),
    }

    HostCall {
        host: Arc::new(host),
        options: BridgeOptions {
            objective_name: config.objective.function_name.clone(),
            serialize_host_calls: config.host.serialize_host_calls,
        },
        rhs,
    }
}

fn invoke<S: SamplerAdapter>(call: &HostCall, sampler: S) -> Result<lib_bridge::RunSummary> {
    let bridge = SamplerBridge::new(call.host.clone(), sampler).with_options(call.options.clone());
    bridge
        .invoke(0, &call.rhs)
        .map_err(HostFault::from)
        .context("ParaDRAM run failed")
}

fn run_native(config_path: Option<&Path>, overrides: Overrides, format: OutputFormat) -> Result<()> {
    let config = resolve_config(config_path, overrides)?;
    config::validate_config(&config, true)?;

    let library_path = config
        .library
        .as_deref()
        .context("No sampler library configured")?;
    let library = ParaDramLibrary::load(library_path)
        .with_context(|| format!("Failed to load sampler library {:?}", library_path))?;

    tracing::info!(run = %config.name, builtin = config.objective.builtin.name(), "Starting run");
    let call = prepare_host_call(&config);
    let summary = invoke(&call, library)?;

    output::write_summary(&mut std::io::stdout().lock(), &summary, format)?;
    Ok(())
}

fn load_points(path: &Path) -> Result<Vec<Vec<f64>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read points file: {:?}", path))?;
    let points: Vec<Vec<f64>> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse points file: {:?}", path))?;
    if points.is_empty() {
        anyhow::bail!("Points file {:?} holds no points", path);
    }
    Ok(points)
}

fn run_probe(
    points_path: &Path,
    config_path: Option<&Path>,
    overrides: Overrides,
    parallel: bool,
    status: i32,
    format: OutputFormat,
) -> Result<()> {
    let points = load_points(points_path)?;

    let mut config = resolve_config(config_path, overrides)?;
    if config.ndim == 0 {
        config.ndim = points[0].len() as i64;
    }
    if config.input_file.is_empty() {
        config.input_file = points_path.display().to_string();
    }
    config::validate_config(&config, false)?;

    let sampler = ReplaySampler::new(points).parallel(parallel).with_status(status);
    let call = prepare_host_call(&config);
    let summary = invoke(&call, &sampler)?;

    let report = ProbeReport {
        summary,
        points: sampler
            .points()
            .iter()
            .zip(sampler.results())
            .map(|(point, log_func)| ProbePoint {
                point: point.clone(),
                log_func,
            })
            .collect(),
    };
    output::write_probe(&mut std::io::stdout().lock(), &report, format)?;
    Ok(())
}
