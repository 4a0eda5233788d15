//! Result output formatting.

use crate::objectives::Builtin;
use crate::OutputFormat;
use anyhow::Result;
use lib_bridge::RunSummary;
use serde::Serialize;
use std::io::Write;

/// One evaluated point of a probe run.
#[derive(Clone, Debug, Serialize)]
pub struct ProbePoint {
    pub point: Vec<f64>,
    pub log_func: f64,
}

/// Summary and per-point results of a probe run.
#[derive(Clone, Debug, Serialize)]
pub struct ProbeReport {
    pub summary: RunSummary,
    pub points: Vec<ProbePoint>,
}

#[derive(Serialize)]
struct ObjectiveEntry {
    name: &'static str,
    ndim: &'static str,
    description: &'static str,
}

/// Write a run summary.
pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "ParaDRAM Run")?;
            writeln!(out, "============")?;
            writeln!(out, "Sampler:     {}", summary.sampler)?;
            writeln!(out, "Mode:        {:?}", summary.mode)?;
            writeln!(out, "Dispatch:    {:?}", summary.dispatch)?;
            writeln!(out, "ndim:        {}", summary.ndim)?;
            writeln!(out, "Evaluations: {}", summary.evaluations)?;
            writeln!(out, "Status:      {}", summary.status.code())?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
        }
        OutputFormat::Csv => {
            writeln!(out, "field,value")?;
            writeln!(out, "sampler,{}", summary.sampler)?;
            writeln!(out, "mode,{:?}", summary.mode)?;
            writeln!(out, "dispatch,{:?}", summary.dispatch)?;
            writeln!(out, "ndim,{}", summary.ndim)?;
            writeln!(out, "evaluations,{}", summary.evaluations)?;
            writeln!(out, "status,{}", summary.status.code())?;
        }
    }
    Ok(())
}

/// Write the results of a probe run.
pub fn write_probe<W: Write>(out: &mut W, report: &ProbeReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            write_summary(out, &report.summary, format)?;
            writeln!(out)?;
            for (i, p) in report.points.iter().enumerate() {
                writeln!(out, "  [{i:>4}] {:?} -> {}", p.point, p.log_func)?;
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
        }
        OutputFormat::Csv => {
            let ndim = report.points.first().map_or(0, |p| p.point.len());
            let header: Vec<String> = (1..=ndim).map(|i| format!("x{i}")).collect();
            writeln!(out, "index,{},log_func", header.join(","))?;
            for (i, p) in report.points.iter().enumerate() {
                let coords: Vec<String> = p.point.iter().map(f64::to_string).collect();
                writeln!(out, "{i},{},{}", coords.join(","), p.log_func)?;
            }
        }
    }
    Ok(())
}

/// List the built-in objectives.
pub fn write_objectives<W: Write>(out: &mut W, format: OutputFormat) -> Result<()> {
    let entries: Vec<ObjectiveEntry> = Builtin::ALL
        .iter()
        .map(|b| ObjectiveEntry {
            name: b.name(),
            ndim: b.dimensions(),
            description: b.description(),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            for e in &entries {
                writeln!(out, "{:<12} ndim {:<5} {}", e.name, e.ndim, e.description)?;
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        }
        OutputFormat::Csv => {
            writeln!(out, "name,ndim,description")?;
            for e in &entries {
                writeln!(out, "{},{},\"{}\"", e.name, e.ndim, e.description)?;
            }
        }
    }
    Ok(())
}
