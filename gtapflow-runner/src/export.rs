//! Report export: one CSV sheet per flow plus a JSON manifest.
//!
//! `CsvReportSink` writes under `{output_dir}/{version}_{year}/`:
//! - `{flow}.csv` with columns `region,paid,rec` in canonical order
//! - `reference_gdp.csv` with columns `region,gdp`
//! - `manifest.json`, a `RunManifest`
//!
//! The manifest carries a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use gtapflow_core::domain::RegionSeries;

use crate::config::FlowKind;
use crate::pipeline::{FlowResult, PipelineOutput};

/// Current schema version for `manifest.json`.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Per-flow summary recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub kind: FlowKind,
    pub scale_factor: f64,
    pub scale_paid: f64,
    pub scale_rec: f64,
    /// Output-unit totals after clamping.
    pub paid_total: f64,
    pub rec_total: f64,
    pub residual_imbalance: f64,
    pub paid_clamped: usize,
    pub rec_clamped: usize,
    pub paid_filled: usize,
    pub rec_filled: usize,
    pub paid_unfillable: usize,
    pub rec_unfillable: usize,
}

impl FlowSummary {
    fn from_result(flow: &FlowResult, unit_scale: f64) -> Self {
        Self {
            kind: flow.kind,
            scale_factor: flow.scale_factor,
            scale_paid: flow.scale_paid,
            scale_rec: flow.scale_rec,
            paid_total: flow.paid_total * unit_scale,
            rec_total: flow.rec_total * unit_scale,
            residual_imbalance: flow.residual_imbalance() * unit_scale,
            paid_clamped: flow.paid_clamped,
            rec_clamped: flow.rec_clamped,
            paid_filled: flow.paid_fill.filled.len(),
            rec_filled: flow.rec_fill.filled.len(),
            paid_unfillable: flow.paid_fill.unfillable.len(),
            rec_unfillable: flow.rec_fill.unfillable.len(),
        }
    }
}

/// Provenance and diagnostics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub year: i32,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub dataset_hash: String,
    pub unit_scale: f64,
    pub regions: usize,
    pub flows: Vec<FlowSummary>,
}

impl RunManifest {
    pub fn new(output: &PipelineOutput, generated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            year: output.year,
            version: output.version.clone(),
            generated_at,
            dataset_hash: output.dataset_hash.to_string(),
            unit_scale: output.unit_scale,
            regions: output.reference_gdp.len(),
            flows: output
                .flows
                .iter()
                .map(|f| FlowSummary::from_result(f, output.unit_scale))
                .collect(),
        }
    }
}

/// Serialize a manifest to pretty JSON.
pub fn export_manifest_json(manifest: &RunManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize RunManifest to JSON")
}

/// Deserialize a manifest, rejecting unknown schema versions.
pub fn import_manifest_json(json: &str) -> Result<RunManifest> {
    let manifest: RunManifest =
        serde_json::from_str(json).context("failed to deserialize RunManifest from JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

/// `region,paid,rec` for one flow.
pub fn export_flow_csv(flow: &FlowResult) -> Result<String> {
    ensure!(
        flow.paid.len() == flow.rec.len(),
        "flow '{}': paid and rec have different region counts",
        flow.kind
    );
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["region", "paid", "rec"])?;
    for ((region, paid), (rec_region, rec)) in flow.paid.iter().zip(flow.rec.iter()) {
        ensure!(
            region == rec_region,
            "flow '{}': region order differs between sides ({region} vs {rec_region})",
            flow.kind
        );
        wtr.write_record([region.as_str(), &paid.to_string(), &rec.to_string()])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// `region,{column}` for a single region series.
pub fn export_region_csv(series: &RegionSeries, column: &str) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["region", column])?;
    for (region, value) in series.iter() {
        wtr.write_record([region.as_str(), &value.to_string()])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Persists the output of a run.
pub trait ReportSink {
    /// Write `output` and `manifest`; returns where the report landed.
    fn write(&self, output: &PipelineOutput, manifest: &RunManifest) -> Result<PathBuf>;
}

/// Writes CSV sheets and `manifest.json` under `{output_dir}/{version}_{year}/`.
pub struct CsvReportSink {
    output_dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn run_dir(&self, version: &str, year: i32) -> PathBuf {
        self.output_dir.join(format!("{version}_{year}"))
    }
}

impl ReportSink for CsvReportSink {
    fn write(&self, output: &PipelineOutput, manifest: &RunManifest) -> Result<PathBuf> {
        let run_dir = self.run_dir(&output.version, output.year);
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create report dir: {}", run_dir.display()))?;

        for flow in &output.flows {
            let path = run_dir.join(format!("{}.csv", flow.kind));
            write_file(&path, &export_flow_csv(flow)?)?;
        }
        write_file(
            &run_dir.join("reference_gdp.csv"),
            &export_region_csv(&output.reference_gdp, "gdp")?,
        )?;
        write_file(&run_dir.join("manifest.json"), &export_manifest_json(manifest)?)?;

        info!(dir = %run_dir.display(), flows = output.flows.len(), "wrote report");
        Ok(run_dir)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Load a manifest from a report directory.
pub fn load_manifest(dir: &Path) -> Result<RunManifest> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_manifest_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_schema_is_rejected() {
        let json = r#"{
            "schema_version": 99,
            "year": 2021,
            "version": "v1",
            "generated_at": "2024-01-01T00:00:00Z",
            "dataset_hash": "abc",
            "unit_scale": 1e-6,
            "regions": 0,
            "flows": []
        }"#;
        let err = import_manifest_json(json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn missing_schema_version_defaults_to_current() {
        let json = r#"{
            "year": 2021,
            "version": "v1",
            "generated_at": "2024-01-01T00:00:00Z",
            "dataset_hash": "abc",
            "unit_scale": 1.0,
            "regions": 3,
            "flows": []
        }"#;
        let manifest = import_manifest_json(json).unwrap();
        assert_eq!(manifest.schema_version, SCHEMA_VERSION);
        assert_eq!(manifest.regions, 3);
    }
}
