//! gtapflow runner: configuration, source resolution, the four-flow run and
//! report export.
//!
//! This crate builds on `gtapflow-core` to provide:
//! - TOML pipeline configuration with validation
//! - Provider construction and per-series preprocessing
//! - `run_pipeline`, producing region totals for every configured flow
//! - CSV and JSON report export with a dataset fingerprint

pub mod config;
pub mod export;
pub mod pipeline;
pub mod sources;

pub use config::{
    ConfigError, FlowConfig, FlowKind, MappingConfig, PipelineConfig, ProviderKind,
    ReferenceConfig, SourceSpec,
};
pub use export::{
    export_flow_csv, export_manifest_json, export_region_csv, import_manifest_json,
    load_manifest, CsvReportSink, FlowSummary, ReportSink, RunManifest, SCHEMA_VERSION,
};
pub use pipeline::{load_mapping, run_pipeline, FlowResult, PipelineError, PipelineOutput};
pub use sources::{SourceError, Sources};
