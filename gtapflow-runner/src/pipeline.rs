//! Pipeline runner: wires sources, fill, balancing and aggregation together.
//!
//! One run produces, for the configured year:
//! - GDP by region, after filling missing GDP from population
//! - for every configured flow, paid and received totals by region
//!
//! Flows run sequentially in config order. A flow whose balancing fails
//! fails the whole run.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use gtapflow_core::data::{CsvMappingSource, MappingSource};
use gtapflow_core::domain::{MappingError, RegionMapping, RegionSeries, Series};
use gtapflow_core::{
    aggregate_with_order, balance_pair, dataset_hash, fill_by_region_ratio, BalanceError,
    BalancedPair, DatasetHash, FillReport,
};

use crate::config::{ConfigError, FlowConfig, FlowKind, PipelineConfig};
use crate::sources::{SourceError, Sources};

/// Errors from a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("flow '{flow}': {source}")]
    Balance {
        flow: FlowKind,
        #[source]
        source: BalanceError,
    },
}

/// Region totals and balancing diagnostics for one paired flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub kind: FlowKind,
    pub paid: RegionSeries,
    pub rec: RegionSeries,
    /// `T_paid / T_rec` before rescaling.
    pub scale_factor: f64,
    pub scale_paid: f64,
    pub scale_rec: f64,
    /// Common world total right after rescaling, in source units.
    pub target_total: f64,
    /// World totals after clamping, in source units.
    pub paid_total: f64,
    pub rec_total: f64,
    pub paid_clamped: usize,
    pub rec_clamped: usize,
    pub paid_fill: FillReport,
    pub rec_fill: FillReport,
}

impl FlowResult {
    fn from_balanced(
        kind: FlowKind,
        pair: BalancedPair,
        mapping: &RegionMapping,
        unit_scale: f64,
    ) -> Self {
        Self {
            kind,
            paid: aggregate_with_order(&pair.paid, mapping, mapping.order(), unit_scale)
                .renamed(format!("{kind}.paid")),
            rec: aggregate_with_order(&pair.rec, mapping, mapping.order(), unit_scale)
                .renamed(format!("{kind}.rec")),
            scale_factor: pair.scale_factor,
            scale_paid: pair.scale_paid,
            scale_rec: pair.scale_rec,
            target_total: pair.target_total,
            paid_total: pair.paid_total_after_clamp,
            rec_total: pair.rec_total_after_clamp,
            paid_clamped: pair.paid_clamped,
            rec_clamped: pair.rec_clamped,
            paid_fill: pair.paid_fill,
            rec_fill: pair.rec_fill,
        }
    }

    /// Post-clamp `paid - rec`, in source units.
    pub fn residual_imbalance(&self) -> f64 {
        self.paid_total - self.rec_total
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub year: i32,
    pub version: String,
    pub unit_scale: f64,
    /// Filled GDP by region.
    pub reference_gdp: RegionSeries,
    pub gdp_fill: FillReport,
    pub flows: Vec<FlowResult>,
    /// Hash of every selected-year input series and the mapping.
    pub dataset_hash: DatasetHash,
}

impl PipelineOutput {
    pub fn flow(&self, kind: FlowKind) -> Option<&FlowResult> {
        self.flows.iter().find(|f| f.kind == kind)
    }
}

/// Load the region mapping named in `config.mapping`.
pub fn load_mapping(config: &PipelineConfig) -> Result<RegionMapping, PipelineError> {
    let source = CsvMappingSource::new(&config.mapping.regions, config.mapping.order.clone());
    Ok(source.load()?)
}

/// Run the configured flows for `config.year`.
pub fn run_pipeline(
    config: &PipelineConfig,
    sources: &Sources,
    mapping: &RegionMapping,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    report_mapping(mapping);

    info!(year = config.year, version = %config.version, flows = config.flows.len(), "starting run");

    // Reference: GDP, gaps filled from population.
    let population = sources.series(&config.reference.population, config)?;
    let gdp_raw = sources.series(&config.reference.gdp, config)?;
    let gdp = fill_by_region_ratio(&gdp_raw, &population, mapping);
    info!(
        filled = gdp.report.filled.len(),
        unfillable = gdp.report.unfillable.len(),
        "filled GDP from population"
    );
    let reference_gdp =
        aggregate_with_order(&gdp.series, mapping, mapping.order(), config.unit_scale)
            .renamed("reference_gdp");

    let mut inputs: Vec<Series> = vec![population, gdp_raw];
    let mut flows = Vec::with_capacity(config.flows.len());
    for flow in &config.flows {
        let (result, paid, rec) = run_flow(flow, config, sources, &gdp.series, mapping)?;
        inputs.push(paid);
        inputs.push(rec);
        flows.push(result);
    }

    let dataset_hash = dataset_hash(&inputs, mapping);
    info!(dataset_hash = %dataset_hash, "run complete");

    Ok(PipelineOutput {
        year: config.year,
        version: config.version.clone(),
        unit_scale: config.unit_scale,
        reference_gdp,
        gdp_fill: gdp.report,
        flows,
        dataset_hash,
    })
}

fn run_flow(
    flow: &FlowConfig,
    config: &PipelineConfig,
    sources: &Sources,
    gdp: &Series,
    mapping: &RegionMapping,
) -> Result<(FlowResult, Series, Series), PipelineError> {
    let paid = sources.series(&flow.paid, config)?;
    let rec = sources.series(&flow.rec, config)?;

    let pair = balance_pair(&paid, &rec, gdp, mapping).map_err(|source| {
        PipelineError::Balance {
            flow: flow.kind,
            source,
        }
    })?;

    info!(
        flow = %flow.kind,
        scale_factor = pair.scale_factor,
        paid_filled = pair.paid_fill.filled.len(),
        rec_filled = pair.rec_fill.filled.len(),
        "balanced flow"
    );
    if (pair.scale_factor - 1.0).abs() > config.scale_warn_threshold {
        warn!(
            flow = %flow.kind,
            scale_factor = pair.scale_factor,
            threshold = config.scale_warn_threshold,
            "paid and received totals disagree beyond threshold"
        );
    }

    let result = FlowResult::from_balanced(flow.kind, pair, mapping, config.unit_scale);
    Ok((result, paid, rec))
}

fn report_mapping(mapping: &RegionMapping) {
    let outside = mapping.regions_outside_order();
    if !outside.is_empty() {
        warn!(
            regions = ?outside,
            "mapped regions missing from the canonical order are dropped from output"
        );
    }
    let empty = mapping.empty_regions();
    if !empty.is_empty() {
        info!(regions = ?empty, "canonical regions with no mapped entity report zero");
    }
}
