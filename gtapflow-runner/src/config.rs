//! Pipeline configuration, loaded from TOML.
//!
//! ```toml
//! year = 2021
//! version = "v1"
//! start_year = 2015
//! unit_scale = 1e-6
//!
//! [mapping]
//! regions = "data/mapping.csv"
//! order = "data/order.csv"
//!
//! [reference]
//! gdp = { provider = "world_bank", indicator = "NY.GDP.MKTP.CD" }
//! population = { provider = "world_bank", indicator = "SP.POP.TOTL" }
//!
//! [[flows]]
//! kind = "remittances"
//! paid = { provider = "world_bank", indicator = "BM.TRF.PWKR.CD.DT" }
//! rec = { provider = "world_bank", indicator = "BX.TRF.PWKR.CD.DT" }
//! ```

use chrono::Datelike;
use gtapflow_core::data::BopSide;
use gtapflow_core::{Override, OverrideError, OverrideTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("overrides: {0}")]
    Overrides(#[from] OverrideError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The paired flows a GTAP satellite run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Compensation of employees.
    Compensation,
    PrimaryIncome,
    /// Personal remittances.
    Remittances,
    /// Official development assistance.
    Aid,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::Compensation => "compensation",
            FlowKind::PrimaryIncome => "primary_income",
            FlowKind::Remittances => "remittances",
            FlowKind::Aid => "aid",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    WorldBank,
    ImfCsv,
    CsvPanel,
}

/// Where one series comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub provider: ProviderKind,
    /// Indicator code (World Bank, CSV indicator column) or long name (IMF).
    pub indicator: String,
    /// File to read; required for `imf_csv` and `csv_panel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// BOP side; required for `imf_csv`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<BopSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_column: Option<String>,
}

impl SourceSpec {
    pub fn world_bank(indicator: &str) -> Self {
        Self {
            provider: ProviderKind::WorldBank,
            indicator: indicator.to_string(),
            path: None,
            side: None,
            entity_column: None,
            indicator_column: None,
        }
    }

    pub fn imf_csv(path: impl Into<PathBuf>, indicator: &str, side: BopSide) -> Self {
        Self {
            provider: ProviderKind::ImfCsv,
            indicator: indicator.to_string(),
            path: Some(path.into()),
            side: Some(side),
            entity_column: None,
            indicator_column: None,
        }
    }

    pub fn csv_panel(path: impl Into<PathBuf>, indicator: &str) -> Self {
        Self {
            provider: ProviderKind::CsvPanel,
            indicator: indicator.to_string(),
            path: Some(path.into()),
            side: None,
            entity_column: None,
            indicator_column: None,
        }
    }

    /// Series id used for overrides, provider lookup and output naming.
    ///
    /// Both sides of an IMF indicator share a long name, so the side code is
    /// appended.
    pub fn id(&self) -> String {
        match self.side {
            Some(side) => format!("{}.{side}", self.indicator),
            None => self.indicator.clone(),
        }
    }

    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if self.indicator.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{label}: indicator is empty")));
        }
        match self.provider {
            ProviderKind::ImfCsv => {
                if self.path.is_none() || self.side.is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "{label}: imf_csv sources need both path and side"
                    )));
                }
            }
            ProviderKind::CsvPanel => {
                if self.path.is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "{label}: csv_panel sources need a path"
                    )));
                }
            }
            ProviderKind::WorldBank => {
                if self.side.is_some() {
                    return Err(ConfigError::Invalid(format!(
                        "{label}: world_bank sources have no BOP side"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// `economy,Regions[,longnames]` CSV.
    pub regions: PathBuf,
    /// Single-column `Regions` CSV giving the output order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub gdp: SourceSpec,
    pub population: SourceSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub kind: FlowKind,
    pub paid: SourceSpec,
    pub rec: SourceSpec,
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Period the outputs describe.
    pub year: i32,
    /// Output label, e.g. the GTAP database version.
    pub version: String,
    /// First period kept after interpolation.
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    /// Multiplier applied after aggregation (1e-6 reports millions).
    #[serde(default = "default_unit_scale")]
    pub unit_scale: f64,
    /// Warn when a flow's `|T_paid / T_rec - 1|` exceeds this.
    #[serde(default = "default_scale_warn_threshold")]
    pub scale_warn_threshold: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Extra override file, merged with the inline `[[overrides]]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides_file: Option<PathBuf>,
    pub mapping: MappingConfig,
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub flows: Vec<FlowConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Override>,
}

fn default_start_year() -> i32 {
    2015
}

fn default_unit_scale() -> f64 {
    1e-6
}

fn default_scale_warn_threshold() -> f64 {
    0.25
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl PipelineConfig {
    /// The standard four-flow GTAP configuration.
    pub fn default_gtap() -> Self {
        let bop = "data/imf_bop.csv";
        Self {
            year: 2021,
            version: "v1".to_string(),
            start_year: default_start_year(),
            unit_scale: default_unit_scale(),
            scale_warn_threshold: default_scale_warn_threshold(),
            output_dir: default_output_dir(),
            mapping: MappingConfig {
                regions: PathBuf::from("data/mapping.csv"),
                order: Some(PathBuf::from("data/order.csv")),
            },
            reference: ReferenceConfig {
                gdp: SourceSpec::world_bank("NY.GDP.MKTP.CD"),
                population: SourceSpec::world_bank("SP.POP.TOTL"),
            },
            flows: vec![
                FlowConfig {
                    kind: FlowKind::Compensation,
                    paid: SourceSpec::imf_csv(bop, "Compensation of employees", BopSide::Debit),
                    rec: SourceSpec::imf_csv(bop, "Compensation of employees", BopSide::Credit),
                },
                FlowConfig {
                    kind: FlowKind::PrimaryIncome,
                    paid: SourceSpec::world_bank("BM.GSR.FCTY.CD"),
                    rec: SourceSpec::world_bank("BX.GSR.FCTY.CD"),
                },
                FlowConfig {
                    kind: FlowKind::Remittances,
                    paid: SourceSpec::world_bank("BM.TRF.PWKR.CD.DT"),
                    rec: SourceSpec::world_bank("BX.TRF.PWKR.CD.DT"),
                },
                FlowConfig {
                    kind: FlowKind::Aid,
                    paid: SourceSpec::csv_panel("data/oda_donors.csv", "ODA_PAID"),
                    rec: SourceSpec::world_bank("DT.ODA.ODAT.CD"),
                },
            ],
            overrides_file: None,
            overrides: Vec::new(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. Relative paths inside the config are resolved
    /// against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output_dir);
        resolve(&mut self.mapping.regions);
        if let Some(order) = self.mapping.order.as_mut() {
            resolve(order);
        }
        if let Some(file) = self.overrides_file.as_mut() {
            resolve(file);
        }
        for spec in self.sources_mut() {
            if let Some(path) = spec.path.as_mut() {
                resolve(path);
            }
        }
    }

    /// Every source the run reads, references first, then flows in order.
    pub fn sources(&self) -> impl Iterator<Item = &SourceSpec> {
        [&self.reference.gdp, &self.reference.population]
            .into_iter()
            .chain(self.flows.iter().flat_map(|f| [&f.paid, &f.rec]))
    }

    fn sources_mut(&mut self) -> impl Iterator<Item = &mut SourceSpec> {
        [&mut self.reference.gdp, &mut self.reference.population]
            .into_iter()
            .chain(self.flows.iter_mut().flat_map(|f| [&mut f.paid, &mut f.rec]))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let current_year = chrono::Utc::now().year();
        if self.year > current_year {
            return Err(ConfigError::Invalid(format!(
                "year {} is in the future",
                self.year
            )));
        }
        if self.start_year > self.year {
            return Err(ConfigError::Invalid(format!(
                "start_year {} is after year {}",
                self.start_year, self.year
            )));
        }
        if self.version.trim().is_empty()
            || self.version.contains(['/', '\\'])
            || self.version.starts_with('.')
        {
            return Err(ConfigError::Invalid(format!(
                "version '{}' is not usable as a directory label",
                self.version
            )));
        }
        if !(self.unit_scale.is_finite() && self.unit_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "unit_scale must be positive, got {}",
                self.unit_scale
            )));
        }
        if !(self.scale_warn_threshold.is_finite() && self.scale_warn_threshold >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scale_warn_threshold must be non-negative, got {}",
                self.scale_warn_threshold
            )));
        }
        if self.flows.is_empty() {
            return Err(ConfigError::Invalid("no flows configured".into()));
        }

        let mut kinds = BTreeSet::new();
        for flow in &self.flows {
            if !kinds.insert(flow.kind) {
                return Err(ConfigError::Invalid(format!(
                    "flow '{}' configured more than once",
                    flow.kind
                )));
            }
            flow.paid.validate(&format!("{}.paid", flow.kind))?;
            flow.rec.validate(&format!("{}.rec", flow.kind))?;
            if flow.paid.id() == flow.rec.id() {
                return Err(ConfigError::Invalid(format!(
                    "flow '{}' reads the same series for both sides",
                    flow.kind
                )));
            }
        }
        self.reference.gdp.validate("reference.gdp")?;
        self.reference.population.validate("reference.population")?;
        self.validate_source_ids()?;

        OverrideTable::new(self.overrides.clone())?;
        Ok(())
    }

    /// Sources sharing an id must be the same source: providers and
    /// overrides are looked up by id alone.
    pub(crate) fn validate_source_ids(&self) -> Result<(), ConfigError> {
        let mut seen: BTreeMap<String, &SourceSpec> = BTreeMap::new();
        for spec in self.sources() {
            match seen.get(&spec.id()) {
                Some(first) if *first != spec => {
                    return Err(ConfigError::Invalid(format!(
                        "series '{}' is configured with two different sources",
                        spec.id()
                    )));
                }
                Some(_) => {}
                None => {
                    seen.insert(spec.id(), spec);
                }
            }
        }
        Ok(())
    }

    /// Inline overrides plus those from `overrides_file`.
    pub fn override_table(&self) -> Result<OverrideTable, ConfigError> {
        let mut overrides = self.overrides.clone();
        if let Some(path) = &self.overrides_file {
            overrides.extend(OverrideTable::from_file(path)?.overrides);
        }
        Ok(OverrideTable::new(overrides)?)
    }

    /// `{output_dir}/{version}_{year}`.
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(format!("{}_{}", self.version, self.year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
year = 2021
version = "v11"

[mapping]
regions = "mapping.csv"

[reference]
gdp = { provider = "csv_panel", indicator = "GDP", path = "gdp.csv" }
population = { provider = "world_bank", indicator = "SP.POP.TOTL" }

[[flows]]
kind = "compensation"
paid = { provider = "imf_csv", indicator = "Compensation of employees", path = "bop.csv", side = "DB_T" }
rec = { provider = "imf_csv", indicator = "Compensation of employees", path = "bop.csv", side = "CD_T" }

[[overrides]]
series = "GDP"
entity = "VEN"
period = 2021
value = 1.0
"#;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config = PipelineConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.year, 2021);
        assert_eq!(config.start_year, 2015);
        assert_eq!(config.unit_scale, 1e-6);
        assert_eq!(config.scale_warn_threshold, 0.25);
        assert_eq!(config.mapping.order, None);
        assert_eq!(config.flows[0].kind, FlowKind::Compensation);
        assert_eq!(config.flows[0].paid.id(), "Compensation of employees.DB_T");
        assert_eq!(config.overrides.len(), 1);
        assert_eq!(config.run_dir(), PathBuf::from("output/v11_2021"));
    }

    #[test]
    fn default_gtap_round_trips_through_toml() {
        let config = PipelineConfig::default_gtap();
        config.validate().unwrap();
        let text = config.to_toml().unwrap();
        let back = PipelineConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.flows.len(), 4);
    }

    #[test]
    fn rejects_imf_source_without_side() {
        let text = MINIMAL.replace(", side = \"DB_T\"", "");
        let err = PipelineConfig::from_toml(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("compensation.paid")));
    }

    #[test]
    fn rejects_duplicate_flows() {
        let mut config = PipelineConfig::default_gtap();
        let dup = config.flows[0].clone();
        config.flows.push(dup);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_bad_years_and_scales() {
        let mut config = PipelineConfig::default_gtap();
        config.start_year = config.year + 1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default_gtap();
        config.year = 9999;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default_gtap();
        config.unit_scale = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default_gtap();
        config.version = "../x".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_overrides() {
        let text = format!(
            "{MINIMAL}\n[[overrides]]\nseries = \"GDP\"\nentity = \"ven\"\nperiod = 2021\n"
        );
        let err = PipelineConfig::from_toml(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Overrides(_)));
    }

    #[test]
    fn from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.mapping.regions, dir.path().join("mapping.csv"));
        assert_eq!(
            config.reference.gdp.path.as_deref(),
            Some(dir.path().join("gdp.csv").as_path())
        );
        assert_eq!(config.output_dir, dir.path().join("output"));
    }
}
