use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use costatlas::prelude::{
    validate_scenarios, DistributionFamily, MissingValuePolicy, Scenario, TotalFormula,
};
use reporting::prelude::AiServiceConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::errors::{EstimatorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    pub delimiter: char,
    pub missing_policy: MissingValuePolicy,
    /// Optional categorical column, e.g. `Project_Type`.
    pub label_column: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            path: PathBuf::from("data/construction_estimates.csv"),
            delimiter: ',',
            missing_policy: MissingValuePolicy::Drop,
            label_column: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingConfig {
    /// Candidate families, long (`normal`) or short (`norm`) names.
    pub candidates: Vec<String>,
}

impl Default for FittingConfig {
    fn default() -> Self {
        FittingConfig {
            candidates: DistributionFamily::DEFAULT_CANDIDATES
                .iter()
                .map(|f| f.short_name().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_simulations: usize,
    pub seed: u64,
    pub total_formula: TotalFormula,
    pub base_scenario: String,
    pub parallel: bool,
    pub scenarios: Vec<Scenario>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            n_simulations: 10_000,
            seed: 42,
            total_formula: TotalFormula::default(),
            base_scenario: "baseline".to_string(),
            parallel: true,
            scenarios: Scenario::default_set(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub charts: bool,
    pub dashboards: bool,
    pub summary: bool,
    pub ai_report: bool,
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: PathBuf::from("output"),
            charts: true,
            dashboards: true,
            summary: true,
            ai_report: true,
            progress: true,
        }
    }
}

/// # PipelineConfig
/// Every setting of an estimator run.
///
/// ## Details
/// - Resolution order: compiled defaults, then the TOML file, then CLI flags
///   (see [`CliOverrides`]).
/// - Missing TOML tables and keys keep their defaults.
///
/// ## Example
/// ```
/// use estimator::prelude::*;
/// let config = PipelineConfig::from_toml_str("[simulation]\nn_simulations = 500\n").unwrap();
/// assert_eq!(config.simulation.n_simulations, 500);
/// assert_eq!(config.simulation.seed, 42);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub fitting: FittingConfig,
    pub simulation: SimulationConfig,
    pub output: OutputConfig,
    pub ai: AiServiceConfig,
}

/// Flags given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub n_simulations: Option<usize>,
    pub seed: Option<u64>,
    pub total_formula: Option<TotalFormula>,
    pub sequential: bool,
    pub no_charts: bool,
    pub no_dashboards: bool,
    pub no_ai: bool,
    pub no_progress: bool,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<PipelineConfig> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EstimatorError::ConfigErr(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = PipelineConfig::from_toml_str(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<PipelineConfig> {
        match path {
            Some(path) => PipelineConfig::from_file(path),
            None => Ok(PipelineConfig::default()),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(input) = &overrides.input {
            self.input.path = input.clone();
        }
        if let Some(dir) = &overrides.output_dir {
            self.output.dir = dir.clone();
        }
        if let Some(n) = overrides.n_simulations {
            self.simulation.n_simulations = n;
        }
        if let Some(seed) = overrides.seed {
            self.simulation.seed = seed;
        }
        if let Some(formula) = overrides.total_formula {
            self.simulation.total_formula = formula;
        }
        if overrides.sequential {
            self.simulation.parallel = false;
        }
        if overrides.no_charts {
            self.output.charts = false;
        }
        if overrides.no_dashboards {
            self.output.dashboards = false;
        }
        if overrides.no_ai {
            self.ai.enabled = false;
        }
        if overrides.no_progress {
            self.output.progress = false;
        }
    }

    /// Parsed candidate families, in configured order.
    pub fn candidates(&self) -> Result<Vec<DistributionFamily>> {
        self.fitting
            .candidates
            .iter()
            .map(|name| DistributionFamily::from_str(name).map_err(EstimatorError::from))
            .collect()
    }

    /// The delimiter as a CSV byte.
    pub fn delimiter(&self) -> Result<u8> {
        u8::try_from(self.input.delimiter)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| {
                EstimatorError::ConfigErr(format!(
                    "Delimiter {:?} is not a single ASCII character",
                    self.input.delimiter
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        self.delimiter()?;
        if self.candidates()?.is_empty() {
            return Err(EstimatorError::ConfigErr(
                "At least one candidate distribution is required".to_string(),
            ));
        }
        if self.simulation.n_simulations == 0 {
            return Err(EstimatorError::ConfigErr(
                "n_simulations must be positive".to_string(),
            ));
        }
        validate_scenarios(&self.simulation.scenarios)?;
        if !self
            .simulation
            .scenarios
            .iter()
            .any(|s| s.name() == self.simulation.base_scenario)
        {
            return Err(EstimatorError::ConfigErr(format!(
                "Base scenario {} is not among the configured scenarios",
                self.simulation.base_scenario
            )));
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(EstimatorError::ConfigErr(format!(
                "AI temperature {} outside [0, 2]",
                self.ai.temperature
            )));
        }
        Ok(())
    }
}

/// Parses a `--formula` flag value.
pub fn parse_formula(name: &str) -> Result<TotalFormula> {
    name.parse::<TotalFormula>()
        .map_err(|e| EstimatorError::ConfigErr(e.to_string()))
}
