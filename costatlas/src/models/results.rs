use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::montecarlo::{SimulationRun, TotalFormula};
use crate::math::distributions::fitted::FittedDistribution;
use crate::math::statistics::SummaryStatistics;
use crate::risk::metrics::{RiskCalculator, RiskMetrics};
use crate::risk::sensitivity::{sensitivity_analysis, SensitivityEntry};
use crate::utils::errors::{CostAtlasError, Result};

/// # ScenarioSummary
/// Statistics of every variable of a scenario, keyed by variable name, plus
/// the risk metrics of its calculated total. Raw samples are not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario: String,
    pub adjustments: BTreeMap<String, f64>,
    pub statistics: BTreeMap<String, SummaryStatistics>,
    pub risk_metrics: RiskMetrics,
}

/// # SimulationReport
/// Serializable outcome of a full run: the fitted models, per-scenario
/// summaries and the sensitivity table against the base scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub n_simulations: usize,
    pub total_formula: TotalFormula,
    pub baseline_cost: f64,
    pub base_scenario: String,
    pub distributions: Vec<FittedDistribution>,
    pub scenarios: Vec<ScenarioSummary>,
    pub sensitivity: Vec<SensitivityEntry>,
}

impl SimulationReport {
    pub fn build(
        run: &SimulationRun,
        distributions: &[FittedDistribution],
        calculator: &RiskCalculator,
        base_scenario: &str,
    ) -> Result<SimulationReport> {
        let scenarios = run
            .results()
            .iter()
            .map(|result| {
                Ok(ScenarioSummary {
                    scenario: result.name().to_string(),
                    adjustments: result
                        .scenario()
                        .adjustments()
                        .iter()
                        .map(|(c, f)| (c.header().to_string(), *f))
                        .collect(),
                    statistics: result
                        .all_statistics()
                        .iter()
                        .map(|(v, s)| (v.name().to_string(), *s))
                        .collect(),
                    risk_metrics: calculator.evaluate(result)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SimulationReport {
            seed: run.seed(),
            n_simulations: run.n_simulations(),
            total_formula: run.total_formula(),
            baseline_cost: calculator.baseline(),
            base_scenario: base_scenario.to_string(),
            distributions: distributions.to_vec(),
            scenarios,
            sensitivity: sensitivity_analysis(run, base_scenario)?,
        })
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioSummary> {
        self.scenarios.iter().find(|s| s.scenario == name)
    }

    pub fn base(&self) -> Option<&ScenarioSummary> {
        self.scenario(&self.base_scenario)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            CostAtlasError::SimulationErr(format!("Cannot serialize simulation report: {}", e))
        })
    }
}
