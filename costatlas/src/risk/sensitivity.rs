use serde::{Deserialize, Serialize};

use crate::data::columns::Variable;
use crate::models::montecarlo::SimulationRun;
use crate::utils::errors::{CostAtlasError, Result};

/// # SensitivityEntry
/// Change of the mean calculated total of a scenario against the base scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityEntry {
    pub scenario: String,
    pub mean: f64,
    pub absolute_change: f64,
    pub percent_change: f64,
}

/// Sensitivity of every scenario of a run against `base`, in run order.
/// The base scenario itself is included with a change of zero.
pub fn sensitivity_analysis(run: &SimulationRun, base: &str) -> Result<Vec<SensitivityEntry>> {
    let base_mean = run
        .get(base)?
        .total_statistics()
        .map(|s| s.mean)
        .ok_or_else(|| CostAtlasError::SimulationErr(format!("Scenario {} has no total", base)))?;
    run.results()
        .iter()
        .map(|result| {
            let mean = result
                .total_statistics()
                .map(|s| s.mean)
                .ok_or_else(|| {
                    CostAtlasError::SimulationErr(format!(
                        "Scenario {} has no total",
                        result.name()
                    ))
                })?;
            Ok(SensitivityEntry {
                scenario: result.name().to_string(),
                mean,
                absolute_change: mean - base_mean,
                percent_change: percent_change(mean, base_mean),
            })
        })
        .collect()
}

/// # VariableSensitivity
/// Change of one simulated variable of a scenario against the base scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSensitivity {
    pub scenario: String,
    pub variable: Variable,
    pub mean_change_percent: f64,
    pub std_change_percent: f64,
}

fn percent_change(value: f64, base: f64) -> f64 {
    if base.abs() < f64::EPSILON {
        0.0
    } else {
        (value - base) / base.abs() * 100.0
    }
}

/// Mean and spread changes of every variable of every non-base scenario.
pub fn variable_sensitivity(run: &SimulationRun, base: &str) -> Result<Vec<VariableSensitivity>> {
    let base_result = run.get(base)?;
    let mut entries = Vec::new();
    for result in run.results().iter().filter(|r| r.name() != base) {
        for variable in Variable::ALL {
            let (Some(stats), Some(base_stats)) =
                (result.statistics(variable), base_result.statistics(variable))
            else {
                continue;
            };
            entries.push(VariableSensitivity {
                scenario: result.name().to_string(),
                variable,
                mean_change_percent: percent_change(stats.mean, base_stats.mean),
                std_change_percent: percent_change(stats.std, base_stats.std),
            });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::CostColumn;
    use crate::math::distributions::fitted::{
        DistributionModel, FittedDistribution, ParametricDistribution,
    };
    use crate::models::montecarlo::{CostMonteCarloModel, MonteCarloEngine, TotalFormula};
    use crate::models::scenario::Scenario;

    fn run() -> SimulationRun {
        let fitted = |column, mean: f64, std_dev: f64| {
            FittedDistribution::new(
                column,
                DistributionModel::Parametric(ParametricDistribution::Normal { mean, std_dev }),
                Some(0.02),
                mean,
                std_dev,
                (mean - std_dev, mean + std_dev),
                100,
                None,
            )
        };
        CostMonteCarloModel::new(
            vec![
                fitted(CostColumn::MaterialCost, 1000.0, 50.0),
                fitted(CostColumn::LaborCost, 500.0, 20.0),
            ],
            2000,
            7,
        )
        .and_then(|m| m.with_total_formula(TotalFormula::Sum))
        .unwrap()
        .run_scenarios(&Scenario::default_set())
        .unwrap()
    }

    #[test]
    fn test_base_has_zero_change() {
        let entries = sensitivity_analysis(&run(), "baseline").unwrap();
        assert_eq!(entries.len(), 8);
        assert_eq!(entries[0].scenario, "baseline");
        assert_eq!(entries[0].percent_change, 0.0);
    }

    #[test]
    fn test_directions() {
        let entries = sensitivity_analysis(&run(), "baseline").unwrap();
        let change = |name: &str| {
            entries
                .iter()
                .find(|e| e.scenario == name)
                .map(|e| e.percent_change)
                .unwrap()
        };
        assert!(change("material_increase_20pct") > change("material_increase_10pct"));
        assert!(change("combined_aggressive") > change("combined_moderate"));
        assert!(change("cost_reduction") < 0.0);
    }

    #[test]
    fn test_variable_sensitivity() {
        let entries = variable_sensitivity(&run(), "baseline").unwrap();
        assert!(entries.iter().all(|e| e.scenario != "baseline"));
        let material = entries
            .iter()
            .find(|e| {
                e.scenario == "material_increase_10pct"
                    && e.variable == Variable::Column(CostColumn::MaterialCost)
            })
            .unwrap();
        assert!((material.mean_change_percent - 10.0).abs() < 1e-6);
        let labor = entries
            .iter()
            .find(|e| {
                e.scenario == "material_increase_10pct"
                    && e.variable == Variable::Column(CostColumn::LaborCost)
            })
            .unwrap();
        assert_eq!(labor.mean_change_percent, 0.0);
    }

    #[test]
    fn test_unknown_base() {
        assert!(matches!(
            sensitivity_analysis(&run(), "missing"),
            Err(CostAtlasError::NotFoundErr(_))
        ));
    }
}
