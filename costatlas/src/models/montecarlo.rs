use std::collections::BTreeMap;
use std::str::FromStr;

use rand::{rngs::StdRng, SeedableRng};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::scenario::{validate_scenarios, Scenario};
use crate::data::columns::{CostColumn, Variable};
use crate::data::dataset::Dataset;
use crate::math::distributions::fitted::{ColumnSampler, FittedDistribution};
use crate::math::statistics::SummaryStatistics;
use crate::utils::errors::{CostAtlasError, Result};

/// # TotalFormula
/// How sampled components recombine into a total cost.
///
/// ## Details
/// - `Markup`: `(material + labor) * (1 + profit_rate / 100) + discount_or_markup`
/// - `Sum`: `material + labor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalFormula {
    #[default]
    Markup,
    Sum,
}

impl TotalFormula {
    pub fn required_columns(&self) -> &'static [CostColumn] {
        match self {
            TotalFormula::Markup => &[
                CostColumn::MaterialCost,
                CostColumn::LaborCost,
                CostColumn::ProfitRate,
                CostColumn::DiscountOrMarkup,
            ],
            TotalFormula::Sum => &[CostColumn::MaterialCost, CostColumn::LaborCost],
        }
    }

    pub fn combine(&self, material: f64, labor: f64, profit_rate: f64, discount: f64) -> f64 {
        match self {
            TotalFormula::Markup => {
                let base = material + labor;
                base + base * profit_rate / 100.0 + discount
            }
            TotalFormula::Sum => material + labor,
        }
    }

    /// Observed counterpart of the simulated total, averaged over the cleaned rows.
    ///
    /// ## Details
    /// - `Markup` uses the recorded `Total_Estimate`.
    /// - `Sum` recombines each row with the formula, so the baseline excludes
    ///   profit and discount exactly like the simulated totals do.
    /// - `None` for an empty dataset.
    pub fn observed_baseline(&self, dataset: &Dataset) -> Option<f64> {
        match self {
            TotalFormula::Markup => dataset.column_mean(CostColumn::TotalEstimate),
            TotalFormula::Sum => {
                if dataset.is_empty() {
                    return None;
                }
                let sum: f64 = dataset
                    .records()
                    .iter()
                    .map(|r| {
                        self.combine(
                            r.value(CostColumn::MaterialCost),
                            r.value(CostColumn::LaborCost),
                            r.value(CostColumn::ProfitRate),
                            r.value(CostColumn::DiscountOrMarkup),
                        )
                    })
                    .sum();
                Some(sum / dataset.len() as f64)
            }
        }
    }
}

impl FromStr for TotalFormula {
    type Err = CostAtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markup" => Ok(TotalFormula::Markup),
            "sum" => Ok(TotalFormula::Sum),
            other => Err(CostAtlasError::NotFoundErr(format!(
                "Unknown total formula {}",
                other
            ))),
        }
    }
}

/// # SimulationResult
/// Samples and summary statistics of one scenario. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    scenario: Scenario,
    samples: BTreeMap<Variable, Vec<f64>>,
    statistics: BTreeMap<Variable, SummaryStatistics>,
}

impl SimulationResult {
    pub fn new(scenario: Scenario, samples: BTreeMap<Variable, Vec<f64>>) -> Result<Self> {
        let statistics = samples
            .iter()
            .map(|(variable, values)| Ok((*variable, SummaryStatistics::from_samples(values)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(SimulationResult {
            scenario,
            samples,
            statistics,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn name(&self) -> &str {
        self.scenario.name()
    }

    pub fn samples(&self, variable: Variable) -> Option<&Vec<f64>> {
        self.samples.get(&variable)
    }

    pub fn all_samples(&self) -> &BTreeMap<Variable, Vec<f64>> {
        &self.samples
    }

    pub fn statistics(&self, variable: Variable) -> Option<&SummaryStatistics> {
        self.statistics.get(&variable)
    }

    pub fn all_statistics(&self) -> &BTreeMap<Variable, SummaryStatistics> {
        &self.statistics
    }

    /// Calculated total-cost samples.
    pub fn total(&self) -> &[f64] {
        self.samples
            .get(&Variable::TotalCalculated)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_statistics(&self) -> Option<&SummaryStatistics> {
        self.statistics.get(&Variable::TotalCalculated)
    }

    pub fn len(&self) -> usize {
        self.total().len()
    }

    pub fn is_empty(&self) -> bool {
        self.total().is_empty()
    }
}

/// # SimulationRun
/// All scenario results of one run, in scenario definition order.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRun {
    seed: u64,
    n_simulations: usize,
    total_formula: TotalFormula,
    results: Vec<SimulationResult>,
}

impl SimulationRun {
    pub fn new(
        seed: u64,
        n_simulations: usize,
        total_formula: TotalFormula,
        results: Vec<SimulationResult>,
    ) -> SimulationRun {
        SimulationRun {
            seed,
            n_simulations,
            total_formula,
            results,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_simulations(&self) -> usize {
        self.n_simulations
    }

    pub fn total_formula(&self) -> TotalFormula {
        self.total_formula
    }

    pub fn results(&self) -> &Vec<SimulationResult> {
        &self.results
    }

    pub fn get(&self, name: &str) -> Result<&SimulationResult> {
        self.results
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| CostAtlasError::NotFoundErr(format!("Scenario {} not found", name)))
    }

    pub fn scenario_names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name()).collect()
    }
}

pub trait MonteCarloEngine {
    fn simulate_scenario(&self, scenario: &Scenario) -> Result<SimulationResult>;

    fn seed(&self) -> u64;

    fn n_simulations(&self) -> usize;

    fn total_formula(&self) -> TotalFormula;

    fn run_scenarios(&self, scenarios: &[Scenario]) -> Result<SimulationRun> {
        validate_scenarios(scenarios)?;
        let results = scenarios
            .iter()
            .map(|scenario| self.simulate_scenario(scenario))
            .collect::<Result<Vec<SimulationResult>>>()?;
        Ok(SimulationRun::new(
            self.seed(),
            self.n_simulations(),
            self.total_formula(),
            results,
        ))
    }
}

pub trait ParallelMonteCarloEngine: MonteCarloEngine + Sync + Send {
    /// Same output as `run_scenarios`: every scenario owns its generator.
    fn par_run_scenarios(&self, scenarios: &[Scenario]) -> Result<SimulationRun> {
        validate_scenarios(scenarios)?;
        let results = scenarios
            .par_iter()
            .map(|scenario| self.simulate_scenario(scenario))
            .collect::<Result<Vec<SimulationResult>>>()?;
        Ok(SimulationRun::new(
            self.seed(),
            self.n_simulations(),
            self.total_formula(),
            results,
        ))
    }
}

/// # CostMonteCarloModel
/// Resamples fitted column distributions under multiplicative scenarios.
///
/// ## Details
/// - Every scenario restarts a `StdRng` from the configured seed, so scenarios
///   share random numbers and an identity scenario reproduces the baseline.
/// - Columns are drawn in `CostColumn::ALL` order, `n_simulations` draws each.
#[derive(Debug)]
pub struct CostMonteCarloModel {
    distributions: Vec<FittedDistribution>,
    samplers: Vec<(CostColumn, ColumnSampler)>,
    n_simulations: usize,
    seed: u64,
    total_formula: TotalFormula,
}

impl CostMonteCarloModel {
    pub fn new(
        distributions: Vec<FittedDistribution>,
        n_simulations: usize,
        seed: u64,
    ) -> Result<CostMonteCarloModel> {
        if n_simulations == 0 {
            return Err(CostAtlasError::SimulationErr(
                "Number of simulations must be positive".to_string(),
            ));
        }
        if distributions.is_empty() {
            return Err(CostAtlasError::SimulationErr(
                "No fitted distributions supplied".to_string(),
            ));
        }
        let mut ordered = distributions;
        ordered.sort_by_key(|d| d.column());
        ordered.dedup_by_key(|d| d.column());
        let samplers = ordered
            .iter()
            .map(|d| Ok((d.column(), d.sampler()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CostMonteCarloModel {
            distributions: ordered,
            samplers,
            n_simulations,
            seed,
            total_formula: TotalFormula::default(),
        })
    }

    pub fn with_total_formula(mut self, total_formula: TotalFormula) -> Result<Self> {
        self.check_formula_inputs(total_formula)?;
        self.total_formula = total_formula;
        Ok(self)
    }

    pub fn distributions(&self) -> &Vec<FittedDistribution> {
        &self.distributions
    }

    fn check_formula_inputs(&self, formula: TotalFormula) -> Result<()> {
        for column in formula.required_columns() {
            if !self.samplers.iter().any(|(c, _)| c == column) {
                return Err(CostAtlasError::SimulationErr(format!(
                    "Total formula {:?} needs a fitted distribution for {}",
                    formula, column
                )));
            }
        }
        Ok(())
    }

    fn column_samples<'a>(
        samples: &'a BTreeMap<Variable, Vec<f64>>,
        column: CostColumn,
    ) -> Option<&'a Vec<f64>> {
        samples.get(&Variable::Column(column))
    }
}

impl MonteCarloEngine for CostMonteCarloModel {
    fn simulate_scenario(&self, scenario: &Scenario) -> Result<SimulationResult> {
        scenario.validate()?;
        self.check_formula_inputs(self.total_formula)?;
        debug!(scenario = scenario.name(), n = self.n_simulations, "simulating scenario");
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut samples: BTreeMap<Variable, Vec<f64>> = BTreeMap::new();
        for (column, sampler) in &self.samplers {
            let factor = scenario.factor(*column);
            let values: Vec<f64> = (0..self.n_simulations)
                .map(|_| sampler.sample(&mut rng) * factor)
                .collect();
            samples.insert(Variable::Column(*column), values);
        }

        let zeros = vec![0.0; self.n_simulations];
        let component = |column| Self::column_samples(&samples, column).unwrap_or(&zeros);
        let material = component(CostColumn::MaterialCost);
        let labor = component(CostColumn::LaborCost);
        let profit = component(CostColumn::ProfitRate);
        let discount = component(CostColumn::DiscountOrMarkup);
        let total: Vec<f64> = (0..self.n_simulations)
            .map(|i| self.total_formula.combine(material[i], labor[i], profit[i], discount[i]))
            .collect();
        samples.insert(Variable::TotalCalculated, total);

        let result = SimulationResult::new(scenario.clone(), samples)?;
        if let Some(stats) = result.total_statistics() {
            info!(
                scenario = scenario.name(),
                mean = stats.mean,
                std = stats.std,
                "scenario completed"
            );
        }
        Ok(result)
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn n_simulations(&self) -> usize {
        self.n_simulations
    }

    fn total_formula(&self) -> TotalFormula {
        self.total_formula
    }
}

impl ParallelMonteCarloEngine for CostMonteCarloModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::distributions::fitted::{DistributionModel, ParametricDistribution};

    fn normal(column: CostColumn, mean: f64, std_dev: f64) -> FittedDistribution {
        FittedDistribution::new(
            column,
            DistributionModel::Parametric(ParametricDistribution::Normal { mean, std_dev }),
            Some(0.01),
            mean,
            std_dev,
            (mean - 3.0 * std_dev, mean + 3.0 * std_dev),
            1000,
            None,
        )
    }

    fn constant(column: CostColumn, value: f64) -> FittedDistribution {
        FittedDistribution::new(
            column,
            DistributionModel::Empirical {
                observations: vec![value],
            },
            None,
            value,
            0.0,
            (value, value),
            1,
            None,
        )
    }

    fn model(n: usize, seed: u64) -> CostMonteCarloModel {
        CostMonteCarloModel::new(
            vec![
                normal(CostColumn::MaterialCost, 100.0, 10.0),
                normal(CostColumn::LaborCost, 50.0, 5.0),
                constant(CostColumn::ProfitRate, 0.0),
                constant(CostColumn::DiscountOrMarkup, 0.0),
                normal(CostColumn::TotalEstimate, 150.0, 11.0),
            ],
            n,
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let err = CostMonteCarloModel::new(vec![normal(CostColumn::MaterialCost, 1.0, 1.0)], 0, 1);
        assert!(matches!(err, Err(CostAtlasError::SimulationErr(_))));
    }

    #[test]
    fn test_missing_formula_input_rejected() {
        let engine = CostMonteCarloModel::new(
            vec![
                normal(CostColumn::MaterialCost, 100.0, 10.0),
                normal(CostColumn::LaborCost, 50.0, 5.0),
            ],
            10,
            1,
        )
        .unwrap();
        assert!(engine.simulate_scenario(&Scenario::new("baseline")).is_err());
        let engine = engine.with_total_formula(TotalFormula::Sum).unwrap();
        assert!(engine.simulate_scenario(&Scenario::new("baseline")).is_ok());
        let engine = CostMonteCarloModel::new(vec![normal(CostColumn::LaborCost, 5.0, 1.0)], 10, 1)
            .unwrap();
        assert!(engine.with_total_formula(TotalFormula::Sum).is_err());
    }

    #[test]
    fn test_reproducible_length_and_values() {
        let a = model(1000, 42).simulate_scenario(&Scenario::new("baseline")).unwrap();
        let b = model(1000, 42).simulate_scenario(&Scenario::new("baseline")).unwrap();
        assert_eq!(a.len(), 1000);
        assert_eq!(a.total(), b.total());
        let c = model(1000, 43).simulate_scenario(&Scenario::new("baseline")).unwrap();
        assert_ne!(a.total(), c.total());
    }

    #[test]
    fn test_identity_scenario_matches_baseline() {
        let engine = model(2000, 9);
        let run = engine
            .run_scenarios(&[
                Scenario::new("baseline"),
                Scenario::new("identity")
                    .with_adjustment(CostColumn::MaterialCost, 1.0)
                    .with_adjustment(CostColumn::LaborCost, 1.0),
            ])
            .unwrap();
        let base = run.get("baseline").unwrap().total_statistics().unwrap();
        let identity = run.get("identity").unwrap().total_statistics().unwrap();
        assert!((base.mean - identity.mean).abs() < 1e-9);
        assert!((base.std - identity.std).abs() < 1e-9);
    }

    #[test]
    fn test_material_increase_shifts_mean() {
        let engine = model(10_000, 2024);
        let run = engine
            .run_scenarios(&[
                Scenario::new("baseline"),
                Scenario::new("material_up_10pct").with_adjustment(CostColumn::MaterialCost, 1.1),
            ])
            .unwrap();
        let base = run.get("baseline").unwrap().total_statistics().unwrap().mean;
        let up = run
            .get("material_up_10pct")
            .unwrap()
            .total_statistics()
            .unwrap()
            .mean;
        let shift = up - base;
        // 10% of a mean material cost of 100, within Monte Carlo error.
        assert!((shift - 10.0).abs() < 0.5, "shift {}", shift);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let engine = model(500, 5);
        let scenarios = Scenario::default_set();
        let sequential = engine.run_scenarios(&scenarios).unwrap();
        let parallel = engine.par_run_scenarios(&scenarios).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.scenario_names()[0], "baseline");
    }

    #[test]
    fn test_markup_formula() {
        let total = TotalFormula::Markup.combine(100.0, 50.0, 10.0, -5.0);
        assert!((total - 160.0).abs() < 1e-12);
        assert_eq!(TotalFormula::Sum.combine(100.0, 50.0, 10.0, -5.0), 150.0);
        assert_eq!("SUM".parse::<TotalFormula>().unwrap(), TotalFormula::Sum);
    }

    #[test]
    fn test_observed_baseline_follows_formula() {
        use crate::data::dataset::CostRecord;
        let dataset = Dataset::new(vec![
            CostRecord::new([100.0, 50.0, 10.0, 0.0, 165.0], None),
            CostRecord::new([200.0, 100.0, 10.0, -10.0, 320.0], None),
        ]);
        assert_eq!(TotalFormula::Markup.observed_baseline(&dataset), Some(242.5));
        assert_eq!(TotalFormula::Sum.observed_baseline(&dataset), Some(225.0));
        assert_eq!(TotalFormula::Sum.observed_baseline(&Dataset::default()), None);
    }
}
