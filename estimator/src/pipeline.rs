use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use chrono::Local;
use costatlas::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use reporting::prelude::{
    write_summary, AiReport, AiReportGenerator, ChartRenderer, DashboardRenderer, SUMMARY_FILE,
};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::utils::errors::Result;

pub const STATIC_PLOTS_DIR: &str = "static_plots";
pub const DASHBOARDS_DIR: &str = "interactive_dashboards";
pub const AI_REPORT_DIR: &str = "ai_report";
pub const RESULTS_FILE: &str = "simulation_results.json";

/// Everything a completed run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub cleaning: CleaningReport,
    pub dataset_rows: usize,
    pub report: SimulationReport,
    pub results_path: PathBuf,
    pub summary_path: Option<PathBuf>,
    pub charts: Vec<PathBuf>,
    pub dashboards: Vec<PathBuf>,
    pub ai_report: Option<AiReport>,
}

/// # Pipeline
/// Load, fit, simulate, measure and report, in that order.
///
/// ## Details
/// - Loading, fitting and simulation errors abort the run.
/// - Chart, dashboard and narrative service failures are logged and skipped.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Pipeline> {
        config.validate()?;
        Ok(Pipeline { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn load(&self) -> Result<(Dataset, CleaningReport)> {
        let input = &self.config.input;
        info!(path = %input.path.display(), "loading dataset");
        let loaded = DatasetLoader::new(&input.path)
            .with_delimiter(self.config.delimiter()?)
            .with_missing_policy(input.missing_policy)
            .with_label_column(input.label_column.clone())
            .load()?;
        Ok(loaded)
    }

    pub fn explore(&self) -> Result<(DatasetProfile, CleaningReport)> {
        let (dataset, cleaning) = self.load()?;
        Ok((DatasetProfile::explore(&dataset)?, cleaning))
    }

    pub fn fit(&self, dataset: &Dataset) -> Result<Vec<FittedDistribution>> {
        let fitter = DistributionFitter::new(self.config.candidates()?);
        Ok(fitter.fit_dataset(dataset)?)
    }

    /// Runs every configured scenario, reporting progress per scenario.
    pub fn simulate(&self, distributions: Vec<FittedDistribution>) -> Result<SimulationRun> {
        let simulation = &self.config.simulation;
        let engine =
            CostMonteCarloModel::new(distributions, simulation.n_simulations, simulation.seed)?
                .with_total_formula(simulation.total_formula)?;

        let progress = if self.config.output.progress {
            let pb = ProgressBar::new(simulation.scenarios.len() as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            {
                pb.set_style(style);
            }
            pb.set_message("Scenarios");
            pb
        } else {
            ProgressBar::hidden()
        };

        let tracked = ProgressEngine::new(&engine, &progress);
        let run = if simulation.parallel {
            tracked.par_run_scenarios(&simulation.scenarios)
        } else {
            tracked.run_scenarios(&simulation.scenarios)
        };
        progress.finish_and_clear();
        let run = run?;

        info!(
            scenarios = run.results().len(),
            n_simulations = run.n_simulations(),
            parallel = simulation.parallel,
            "simulation finished"
        );
        Ok(run)
    }

    pub fn run(&self) -> Result<PipelineOutcome> {
        let (dataset, cleaning) = self.load()?;
        let formula = self.config.simulation.total_formula;
        let baseline = formula.observed_baseline(&dataset).ok_or_else(|| {
            CostAtlasError::DataErr("Dataset has no rows to derive a baseline from".to_string())
        })?;
        info!(baseline, formula = ?formula, "baseline total");

        let distributions = self.fit(&dataset)?;
        let run = self.simulate(distributions.clone())?;
        let calculator = RiskCalculator::new(baseline);
        let report = SimulationReport::build(
            &run,
            &distributions,
            &calculator,
            &self.config.simulation.base_scenario,
        )?;

        let output = &self.config.output;
        fs::create_dir_all(&output.dir)?;
        let results_path = output.dir.join(RESULTS_FILE);
        fs::write(&results_path, report.to_json()?)?;
        info!(path = %results_path.display(), "results written");

        let charts = if output.charts {
            ChartRenderer::new(output.dir.join(STATIC_PLOTS_DIR))
                .with_base_scenario(&report.base_scenario)
                .render_all(&run, &report)
        } else {
            Vec::new()
        };
        let dashboards = if output.dashboards {
            DashboardRenderer::new(output.dir.join(DASHBOARDS_DIR))
                .with_subtitle(&format!(
                    "{} scenarios, {} simulations each, seed {}",
                    report.scenarios.len(),
                    report.n_simulations,
                    report.seed
                ))
                .render_all(&run, &report)
        } else {
            Vec::new()
        };

        let summary_path = if output.summary {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            write_summary(&report, &timestamp, &output.dir)?;
            Some(output.dir.join(SUMMARY_FILE))
        } else {
            None
        };

        let ai_report = if output.ai_report {
            let generator =
                AiReportGenerator::from_config(output.dir.join(AI_REPORT_DIR), &self.config.ai);
            match generator.generate(&report, dataset.len(), &charts) {
                Ok(ai) => Some(ai),
                Err(e) => {
                    warn!(error = %e, "AI report skipped");
                    None
                }
            }
        } else {
            None
        };

        Ok(PipelineOutcome {
            cleaning,
            dataset_rows: dataset.len(),
            report,
            results_path,
            summary_path,
            charts,
            dashboards,
            ai_report,
        })
    }
}

/// Engine adapter that ticks a progress bar after every simulated scenario.
struct ProgressEngine<'a, E> {
    inner: &'a E,
    progress: &'a ProgressBar,
}

impl<'a, E> ProgressEngine<'a, E> {
    fn new(inner: &'a E, progress: &'a ProgressBar) -> Self {
        ProgressEngine { inner, progress }
    }
}

impl<E: MonteCarloEngine> MonteCarloEngine for ProgressEngine<'_, E> {
    fn simulate_scenario(
        &self,
        scenario: &Scenario,
    ) -> costatlas::prelude::Result<SimulationResult> {
        let result = self.inner.simulate_scenario(scenario);
        self.progress.inc(1);
        result
    }

    fn seed(&self) -> u64 {
        self.inner.seed()
    }

    fn n_simulations(&self) -> usize {
        self.inner.n_simulations()
    }

    fn total_formula(&self) -> TotalFormula {
        self.inner.total_formula()
    }
}

impl<E: ParallelMonteCarloEngine> ParallelMonteCarloEngine for ProgressEngine<'_, E> {}

/// Console rendering of a dataset profile.
pub fn format_profile(profile: &DatasetProfile, cleaning: &CleaningReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Rows: {} kept of {} read ({} invalid dropped, {} imputed cells, {} duplicates removed)",
        cleaning.rows_kept,
        cleaning.rows_read,
        cleaning.rows_dropped_invalid,
        cleaning.cells_imputed,
        cleaning.duplicates_removed
    );
    let _ = writeln!(
        out,
        "\n{:<20} {:>6} {:>6} {:>14} {:>14} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "column", "count", "unique", "mean", "std", "min", "q25", "median", "q75", "max"
    );
    for column in profile.columns() {
        let s = &column.statistics;
        let _ = writeln!(
            out,
            "{:<20} {:>6} {:>6} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
            column.column.header(),
            s.count,
            column.unique,
            s.mean,
            s.std,
            s.min,
            s.q25,
            s.median,
            s.q75,
            s.max
        );
    }
    if !profile.label_counts().is_empty() {
        let _ = writeln!(out, "\nLabels:");
        for (label, count) in profile.label_counts() {
            let _ = writeln!(out, "  {:<24} {}", label, count);
        }
    }
    let _ = writeln!(out, "\nNormality (KS against fitted normal, alpha {}):", NORMALITY_ALPHA);
    for column in profile.columns() {
        match &column.normality {
            Some(test) => {
                let _ = writeln!(
                    out,
                    "  {:<20} D {:.4}  p {:.4}  {}",
                    column.column.header(),
                    test.ks_statistic,
                    test.p_value,
                    if test.is_normal { "normal" } else { "non-normal" }
                );
            }
            None => {
                let _ = writeln!(out, "  {:<20} n/a", column.column.header());
            }
        }
    }
    let strong = profile.strong_correlations();
    let _ = writeln!(out, "\nStrong correlations (|r| > {}):", STRONG_CORRELATION);
    if strong.is_empty() {
        let _ = writeln!(out, "  none");
    }
    for (a, b, r) in strong {
        let _ = writeln!(out, "  {} ~ {}: {:.3}", a, b, r);
    }
    out
}

/// Console rendering of the fitted distributions.
pub fn format_fits(distributions: &[FittedDistribution]) -> String {
    let mut out = String::new();
    for fitted in distributions {
        let parameters = match fitted.model() {
            DistributionModel::Parametric(p) => {
                let (a, b) = p.parameters();
                format!("({:.4}, {:.4})", a, b)
            }
            DistributionModel::Empirical { observations } => {
                format!("{} observations", observations.len())
            }
        };
        let _ = writeln!(
            out,
            "{:<20} {:<10} {:<36} KS {}",
            fitted.column().header(),
            fitted.family_name(),
            parameters,
            fitted
                .ks_statistic()
                .map_or("n/a".to_string(), |d| format!("{:.4}", d))
        );
        if let Some(reason) = fitted.fallback_reason() {
            let _ = writeln!(out, "  fallback: {}", reason);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fits() {
        let fitted = DistributionFitter::default()
            .fit_column_or_empirical(CostColumn::LaborCost, &[42.0]);
        let text = format_fits(&[fitted]);
        assert!(text.contains("Labor_Cost"));
        assert!(text.contains("1 observations"));
        assert!(text.contains("KS n/a"));
    }

    #[test]
    fn test_progress_engine_ticks_per_scenario() {
        let distributions = vec![
            DistributionFitter::default().fit_column_or_empirical(
                CostColumn::MaterialCost,
                &[100.0, 120.0, 90.0, 110.0, 105.0],
            ),
            DistributionFitter::default()
                .fit_column_or_empirical(CostColumn::LaborCost, &[40.0, 55.0, 50.0, 45.0, 60.0]),
        ];
        let engine = CostMonteCarloModel::new(distributions, 200, 7)
            .unwrap()
            .with_total_formula(TotalFormula::Sum)
            .unwrap();
        let scenarios = Scenario::default_set();

        let progress = ProgressBar::hidden();
        let run = ProgressEngine::new(&engine, &progress)
            .par_run_scenarios(&scenarios)
            .unwrap();
        assert_eq!(progress.position(), scenarios.len() as u64);
        assert_eq!(run, engine.run_scenarios(&scenarios).unwrap());

        let progress = ProgressBar::hidden();
        let invalid = [Scenario::new("baseline"), Scenario::new("baseline")];
        assert!(ProgressEngine::new(&engine, &progress)
            .run_scenarios(&invalid)
            .is_err());
        assert_eq!(progress.position(), 0);
    }
}
