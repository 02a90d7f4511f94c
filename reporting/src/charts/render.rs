use std::fs;
use std::path::{Path, PathBuf};

use costatlas::prelude::*;
use plotters::prelude::*;
use tracing::{info, warn};

use super::data::{
    category_label, heat_color, histogram, padded_range, sample_correlation, short_label,
    ChartKind,
};
use crate::utils::errors::{ReportingError, Result};

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 800;
const HISTOGRAM_BINS: usize = 50;

fn chart_err<E: std::fmt::Display>(e: E) -> ReportingError {
    ReportingError::ChartErr(e.to_string())
}

/// # ChartRenderer
/// Renders the PNG charts of a run into one directory.
///
/// ## Details
/// - Every chart is 1200x800 pixels or larger.
/// - [`ChartRenderer::render_all`] logs and skips charts that fail, so a
///   missing font or a degenerate sample never aborts a run.
pub struct ChartRenderer {
    output_dir: PathBuf,
    base_scenario: String,
}

impl ChartRenderer {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> ChartRenderer {
        ChartRenderer {
            output_dir: output_dir.as_ref().to_path_buf(),
            base_scenario: "baseline".to_string(),
        }
    }

    pub fn with_base_scenario(mut self, base_scenario: &str) -> Self {
        self.base_scenario = base_scenario.to_string();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path(&self, kind: ChartKind) -> PathBuf {
        self.output_dir.join(kind.file_name())
    }

    /// Renders every chart, returning the files that were written.
    pub fn render_all(&self, run: &SimulationRun, report: &SimulationReport) -> Vec<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            warn!(dir = %self.output_dir.display(), error = %e, "cannot create chart directory");
            return Vec::new();
        }
        let mut written = Vec::new();
        for kind in ChartKind::ALL {
            match self.render(kind, run, report) {
                Ok(path) => {
                    info!(chart = kind.file_name(), "chart written");
                    written.push(path);
                }
                Err(e) => warn!(chart = kind.file_name(), error = %e, "chart skipped"),
            }
        }
        written
    }

    pub fn render(
        &self,
        kind: ChartKind,
        run: &SimulationRun,
        report: &SimulationReport,
    ) -> Result<PathBuf> {
        let path = self.path(kind);
        match kind {
            ChartKind::DistributionAnalysis => {
                self.distribution_analysis(run.get(&self.base_scenario)?, &path)?
            }
            ChartKind::RiskMetrics => self.risk_metrics(report, &path)?,
            ChartKind::ScenarioComparison => self.scenario_comparison(report, &path)?,
            ChartKind::CorrelationHeatmap => {
                self.correlation_heatmap(run.get(&self.base_scenario)?, &path)?
            }
            ChartKind::SensitivityAnalysis => self.sensitivity_analysis(report, &path)?,
        }
        Ok(path)
    }

    fn distribution_analysis(&self, result: &SimulationResult, path: &Path) -> Result<()> {
        let root = BitMapBackend::new(path, (1800, 1000)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let root = root
            .titled(ChartKind::DistributionAnalysis.title(), ("sans-serif", 36))
            .map_err(chart_err)?;
        let panels = root.split_evenly((2, 3));

        for (panel, variable) in panels.iter().zip(Variable::ALL.iter()) {
            let Some(samples) = result.samples(*variable) else {
                continue;
            };
            let bins = histogram(samples, HISTOGRAM_BINS);
            let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
                continue;
            };
            let peak = bins.iter().map(|b| b.count).max().unwrap_or(1).max(1) as f64;
            let mean = result.statistics(*variable).map(|s| s.mean);

            let mut chart = ChartBuilder::on(panel)
                .caption(variable.name(), ("sans-serif", 22))
                .margin(12)
                .x_label_area_size(35)
                .y_label_area_size(55)
                .build_cartesian_2d(first.start..last.end, 0.0..peak * 1.1)
                .map_err(chart_err)?;
            chart
                .configure_mesh()
                .x_labels(5)
                .y_desc("Frequency")
                .label_style(("sans-serif", 14))
                .draw()
                .map_err(chart_err)?;
            chart
                .draw_series(bins.iter().map(|b| {
                    Rectangle::new(
                        [(b.start, 0.0), (b.end, b.count as f64)],
                        RGBColor(70, 130, 180).mix(0.75).filled(),
                    )
                }))
                .map_err(chart_err)?;
            if let Some(mean) = mean {
                chart
                    .draw_series(LineSeries::new(
                        vec![(mean, 0.0), (mean, peak * 1.05)],
                        RED.stroke_width(2),
                    ))
                    .map_err(chart_err)?;
            }
        }
        root.present().map_err(chart_err)?;
        Ok(())
    }

    fn risk_metrics(&self, report: &SimulationReport, path: &Path) -> Result<()> {
        let names: Vec<String> = report.scenarios.iter().map(|s| short_label(&s.scenario)).collect();
        let series: [(&str, RGBColor, fn(&RiskMetrics) -> f64); 3] = [
            ("VaR 95%", RGBColor(255, 127, 14), |m| m.var_95),
            ("VaR 99%", RGBColor(214, 39, 40), |m| m.var_99),
            ("CVaR 95%", RGBColor(148, 103, 189), |m| m.cvar_95),
        ];
        let values: Vec<f64> = report
            .scenarios
            .iter()
            .flat_map(|s| series.iter().map(move |(_, _, f)| f(&s.risk_metrics)))
            .collect();
        let (lo, hi) = value_range(&values);

        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::RiskMetrics.title(), ("sans-serif", 32))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(90)
            .build_cartesian_2d(-0.5..(names.len() as f64 - 0.5), lo..hi)
            .map_err(chart_err)?;
        let formatter = |x: &f64| category_label(&names, *x);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len())
            .x_label_formatter(&formatter)
            .y_desc("Total cost")
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(chart_err)?;

        let width = 0.8 / series.len() as f64;
        for (k, (label, color, metric)) in series.iter().enumerate() {
            let color = *color;
            chart
                .draw_series(report.scenarios.iter().enumerate().map(|(i, s)| {
                    let x0 = i as f64 - 0.4 + k as f64 * width;
                    Rectangle::new([(x0, lo), (x0 + width, metric(&s.risk_metrics))], color.filled())
                }))
                .map_err(chart_err)?
                .label(*label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
        Ok(())
    }

    fn scenario_comparison(&self, report: &SimulationReport, path: &Path) -> Result<()> {
        let totals: Vec<(String, SummaryStatistics)> = report
            .scenarios
            .iter()
            .filter_map(|s| {
                s.statistics
                    .get(Variable::TotalCalculated.name())
                    .map(|stats| (short_label(&s.scenario), *stats))
            })
            .collect();
        if totals.is_empty() {
            return Err(ReportingError::ChartErr("No scenario totals to compare".to_string()));
        }
        let names: Vec<String> = totals.iter().map(|(n, _)| n.clone()).collect();
        let bounds: Vec<f64> = totals.iter().flat_map(|(_, s)| [s.q25, s.q75]).collect();
        let (lo, hi) = value_range(&bounds);

        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::ScenarioComparison.title(), ("sans-serif", 32))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(90)
            .build_cartesian_2d(-0.5..(names.len() as f64 - 0.5), lo..hi)
            .map_err(chart_err)?;
        let formatter = |x: &f64| category_label(&names, *x);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len())
            .x_label_formatter(&formatter)
            .y_desc("Mean total cost (q25 to q75)")
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(chart_err)?;
        chart
            .draw_series(totals.iter().enumerate().map(|(i, (_, s))| {
                ErrorBar::new_vertical(i as f64, s.q25, s.mean, s.q75, BLUE.stroke_width(2), 20)
            }))
            .map_err(chart_err)?;
        chart
            .draw_series(
                totals
                    .iter()
                    .enumerate()
                    .map(|(i, (_, s))| Circle::new((i as f64, s.mean), 6, RED.filled())),
            )
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
        Ok(())
    }

    fn correlation_heatmap(&self, result: &SimulationResult, path: &Path) -> Result<()> {
        let matrix = sample_correlation(result);
        let n = matrix.size();
        if n == 0 {
            return Err(ReportingError::ChartErr("Empty correlation matrix".to_string()));
        }
        let names: Vec<String> = matrix.names().iter().map(|s| s.replace('_', " ")).collect();

        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::CorrelationHeatmap.title(), ("sans-serif", 32))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(200)
            .build_cartesian_2d(-0.5..(n as f64 - 0.5), -0.5..(n as f64 - 0.5))
            .map_err(chart_err)?;
        // first variable on the top row
        let row = |i: usize| (n - 1 - i) as f64;
        let x_formatter = |x: &f64| category_label(&names, *x);
        let y_formatter = |y: &f64| category_label(&names, n as f64 - 1.0 - *y);
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n)
            .y_labels(n)
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .label_style(("sans-serif", 13))
            .draw()
            .map_err(chart_err)?;

        let cells: Vec<(usize, usize, Option<f64>)> = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .map(|(i, j)| (i, j, matrix.get(i, j)))
            .collect();
        chart
            .draw_series(cells.iter().map(|(i, j, r)| {
                let (red, green, blue) = heat_color(*r);
                let (x, y) = (*j as f64, row(*i));
                Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    RGBColor(red, green, blue).filled(),
                )
            }))
            .map_err(chart_err)?;
        chart
            .draw_series(cells.iter().map(|(i, j, r)| {
                let label = r.map_or("n/a".to_string(), |r| format!("{:.2}", r));
                Text::new(label, (*j as f64 - 0.15, row(*i)), ("sans-serif", 16))
            }))
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
        Ok(())
    }

    fn sensitivity_analysis(&self, report: &SimulationReport, path: &Path) -> Result<()> {
        let entries: Vec<&SensitivityEntry> = report
            .sensitivity
            .iter()
            .filter(|e| e.scenario != report.base_scenario)
            .collect();
        if entries.is_empty() {
            return Err(ReportingError::ChartErr(
                "No scenarios besides the base scenario".to_string(),
            ));
        }
        let names: Vec<String> = entries.iter().map(|e| short_label(&e.scenario)).collect();
        let changes: Vec<f64> = entries.iter().map(|e| e.percent_change).collect();
        let lo = changes.iter().copied().fold(0.0, f64::min);
        let hi = changes.iter().copied().fold(0.0, f64::max);
        let (lo, hi) = padded_range(lo * 1.15, hi * 1.15);

        let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(ChartKind::SensitivityAnalysis.title(), ("sans-serif", 32))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(-0.5..(names.len() as f64 - 0.5), lo..hi)
            .map_err(chart_err)?;
        let formatter = |x: &f64| category_label(&names, *x);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len())
            .x_label_formatter(&formatter)
            .y_desc("Change in mean total cost vs base (%)")
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(chart_err)?;
        chart
            .draw_series(changes.iter().enumerate().map(|(i, change)| {
                let color = if *change >= 0.0 {
                    RGBColor(214, 39, 40)
                } else {
                    RGBColor(44, 160, 44)
                };
                Rectangle::new([(i as f64 - 0.35, 0.0), (i as f64 + 0.35, *change)], color.filled())
            }))
            .map_err(chart_err)?;
        chart
            .draw_series(LineSeries::new(
                vec![(-0.5, 0.0), (names.len() as f64 - 0.5, 0.0)],
                BLACK.stroke_width(1),
            ))
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
        Ok(())
    }
}

// axis range with a 10% margin above, anchored near the smallest value below
fn value_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = padded_range(min, max);
    let span = hi - lo;
    (lo - span * 0.1, hi + span * 0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_paths() {
        let renderer = ChartRenderer::new("/tmp/plots");
        assert_eq!(
            renderer.path(ChartKind::RiskMetrics),
            PathBuf::from("/tmp/plots/02_risk_metrics.png")
        );
    }

    #[test]
    fn test_value_range_margin() {
        let (lo, hi) = value_range(&[100.0, 200.0]);
        assert_eq!((lo, hi), (90.0, 210.0));
    }
}
