use costatlas::prelude::*;

/// The static charts, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    DistributionAnalysis,
    RiskMetrics,
    ScenarioComparison,
    CorrelationHeatmap,
    SensitivityAnalysis,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::DistributionAnalysis,
        ChartKind::RiskMetrics,
        ChartKind::ScenarioComparison,
        ChartKind::CorrelationHeatmap,
        ChartKind::SensitivityAnalysis,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ChartKind::DistributionAnalysis => "01_distribution_analysis.png",
            ChartKind::RiskMetrics => "02_risk_metrics.png",
            ChartKind::ScenarioComparison => "03_scenario_comparison.png",
            ChartKind::CorrelationHeatmap => "04_correlation_heatmap.png",
            ChartKind::SensitivityAnalysis => "05_sensitivity_analysis.png",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::DistributionAnalysis => "Baseline Distribution Analysis",
            ChartKind::RiskMetrics => "Risk Metrics by Scenario",
            ChartKind::ScenarioComparison => "Scenario Comparison",
            ChartKind::CorrelationHeatmap => "Correlation of Simulated Variables",
            ChartKind::SensitivityAnalysis => "Sensitivity Analysis",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width histogram over the sample range. A constant sample lands in one bin.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let (lo, hi) = padded_range(
        finite.iter().copied().fold(f64::INFINITY, f64::min),
        finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    );
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: lo + i as f64 * width,
            end: lo + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

/// Returns a non-degenerate axis range covering `[min, max]`.
pub fn padded_range(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if max > min {
        (min, max)
    } else {
        let pad = if min.abs() > 0.0 { min.abs() * 0.05 } else { 1.0 };
        (min - pad, max + pad)
    }
}

/// Pearson matrix between every simulated variable of one scenario.
pub fn sample_correlation(result: &SimulationResult) -> CorrelationMatrix {
    let series: Vec<(String, Vec<f64>)> = Variable::ALL
        .iter()
        .filter_map(|v| result.samples(*v).map(|s| (v.name().to_string(), s.clone())))
        .collect();
    CorrelationMatrix::from_series(&series)
}

/// Diverging blue-white-red scale for a correlation in `[-1, 1]`; grey when undefined.
pub fn heat_color(r: Option<f64>) -> (u8, u8, u8) {
    let Some(r) = r else {
        return (200, 200, 200);
    };
    let t = r.clamp(-1.0, 1.0);
    let fade = |c: f64| (255.0 - (255.0 - c) * t.abs()).round() as u8;
    if t >= 0.0 {
        (fade(178.0), fade(24.0), fade(43.0))
    } else {
        (fade(33.0), fade(102.0), fade(172.0))
    }
}

/// Name at an integer axis position, empty between positions.
pub fn category_label(names: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    names.get(idx as usize).cloned().unwrap_or_default()
}

/// Shortens long scenario names for axis labels.
pub fn short_label(name: &str) -> String {
    name.replace("_increase_", "+")
        .replace("pct", "%")
        .replace('_', " ")
}
