use std::fs;
use std::path::{Path, PathBuf};

use costatlas::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::charts::data::sample_correlation;
use crate::utils::errors::Result;
use crate::utils::html::escape_html;

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const MAX_POINTS_PER_TRACE: usize = 5_000;
const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
];

/// The interactive dashboards, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardKind {
    Distribution,
    Risk,
    Sensitivity,
}

impl DashboardKind {
    pub const ALL: [DashboardKind; 3] = [
        DashboardKind::Distribution,
        DashboardKind::Risk,
        DashboardKind::Sensitivity,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            DashboardKind::Distribution => "01_distribution_dashboard.html",
            DashboardKind::Risk => "02_risk_dashboard.html",
            DashboardKind::Sensitivity => "03_sensitivity_dashboard.html",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DashboardKind::Distribution => "Monte Carlo Distribution Dashboard",
            DashboardKind::Risk => "Monte Carlo Risk Dashboard",
            DashboardKind::Sensitivity => "Monte Carlo Sensitivity Dashboard",
        }
    }
}

/// One plotly figure: traces and layout, serialized verbatim into the page.
#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub id: String,
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    pub fn new(id: &str, title: &str, data: Vec<Value>) -> Figure {
        Figure {
            id: id.to_string(),
            data,
            layout: json!({
                "title": { "text": title },
                "height": 480,
                "margin": { "t": 60, "l": 70, "r": 30, "b": 90 },
            }),
        }
    }

    pub fn with_axes(mut self, x_title: &str, y_title: &str) -> Self {
        self.layout["xaxis"] = json!({ "title": { "text": x_title } });
        self.layout["yaxis"] = json!({ "title": { "text": y_title } });
        self
    }

    pub fn with_layout(mut self, key: &str, value: Value) -> Self {
        self.layout[key] = value;
        self
    }
}

/// Every `k`-th sample so that at most `max_points` remain.
pub fn thin(samples: &[f64], max_points: usize) -> Vec<f64> {
    if max_points == 0 || samples.len() <= max_points {
        return samples.to_vec();
    }
    let step = samples.len().div_ceil(max_points);
    samples.iter().step_by(step).copied().collect()
}

// JSON embedded in a <script> block must not close it
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Standalone HTML page drawing `figures` with plotly.js.
pub fn render_page(title: &str, subtitle: &str, figures: &[Figure]) -> Result<String> {
    let mut divs = String::new();
    let mut scripts = String::new();
    for figure in figures {
        divs.push_str(&format!(
            "    <div class=\"figure\" id=\"{}\"></div>\n",
            escape_html(&figure.id)
        ));
        scripts.push_str(&format!(
            "Plotly.newPlot({}, {}, {}, {{\"responsive\": true}});\n",
            script_json(&figure.id)?,
            script_json(&figure.data)?,
            script_json(&figure.layout)?
        ));
    }
    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <script src="{cdn}"></script>
  <style>
    body {{ font-family: Segoe UI, Helvetica, Arial, sans-serif; margin: 0; background: #f5f7fa; color: #222; }}
    header {{ background: linear-gradient(135deg, #667eea, #764ba2); color: white; padding: 24px 40px; }}
    header h1 {{ margin: 0 0 6px 0; }}
    .grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(560px, 1fr)); gap: 20px; padding: 24px 40px; }}
    .figure {{ background: white; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.08); }}
  </style>
</head>
<body>
  <header>
    <h1>{title}</h1>
    <div>{subtitle}</div>
  </header>
  <main class="grid">
{divs}  </main>
  <script>
{scripts}  </script>
</body>
</html>
"#,
        title = escape_html(title),
        subtitle = escape_html(subtitle),
        cdn = PLOTLY_CDN,
        divs = divs,
        scripts = scripts,
    ))
}

/// # DashboardRenderer
/// Writes the interactive plotly dashboards of a run.
pub struct DashboardRenderer {
    output_dir: PathBuf,
    subtitle: String,
}

impl DashboardRenderer {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> DashboardRenderer {
        DashboardRenderer {
            output_dir: output_dir.as_ref().to_path_buf(),
            subtitle: String::new(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = subtitle.to_string();
        self
    }

    pub fn path(&self, kind: DashboardKind) -> PathBuf {
        self.output_dir.join(kind.file_name())
    }

    /// Renders every dashboard, logging and skipping failures.
    pub fn render_all(&self, run: &SimulationRun, report: &SimulationReport) -> Vec<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            warn!(dir = %self.output_dir.display(), error = %e, "cannot create dashboard directory");
            return Vec::new();
        }
        DashboardKind::ALL
            .iter()
            .filter_map(|kind| match self.render(*kind, run, report) {
                Ok(path) => {
                    info!(dashboard = kind.file_name(), "dashboard written");
                    Some(path)
                }
                Err(e) => {
                    warn!(dashboard = kind.file_name(), error = %e, "dashboard skipped");
                    None
                }
            })
            .collect()
    }

    pub fn render(
        &self,
        kind: DashboardKind,
        run: &SimulationRun,
        report: &SimulationReport,
    ) -> Result<PathBuf> {
        let figures = match kind {
            DashboardKind::Distribution => distribution_figures(run),
            DashboardKind::Risk => risk_figures(run, report),
            DashboardKind::Sensitivity => sensitivity_figures(run, report)?,
        };
        let html = render_page(kind.title(), &self.subtitle, &figures)?;
        let path = self.path(kind);
        fs::write(&path, html)?;
        Ok(path)
    }
}

fn color(i: usize) -> &'static str {
    PALETTE[i % PALETTE.len()]
}

fn total_samples(result: &SimulationResult) -> Vec<f64> {
    thin(result.total(), MAX_POINTS_PER_TRACE)
}

pub fn distribution_figures(run: &SimulationRun) -> Vec<Figure> {
    let mut histograms = Vec::new();
    let mut boxes = Vec::new();
    let mut violins = Vec::new();
    let mut cumulative = Vec::new();
    for (i, result) in run.results().iter().enumerate() {
        let samples = total_samples(result);
        let name = result.name();
        histograms.push(json!({
            "type": "histogram", "x": samples, "name": name, "opacity": 0.6,
            "nbinsx": 50, "legendgroup": name, "marker": { "color": color(i) },
        }));
        boxes.push(json!({
            "type": "box", "y": samples, "name": name, "showlegend": false,
            "marker": { "color": color(i) },
        }));
        violins.push(json!({
            "type": "violin", "y": samples, "name": name, "showlegend": false,
            "line": { "color": color(i) },
        }));
        let mut sorted = samples;
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len() as f64;
        let probabilities: Vec<f64> = (1..=sorted.len()).map(|k| k as f64 / n).collect();
        cumulative.push(json!({
            "type": "scatter", "mode": "lines", "x": sorted, "y": probabilities,
            "name": name, "line": { "color": color(i), "width": 2 },
        }));
    }
    vec![
        Figure::new("distribution-comparison", "Distribution Comparison", histograms)
            .with_axes("Total cost", "Frequency")
            .with_layout("barmode", json!("overlay")),
        Figure::new("box-analysis", "Box Plot Analysis", boxes).with_axes("Scenario", "Total cost"),
        Figure::new("violin-analysis", "Violin Plot Analysis", violins)
            .with_axes("Scenario", "Total cost"),
        Figure::new("cumulative-distribution", "Cumulative Distribution", cumulative)
            .with_axes("Total cost", "Cumulative probability"),
    ]
}

pub fn risk_figures(run: &SimulationRun, report: &SimulationReport) -> Vec<Figure> {
    let names: Vec<&str> = report.scenarios.iter().map(|s| s.scenario.as_str()).collect();
    let metric = |f: fn(&RiskMetrics) -> f64| -> Vec<f64> {
        report.scenarios.iter().map(|s| f(&s.risk_metrics)).collect()
    };
    let var_95 = metric(|m| m.var_95);
    let shortfall = metric(|m| m.expected_shortfall);
    let loss: Vec<f64> = metric(|m| m.probability_of_loss * 100.0);

    let bars = vec![
        json!({ "type": "bar", "x": names, "y": var_95, "name": "VaR 95%" }),
        json!({ "type": "bar", "x": names, "y": metric(|m| m.var_99), "name": "VaR 99%" }),
        json!({ "type": "bar", "x": names, "y": metric(|m| m.cvar_95), "name": "CVaR 95%" }),
        json!({ "type": "bar", "x": names, "y": metric(|m| m.cvar_99), "name": "CVaR 99%" }),
    ];
    let boxes: Vec<Value> = run
        .results()
        .iter()
        .enumerate()
        .map(|(i, r)| {
            json!({
                "type": "box", "y": total_samples(r), "name": r.name(),
                "boxpoints": false, "marker": { "color": color(i) },
            })
        })
        .collect();
    let loss_bars = vec![json!({
        "type": "bar", "x": names, "y": loss, "name": "Probability of loss (%)",
        "marker": { "color": "#d62728" },
    })];
    let profile = vec![json!({
        "type": "scatter", "mode": "markers+text", "x": var_95, "y": shortfall,
        "text": names, "textposition": "top center", "name": "Risk profile",
        "marker": {
            "size": 14, "color": loss, "colorscale": "RdYlGn", "reversescale": true,
            "showscale": true, "colorbar": { "title": { "text": "Prob. loss (%)" } },
        },
    })];
    vec![
        Figure::new("var-comparison", "Value at Risk Comparison", bars)
            .with_axes("Scenario", "Total cost")
            .with_layout("barmode", json!("group")),
        Figure::new("total-spread", "Total Cost Spread", boxes).with_axes("Scenario", "Total cost"),
        Figure::new("probability-of-loss", "Probability of Loss", loss_bars)
            .with_axes("Scenario", "Probability (%)"),
        Figure::new("risk-profile", "Risk Profile", profile)
            .with_axes("VaR 95%", "Expected shortfall"),
    ]
}

pub fn sensitivity_figures(run: &SimulationRun, report: &SimulationReport) -> Result<Vec<Figure>> {
    let base = report.base_scenario.as_str();
    let variables = variable_sensitivity(run, base)?;
    let scenarios: Vec<&str> = report
        .scenarios
        .iter()
        .map(|s| s.scenario.as_str())
        .filter(|s| *s != base)
        .collect();
    let variable_names: Vec<&str> = Variable::ALL.iter().map(|v| v.name()).collect();
    let z: Vec<Vec<Option<f64>>> = Variable::ALL
        .iter()
        .map(|variable| {
            scenarios
                .iter()
                .map(|scenario| {
                    variables
                        .iter()
                        .find(|e| e.variable == *variable && e.scenario == *scenario)
                        .map(|e| e.mean_change_percent)
                })
                .collect()
        })
        .collect();
    let heatmap = vec![json!({
        "type": "heatmap", "x": scenarios, "y": variable_names, "z": z,
        "colorscale": "RdBu", "reversescale": true, "zmid": 0,
        "colorbar": { "title": { "text": "Change (%)" } },
    })];

    let mut tornado_order: Vec<&SensitivityEntry> = report
        .sensitivity
        .iter()
        .filter(|e| e.scenario != base)
        .collect();
    tornado_order.sort_by(|a, b| a.absolute_change.abs().total_cmp(&b.absolute_change.abs()));
    let tornado = vec![json!({
        "type": "bar", "orientation": "h",
        "y": tornado_order.iter().map(|e| e.scenario.as_str()).collect::<Vec<_>>(),
        "x": tornado_order.iter().map(|e| e.absolute_change).collect::<Vec<_>>(),
        "marker": {
            "color": tornado_order
                .iter()
                .map(|e| if e.absolute_change >= 0.0 { "#d62728" } else { "#2ca02c" })
                .collect::<Vec<_>>(),
        },
        "name": "Impact on total cost",
    })];

    let component_bars: Vec<Value> = [
        Variable::Column(CostColumn::MaterialCost),
        Variable::Column(CostColumn::LaborCost),
        Variable::TotalCalculated,
    ]
    .iter()
    .map(|variable| {
        let changes: Vec<Option<f64>> = scenarios
            .iter()
            .map(|scenario| {
                variables
                    .iter()
                    .find(|e| e.variable == *variable && e.scenario == *scenario)
                    .map(|e| e.mean_change_percent)
            })
            .collect();
        json!({ "type": "bar", "x": scenarios, "y": changes, "name": variable.name() })
    })
    .collect();

    let totals: Vec<&VariableSensitivity> = variables
        .iter()
        .filter(|e| e.variable == Variable::TotalCalculated)
        .collect();
    let profile = vec![json!({
        "type": "scatter", "mode": "markers+text",
        "x": totals.iter().map(|e| e.mean_change_percent).collect::<Vec<_>>(),
        "y": totals.iter().map(|e| e.std_change_percent).collect::<Vec<_>>(),
        "text": totals.iter().map(|e| e.scenario.as_str()).collect::<Vec<_>>(),
        "textposition": "top center", "name": "Scenario profile",
        "marker": { "size": 14, "color": "#9467bd" },
    })];

    let correlation = sample_correlation(run.get(base)?);
    let matrix: Vec<Vec<Option<f64>>> = (0..correlation.size())
        .map(|i| (0..correlation.size()).map(|j| correlation.get(i, j)).collect())
        .collect();
    let correlation_map = vec![json!({
        "type": "heatmap", "x": correlation.names(), "y": correlation.names(), "z": matrix,
        "colorscale": "RdBu", "reversescale": true, "zmin": -1, "zmax": 1,
    })];

    Ok(vec![
        Figure::new("sensitivity-heatmap", "Sensitivity Heatmap", heatmap)
            .with_axes("Scenario", "Variable"),
        Figure::new("tornado", "Tornado Chart", tornado).with_axes("Change in mean total cost", ""),
        Figure::new("component-impact", "Component Impact", component_bars)
            .with_axes("Scenario", "Change (%)")
            .with_layout("barmode", json!("group")),
        Figure::new("scenario-profile", "Scenario Risk Profile", profile)
            .with_axes("Mean change (%)", "Standard deviation change (%)"),
        Figure::new("baseline-correlation", "Baseline Correlation", correlation_map),
    ])
}
