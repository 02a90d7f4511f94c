use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use costatlas::prelude::*;
use tracing::{info, warn};

use super::local::{compose_local, ImpactBand, Narrative, NarrativeSource};
use super::prompt::{build_prompt, SYSTEM_PROMPT};
use super::service::{AiServiceConfig, HttpNarrativeService, NarrativeService};
use crate::utils::errors::Result;
use crate::utils::html::{escape_html, format_amount, format_percent};

pub const HTML_FILE: &str = "ai_report.html";
pub const TEXT_FILE: &str = "ai_report.txt";

/// Files written by [`AiReportGenerator::generate`].
#[derive(Debug, Clone)]
pub struct AiReport {
    pub html_path: PathBuf,
    pub text_path: PathBuf,
    pub narrative: Narrative,
}

/// # AiReportGenerator
/// Writes the narrative report as HTML (charts inlined as base64) and text.
///
/// ## Details
/// - Without a service, or when the service fails, the narrative is composed
///   locally and the report states why.
pub struct AiReportGenerator {
    output_dir: PathBuf,
    service: Option<Box<dyn NarrativeService>>,
    unavailable_reason: String,
}

impl AiReportGenerator {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> AiReportGenerator {
        AiReportGenerator {
            output_dir: output_dir.as_ref().to_path_buf(),
            service: None,
            unavailable_reason: "AI service disabled".to_string(),
        }
    }

    pub fn with_service(mut self, service: Box<dyn NarrativeService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Connects the HTTP service when enabled and configured.
    pub fn from_config<P: AsRef<Path>>(output_dir: P, config: &AiServiceConfig) -> Self {
        let generator = AiReportGenerator::new(output_dir);
        if !config.enabled {
            return generator;
        }
        match HttpNarrativeService::from_env(config.clone()) {
            Ok(service) => generator.with_service(Box::new(service)),
            Err(e) => {
                warn!(error = %e, "AI service unavailable, the local narrative will be used");
                AiReportGenerator {
                    unavailable_reason: e.to_string(),
                    ..generator
                }
            }
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn narrative(&self, report: &SimulationReport, dataset_rows: usize) -> Narrative {
        let Some(service) = &self.service else {
            return compose_local(report, dataset_rows, &self.unavailable_reason);
        };
        let prompt = build_prompt(report, dataset_rows);
        match service.generate(SYSTEM_PROMPT, &prompt) {
            Ok(text) => {
                info!(service = service.name(), "narrative generated by AI service");
                Narrative::from_text(
                    NarrativeSource::Service {
                        name: service.name().to_string(),
                    },
                    &text,
                )
            }
            Err(e) => {
                warn!(service = service.name(), error = %e, "AI service failed, using local narrative");
                compose_local(report, dataset_rows, &e.to_string())
            }
        }
    }

    pub fn generate(
        &self,
        report: &SimulationReport,
        dataset_rows: usize,
        charts: &[PathBuf],
    ) -> Result<AiReport> {
        fs::create_dir_all(&self.output_dir)?;
        let narrative = self.narrative(report, dataset_rows);
        let timestamp = Local::now().format("%Y-%m-%d %H:%M").to_string();

        let html_path = self.output_dir.join(HTML_FILE);
        fs::write(&html_path, render_html(report, &narrative, charts, &timestamp))?;
        let text_path = self.output_dir.join(TEXT_FILE);
        fs::write(&text_path, render_text(report, &narrative, &timestamp))?;
        info!(path = %html_path.display(), local = narrative.is_local(), "AI report written");

        Ok(AiReport {
            html_path,
            text_path,
            narrative,
        })
    }
}

/// Base64 payload of a PNG, `None` when it cannot be read.
pub fn encode_image(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(STANDARD.encode(bytes)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "chart not embedded");
            None
        }
    }
}

fn level_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "#51cf66",
        RiskLevel::Medium => "#fcc419",
        RiskLevel::High => "#ff6b6b",
    }
}

fn band_color(band: ImpactBand) -> &'static str {
    match band {
        ImpactBand::Minimal => "#51cf66",
        ImpactBand::Moderate => "#fcc419",
        ImpactBand::Major => "#ff6b6b",
    }
}

pub fn render_html(
    report: &SimulationReport,
    narrative: &Narrative,
    charts: &[PathBuf],
    timestamp: &str,
) -> String {
    let mut cards = String::new();
    if let Some(base) = report.base() {
        let m = &base.risk_metrics;
        let mean = base
            .statistics
            .get(Variable::TotalCalculated.name())
            .map_or(f64::NAN, |s| s.mean);
        for (label, value) in [
            ("Expected cost", format_amount(mean)),
            ("VaR 95%", format_amount(m.var_95)),
            ("Expected shortfall", format_amount(m.expected_shortfall)),
            ("P(cost > baseline)", format!("{:.1}%", m.probability_of_loss * 100.0)),
        ] {
            cards.push_str(&format!(
                "<div class=\"card metric\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>\n",
                escape_html(label),
                escape_html(&value)
            ));
        }
        cards.push_str(&format!(
            "<div class=\"card metric\" style=\"border-top: 4px solid {}\"><div class=\"label\">Risk level</div><div class=\"value\">{}</div></div>\n",
            level_color(m.risk_level),
            m.risk_level
        ));
    }

    let mut sections = String::new();
    for section in &narrative.sections {
        sections.push_str(&format!(
            "<section class=\"card\">\n<h2>{}</h2>\n",
            escape_html(&section.title)
        ));
        for paragraph in &section.paragraphs {
            sections.push_str(&format!("<p>{}</p>\n", escape_html(paragraph)));
        }
        sections.push_str("</section>\n");
    }

    let mut scenario_rows = String::new();
    for entry in &report.sensitivity {
        let band = ImpactBand::from_impact(entry.percent_change);
        scenario_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td style=\"color: {}\">{}</td><td>{}</td></tr>\n",
            escape_html(&entry.scenario),
            format_amount(entry.mean),
            band_color(band),
            format_percent(entry.percent_change),
            escape_html(band.recommendation())
        ));
    }

    let mut images = String::new();
    for chart in charts {
        if let Some(encoded) = encode_image(chart) {
            let name = chart
                .file_stem()
                .map(|s| s.to_string_lossy().replace('_', " "))
                .unwrap_or_default();
            images.push_str(&format!(
                "<figure class=\"card\"><img alt=\"{name}\" src=\"data:image/png;base64,{encoded}\"><figcaption>{name}</figcaption></figure>\n",
                name = escape_html(&name),
                encoded = encoded
            ));
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Monte Carlo Cost Analysis Report</title>
  <style>
    body {{ font-family: Segoe UI, Tahoma, Verdana, sans-serif; line-height: 1.6; color: #2c3e50; margin: 0; background: #f5f7fa; }}
    .hero {{ background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 3rem 2rem; text-align: center; }}
    .container {{ max-width: 1100px; margin: 0 auto; padding: 2rem; }}
    .card {{ background: white; border-radius: 12px; padding: 1.5rem; margin: 1rem 0; box-shadow: 0 10px 30px rgba(0,0,0,0.08); }}
    .metrics {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 1rem; }}
    .metric .label {{ color: #7f8c8d; font-size: 0.9rem; }}
    .metric .value {{ font-size: 1.5rem; font-weight: bold; }}
    table {{ width: 100%; border-collapse: collapse; }}
    td, th {{ padding: 0.5rem; border-bottom: 1px solid #eee; text-align: left; }}
    img {{ max-width: 100%; }}
    .source {{ color: #7f8c8d; font-size: 0.85rem; }}
  </style>
</head>
<body>
  <div class="hero">
    <h1>Monte Carlo Cost Analysis Report</h1>
    <div>Generated {timestamp}</div>
  </div>
  <div class="container">
    <div class="metrics">
{cards}    </div>
{sections}    <section class="card">
      <h2>Scenario Overview</h2>
      <table>
        <tr><th>Scenario</th><th>Mean cost</th><th>Change</th><th>Recommendation</th></tr>
{scenario_rows}      </table>
    </section>
{images}    <p class="source">{source}</p>
  </div>
</body>
</html>
"#,
        timestamp = escape_html(timestamp),
        cards = cards,
        sections = sections,
        scenario_rows = scenario_rows,
        images = images,
        source = escape_html(&narrative.source.describe()),
    )
}

pub fn render_text(report: &SimulationReport, narrative: &Narrative, timestamp: &str) -> String {
    let rule = "=".repeat(72);
    let mut text = format!(
        "{rule}\nMONTE CARLO COST ANALYSIS REPORT\nGenerated {timestamp}\n{rule}\n\n"
    );
    for section in &narrative.sections {
        text.push_str(&section.title.to_uppercase());
        text.push('\n');
        text.push_str(&"-".repeat(section.title.len()));
        text.push('\n');
        for paragraph in &section.paragraphs {
            text.push_str(paragraph);
            text.push_str("\n\n");
        }
    }
    text.push_str("SCENARIO OVERVIEW\n-----------------\n");
    for entry in &report.sensitivity {
        text.push_str(&format!(
            "{:<28} {:>16} {:>9}\n",
            entry.scenario,
            format_amount(entry.mean),
            format_percent(entry.percent_change)
        ));
    }
    text.push_str(&format!("\n{}\n", narrative.source.describe()));
    text
}
