use costatlas::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::html::{format_amount, format_percent};

pub const MINIMAL_IMPACT: f64 = 5.0;
pub const MODERATE_IMPACT: f64 = 15.0;

/// Where the narrative text came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NarrativeSource {
    Service { name: String },
    Local { reason: String },
}

impl NarrativeSource {
    pub fn describe(&self) -> String {
        match self {
            NarrativeSource::Service { name } => format!("Generated by AI service ({})", name),
            NarrativeSource::Local { reason } => {
                format!("Generated locally from the simulation results ({})", reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl NarrativeSection {
    pub fn new(title: &str, paragraphs: Vec<String>) -> NarrativeSection {
        NarrativeSection {
            title: title.to_string(),
            paragraphs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub source: NarrativeSource,
    pub sections: Vec<NarrativeSection>,
}

impl Narrative {
    /// Splits free text into paragraphs; markdown headings start new sections.
    pub fn from_text(source: NarrativeSource, text: &str) -> Narrative {
        let mut sections = Vec::new();
        let mut current = NarrativeSection::new("Analysis", Vec::new());
        for block in text.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
            if let Some(heading) = block.lines().next().filter(|l| l.starts_with('#')) {
                if !current.paragraphs.is_empty() {
                    sections.push(current);
                }
                current = NarrativeSection::new(heading.trim_start_matches('#').trim(), Vec::new());
                let rest: Vec<&str> = block.lines().skip(1).collect();
                if !rest.is_empty() {
                    current.paragraphs.push(rest.join("\n"));
                }
            } else {
                current.paragraphs.push(block.to_string());
            }
        }
        if !current.paragraphs.is_empty() {
            sections.push(current);
        }
        Narrative { source, sections }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, NarrativeSource::Local { .. })
    }
}

/// Severity band of a scenario impact in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactBand {
    Minimal,
    Moderate,
    Major,
}

impl ImpactBand {
    pub fn from_impact(impact_percent: f64) -> ImpactBand {
        let impact = impact_percent.abs();
        if impact < MINIMAL_IMPACT {
            ImpactBand::Minimal
        } else if impact < MODERATE_IMPACT {
            ImpactBand::Moderate
        } else {
            ImpactBand::Major
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            ImpactBand::Minimal => "Minimal impact: no specific action needed.",
            ImpactBand::Moderate => "Moderate impact: prepare a contingency budget.",
            ImpactBand::Major => "Major impact: a risk mitigation strategy is needed.",
        }
    }
}

/// Builds the narrative from the simulation results alone.
pub fn compose_local(report: &SimulationReport, dataset_rows: usize, reason: &str) -> Narrative {
    let mut sections = Vec::new();
    let base = report.base();
    let total = base.and_then(|b| b.statistics.get(Variable::TotalCalculated.name()));

    if let (Some(base), Some(total)) = (base, total) {
        let metrics = &base.risk_metrics;
        sections.push(NarrativeSection::new(
            "Executive Summary",
            vec![
                format!(
                    "Across {} simulated outcomes the expected total project cost is {} with a typical variation of {}.",
                    report.n_simulations,
                    format_amount(total.mean),
                    format_amount(total.std)
                ),
                "Think of it as running the same project many times under different conditions: the figures below describe the costs that are most likely to occur.".to_string(),
                format!(
                    "The distributions were fitted to {} historical estimates, the baseline cost of the dataset being {}.",
                    dataset_rows,
                    format_amount(report.baseline_cost)
                ),
            ],
        ));
        sections.push(NarrativeSection::new(
            "Understanding the Risk",
            vec![
                format!(
                    "VaR 95% is {}: in 95 out of 100 runs the project cost stays at or below this value. VaR 99% is {}.",
                    format_amount(metrics.var_95),
                    format_amount(metrics.var_99)
                ),
                format!(
                    "When costs do exceed VaR 95%, they average {} (expected shortfall).",
                    format_amount(metrics.expected_shortfall)
                ),
                format!(
                    "The probability that the cost exceeds the historical baseline is {:.1}%.",
                    metrics.probability_of_loss * 100.0
                ),
                format!(
                    "The overall risk level is {} (coefficient of variation {:.3}).",
                    metrics.risk_level, metrics.coefficient_of_variation
                ),
            ],
        ));
    }

    let insights: Vec<String> = report
        .sensitivity
        .iter()
        .filter(|e| e.scenario != report.base_scenario)
        .map(|e| {
            format!(
                "{}: mean cost {} ({}). {}",
                e.scenario,
                format_amount(e.mean),
                format_percent(e.percent_change),
                ImpactBand::from_impact(e.percent_change).recommendation()
            )
        })
        .collect();
    if !insights.is_empty() {
        sections.push(NarrativeSection::new("Scenario Insights", insights));
    }

    let mut recommendations = Vec::new();
    if let (Some(base), Some(total)) = (base, total) {
        let contingency = contingency_percent(base.risk_metrics.risk_level);
        recommendations.push(format!(
            "Budget planning: reserve a base budget of {} plus a {:.0}% contingency.",
            format_amount(total.mean),
            contingency
        ));
        recommendations.push(format!(
            "Risk mitigation: the project shows a {} risk level, keep the budget at or above VaR 95% ({}) for critical commitments.",
            base.risk_metrics.risk_level.to_string().to_lowercase(),
            format_amount(base.risk_metrics.var_95)
        ));
    }
    if let Some(driver) = report
        .sensitivity
        .iter()
        .filter(|e| e.scenario != report.base_scenario)
        .max_by(|a, b| a.percent_change.abs().total_cmp(&b.percent_change.abs()))
    {
        recommendations.push(format!(
            "Monitoring: the {} scenario moves the cost most ({}), track the drivers it adjusts closely.",
            driver.scenario,
            format_percent(driver.percent_change)
        ));
    }
    if !recommendations.is_empty() {
        sections.push(NarrativeSection::new("Recommendations", recommendations));
    }

    Narrative {
        source: NarrativeSource::Local {
            reason: reason.to_string(),
        },
        sections,
    }
}

fn contingency_percent(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Low => 10.0,
        RiskLevel::Medium => 15.0,
        RiskLevel::High => 20.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_bands() {
        assert_eq!(ImpactBand::from_impact(4.9), ImpactBand::Minimal);
        assert_eq!(ImpactBand::from_impact(-4.9), ImpactBand::Minimal);
        assert_eq!(ImpactBand::from_impact(5.0), ImpactBand::Moderate);
        assert_eq!(ImpactBand::from_impact(-14.0), ImpactBand::Moderate);
        assert_eq!(ImpactBand::from_impact(15.0), ImpactBand::Major);
    }

    #[test]
    fn test_from_text_sections() {
        let text = "Intro paragraph.\n\n## Risk\nVaR is high.\n\nSecond risk paragraph.\n\n# Actions\n\nDo things.";
        let narrative = Narrative::from_text(
            NarrativeSource::Service {
                name: "m".to_string(),
            },
            text,
        );
        let titles: Vec<&str> = narrative.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Analysis", "Risk", "Actions"]);
        assert_eq!(narrative.sections[1].paragraphs.len(), 2);
        assert!(!narrative.is_local());
    }
}
