use std::fmt::Write;

use costatlas::prelude::*;

pub const SYSTEM_PROMPT: &str = "You are a construction cost analyst. Explain Monte Carlo cost \
simulation results to a non-technical project owner in plain language. Use short sections with \
markdown headings: Executive Summary, Understanding the Risk, Scenario Insights, Recommendations. \
Quote the figures you are given and do not invent new ones.";

/// Summary-statistics prompt for the narrative service. Raw samples are never sent.
pub fn build_prompt(report: &SimulationReport, dataset_rows: usize) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Monte Carlo simulation of construction cost estimates: {} historical projects, {} simulations per scenario, seed {}.",
        dataset_rows, report.n_simulations, report.seed
    );
    let _ = writeln!(
        prompt,
        "Historical baseline cost (mean Total_Estimate): {:.2}",
        report.baseline_cost
    );

    let _ = writeln!(prompt, "\nFitted input distributions:");
    for fitted in &report.distributions {
        let _ = writeln!(
            prompt,
            "- {}: {} (KS {}), observed mean {:.2}, std {:.2}",
            fitted.column(),
            fitted.family_name(),
            fitted
                .ks_statistic()
                .map_or("n/a".to_string(), |d| format!("{:.4}", d)),
            fitted.observed_mean(),
            fitted.observed_std()
        );
    }

    let _ = writeln!(prompt, "\nScenarios (calculated total cost):");
    for summary in &report.scenarios {
        let Some(total) = summary.statistics.get(Variable::TotalCalculated.name()) else {
            continue;
        };
        let m = &summary.risk_metrics;
        let adjustments = if summary.adjustments.is_empty() {
            "no adjustments".to_string()
        } else {
            summary
                .adjustments
                .iter()
                .map(|(column, factor)| format!("{} x{:.2}", column, factor))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(
            prompt,
            "- {} ({}): mean {:.2}, std {:.2}, median {:.2}, VaR95 {:.2}, VaR99 {:.2}, CVaR95 {:.2}, P(cost > baseline) {:.1}%, risk level {}",
            summary.scenario,
            adjustments,
            total.mean,
            total.std,
            total.median,
            m.var_95,
            m.var_99,
            m.cvar_95,
            m.probability_of_loss * 100.0,
            m.risk_level
        );
    }

    let _ = writeln!(prompt, "\nChange of mean total versus {}:", report.base_scenario);
    for entry in report
        .sensitivity
        .iter()
        .filter(|e| e.scenario != report.base_scenario)
    {
        let _ = writeln!(
            prompt,
            "- {}: {:+.2}% ({:+.2})",
            entry.scenario, entry.percent_change, entry.absolute_change
        );
    }
    let _ = writeln!(
        prompt,
        "\nWrite the report. Recommend a contingency budget and the cost drivers to monitor."
    );
    prompt
}
