use std::fmt::Write;
use std::fs;
use std::path::Path;

use costatlas::prelude::*;

use crate::utils::errors::Result;
use crate::utils::html::format_amount;

pub const SUMMARY_FILE: &str = "summary_report.txt";

fn money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let mut whole = value.abs().trunc();
    let mut cents = (value.abs().fract() * 100.0).round() as u64;
    if cents >= 100 {
        whole += 1.0;
        cents = 0;
    }
    format!("{}${}.{:02}", sign, format_amount(whole), cents)
}

/// Plain-text summary of a run: executive summary, key findings, scenario
/// analysis and recommendations.
pub fn render_summary(report: &SimulationReport, timestamp: &str) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "MONTE CARLO SIMULATION - CONSTRUCTION PRICING ANALYSIS");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Generated on: {}\n", timestamp);

    let _ = writeln!(out, "EXECUTIVE SUMMARY\n{}", "-".repeat(20));
    let _ = writeln!(
        out,
        "This Monte Carlo simulation analyzed construction pricing data to assess\nrisk and uncertainty in project cost estimates. {} scenarios were run with\n{} simulations each, varying material and labor cost assumptions.\n",
        report.scenarios.len(),
        report.n_simulations
    );

    let base = report.base();
    let _ = writeln!(out, "KEY FINDINGS\n{}", "-".repeat(15));
    if let Some(base) = base {
        if let Some(stats) = base.statistics.get(Variable::TotalCalculated.name()) {
            let _ = writeln!(out, "* Baseline Total Estimate: {} (mean)", money(stats.mean));
            let _ = writeln!(out, "* Standard Deviation: {}", money(stats.std));
            let _ = writeln!(
                out,
                "* Interquartile Range: {} - {}",
                money(stats.q25),
                money(stats.q75)
            );
        }
        let _ = writeln!(out, "* Value at Risk (95%): {}", money(base.risk_metrics.var_95));
        let _ = writeln!(
            out,
            "* Probability of Loss: {:.1}%",
            base.risk_metrics.probability_of_loss * 100.0
        );
        let _ = writeln!(out, "* Risk Level: {}", base.risk_metrics.risk_level);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "SCENARIO ANALYSIS\n{}", "-".repeat(20));
    for summary in report
        .scenarios
        .iter()
        .filter(|s| s.scenario != report.base_scenario)
    {
        let Some(stats) = summary.statistics.get(Variable::TotalCalculated.name()) else {
            continue;
        };
        let change = report
            .sensitivity
            .iter()
            .find(|e| e.scenario == summary.scenario)
            .map_or(0.0, |e| e.percent_change);
        let title = Scenario::new(summary.scenario.as_str()).title();
        let _ = writeln!(out, "\n{}:", title);
        let _ = writeln!(out, "  * Mean Estimate: {}", money(stats.mean));
        let _ = writeln!(out, "  * Change from Baseline: {:+.1}%", change);
        let _ = writeln!(out, "  * Standard Deviation: {}", money(stats.std));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "RECOMMENDATIONS\n{}", "-".repeat(16));
    let _ = writeln!(
        out,
        "1. Risk Management: Consider hedging strategies for material cost volatility"
    );
    let _ = writeln!(
        out,
        "2. Contingency Planning: Maintain 15-20% contingency for cost overruns"
    );
    let _ = writeln!(
        out,
        "3. Scenario Planning: Regularly update cost assumptions based on market conditions"
    );
    let _ = writeln!(
        out,
        "4. Monitoring: Track actual costs against simulated ranges for model validation"
    );
    let _ = writeln!(out, "\n{}\nEnd of Report", rule);
    out
}

pub fn write_summary(report: &SimulationReport, timestamp: &str, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    fs::write(output_dir.join(SUMMARY_FILE), render_summary(report, timestamp))?;
    Ok(())
}
