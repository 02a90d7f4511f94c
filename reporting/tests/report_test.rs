use std::cell::Cell;

use costatlas::prelude::{
    CostColumn, CostMonteCarloModel, DistributionModel, FittedDistribution, MonteCarloEngine,
    ParametricDistribution, RiskCalculator, Scenario, SimulationReport, SimulationRun,
    TotalFormula,
};
use reporting::prelude::*;

fn simulate() -> (SimulationRun, SimulationReport) {
    let normal = |column, mean: f64, std_dev: f64| {
        FittedDistribution::new(
            column,
            DistributionModel::Parametric(ParametricDistribution::Normal { mean, std_dev }),
            Some(0.02),
            mean,
            std_dev,
            (mean - 3.0 * std_dev, mean + 3.0 * std_dev),
            100,
            None,
        )
    };
    let distributions = vec![
        normal(CostColumn::MaterialCost, 60_000.0, 6_000.0),
        normal(CostColumn::LaborCost, 25_000.0, 2_500.0),
    ];
    let engine = CostMonteCarloModel::new(distributions.clone(), 1_000, 3)
        .and_then(|m| m.with_total_formula(TotalFormula::Sum))
        .unwrap();
    let run = engine.run_scenarios(&Scenario::default_set()).unwrap();
    let report =
        SimulationReport::build(&run, &distributions, &RiskCalculator::new(85_000.0), "baseline")
            .unwrap();
    (run, report)
}

struct FailingService {
    calls: Cell<usize>,
}

impl NarrativeService for FailingService {
    fn name(&self) -> &str {
        "failing"
    }

    fn generate(&self, _system_prompt: &str, _prompt: &str) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        Err(ReportingError::ServiceErr("connection refused".to_string()))
    }
}

struct CannedService;

impl NarrativeService for CannedService {
    fn name(&self) -> &str {
        "canned"
    }

    fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        assert!(system_prompt.contains("construction cost"));
        assert!(prompt.contains("material_increase_10pct"));
        Ok("## Executive Summary\nCosts are <stable>.\n\n## Recommendations\nKeep 15% contingency.".to_string())
    }
}

#[test]
fn failing_service_falls_back_to_local_narrative() {
    let (_, report) = simulate();
    let dir = tempfile::tempdir().unwrap();
    let generator = AiReportGenerator::new(dir.path()).with_service(Box::new(FailingService {
        calls: Cell::new(0),
    }));
    let ai = generator.generate(&report, 100, &[]).unwrap();

    assert!(ai.narrative.is_local());
    match &ai.narrative.source {
        NarrativeSource::Local { reason } => assert!(reason.contains("connection refused")),
        other => panic!("unexpected source {:?}", other),
    }
    let titles: Vec<&str> = ai.narrative.sections.iter().map(|s| s.title.as_str()).collect();
    assert!(titles.contains(&"Executive Summary"));
    assert!(titles.contains(&"Scenario Insights"));

    let html = std::fs::read_to_string(&ai.html_path).unwrap();
    assert!(html.contains("Generated locally"));
    let text = std::fs::read_to_string(&ai.text_path).unwrap();
    assert!(text.contains("SCENARIO OVERVIEW"));
    assert!(text.contains("cost_reduction"));
}

#[test]
fn service_text_is_escaped_into_the_report() {
    let (_, report) = simulate();
    let dir = tempfile::tempdir().unwrap();
    let ai = AiReportGenerator::new(dir.path())
        .with_service(Box::new(CannedService))
        .generate(&report, 100, &[])
        .unwrap();
    assert!(!ai.narrative.is_local());
    assert_eq!(ai.narrative.sections.len(), 2);
    let html = std::fs::read_to_string(&ai.html_path).unwrap();
    assert!(html.contains("Costs are &lt;stable&gt;."));
    assert!(html.contains("Generated by AI service (canned)"));
}

#[test]
fn disabled_service_uses_local_narrative() {
    let (_, report) = simulate();
    let dir = tempfile::tempdir().unwrap();
    let config = AiServiceConfig {
        enabled: false,
        ..AiServiceConfig::default()
    };
    let narrative = AiReportGenerator::from_config(dir.path(), &config).narrative(&report, 10);
    assert_eq!(
        narrative.source,
        NarrativeSource::Local {
            reason: "AI service disabled".to_string()
        }
    );
}

#[test]
fn dashboards_and_summary_are_written() {
    let (run, report) = simulate();
    let dir = tempfile::tempdir().unwrap();
    let written = DashboardRenderer::new(dir.path().join("interactive_dashboards")).render_all(&run, &report);
    assert_eq!(written.len(), 3);
    let risk = std::fs::read_to_string(&written[1]).unwrap();
    assert!(risk.contains("Plotly.newPlot"));
    assert!(risk.contains("VaR 95%"));

    write_summary(&report, "2026-01-01 00:00:00", dir.path()).unwrap();
    let summary = std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
    assert!(summary.contains("KEY FINDINGS"));
    assert!(summary.contains("Material Increase 10pct:"));
    assert!(!summary.contains("\nBaseline:"));
}

#[test]
fn prompt_carries_summary_statistics_only() {
    let (_, report) = simulate();
    let prompt = build_prompt(&report, 100);
    assert!(prompt.contains("100 historical projects"));
    assert!(prompt.contains("VaR95"));
    assert!(prompt.contains("Material_Cost x1.10"));
    assert!(prompt.lines().count() < 40);
}
