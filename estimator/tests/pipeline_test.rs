use std::fs;
use std::path::Path;

use costatlas::prelude::{CostColumn, MissingValuePolicy, TotalFormula, NORMALITY_ALPHA};
use estimator::prelude::*;

fn write_dataset(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from(
        "Project_Type,Material_Cost,Labor_Cost,Profit_Rate,Discount_or_Markup,Total_Estimate\n",
    );
    for i in 0..60 {
        let material = 50_000.0 + (i % 12) as f64 * 1_250.0 + (i % 5) as f64 * 310.0;
        let labor = 20_000.0 + (i % 7) as f64 * 900.0;
        let profit = 10.0 + (i % 4) as f64 * 2.5;
        let discount = -1_000.0 + (i % 3) as f64 * 1_000.0;
        let total = (material + labor) * (1.0 + profit / 100.0) + discount;
        let label = if i % 2 == 0 { "Residential" } else { "Commercial" };
        csv.push_str(&format!(
            "{},{:.2},{:.2},{:.1},{:.2},{:.2}\n",
            label, material, labor, profit, discount, total
        ));
    }
    csv.push_str("Residential,\"$1,200.50\",N/A,12,0,\n");
    let path = dir.join("estimates.csv");
    fs::write(&path, csv).unwrap();
    path
}

fn config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.input.path = write_dataset(dir);
    config.input.label_column = Some("Project_Type".to_string());
    config.output.dir = dir.join("output");
    config.apply_overrides(&CliOverrides {
        n_simulations: Some(2_000),
        no_ai: true,
        no_charts: true,
        no_progress: true,
        ..CliOverrides::default()
    });
    config
}

#[test]
fn run_writes_every_report() {
    init_test();
    let dir = tempfile::tempdir().unwrap();
    let outcome = Pipeline::new(config(dir.path())).unwrap().run().unwrap();

    assert_eq!(outcome.dataset_rows, 60);
    assert_eq!(outcome.cleaning.rows_read, 61);
    assert_eq!(outcome.report.scenarios.len(), 8);
    assert!(outcome.charts.is_empty());
    assert_eq!(outcome.dashboards.len(), 3);

    let output = dir.path().join("output");
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output.join(RESULTS_FILE)).unwrap()).unwrap();
    assert_eq!(json["n_simulations"], 2_000);
    assert_eq!(json["scenarios"].as_array().unwrap().len(), 8);

    let summary = fs::read_to_string(outcome.summary_path.unwrap()).unwrap();
    assert!(summary.contains("Baseline Total Estimate"));

    let ai = outcome.ai_report.unwrap();
    assert!(ai.narrative.is_local());
    assert!(output.join(AI_REPORT_DIR).join("ai_report.html").exists());
    assert!(output.join(AI_REPORT_DIR).join("ai_report.txt").exists());

    let base = outcome.report.base().unwrap();
    let increase = outcome.report.scenario("material_increase_10pct").unwrap();
    assert!(increase.risk_metrics.var_95 > base.risk_metrics.var_95);
    let reduction = outcome.report.scenario("cost_reduction").unwrap();
    assert!(reduction.risk_metrics.var_95 < base.risk_metrics.var_95);
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let dir = tempfile::tempdir().unwrap();
    let mut parallel = config(dir.path());
    parallel.output.dashboards = false;
    parallel.output.summary = false;
    parallel.output.ai_report = false;
    let mut sequential = parallel.clone();
    sequential.simulation.parallel = false;

    let a = Pipeline::new(parallel).unwrap().run().unwrap();
    let b = Pipeline::new(sequential).unwrap().run().unwrap();
    assert_eq!(a.report, b.report);
    assert!(a.summary_path.is_none());
    assert!(a.ai_report.is_none());
}

#[test]
fn sum_formula_measures_loss_against_material_plus_labor() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.simulation.total_formula = TotalFormula::Sum;
    config.output.dashboards = false;
    config.output.summary = false;
    config.output.ai_report = false;
    let outcome = Pipeline::new(config).unwrap().run().unwrap();

    let base = outcome.report.base().unwrap();
    let p_loss = base.risk_metrics.probability_of_loss;
    assert!(p_loss > 0.35 && p_loss < 0.65, "probability of loss {}", p_loss);
    assert!(base.risk_metrics.baseline > 75_000.0 && base.risk_metrics.baseline < 85_000.0);
}

#[test]
fn explore_and_fit_read_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.input.missing_policy = MissingValuePolicy::ImputeMedian;
    let pipeline = Pipeline::new(config).unwrap();

    let (profile, cleaning) = pipeline.explore().unwrap();
    assert_eq!(profile.rows(), 61);
    assert_eq!(cleaning.cells_imputed, 2);
    assert_eq!(profile.label_counts().get("Residential"), Some(&31));
    let text = format_profile(&profile, &cleaning);
    assert!(text.contains("Material_Cost"));
    assert!(text.contains("Strong correlations"));
    assert!(text.contains("Normality"));
    let material = &profile.columns()[CostColumn::MaterialCost.index()];
    let normality = material.normality.unwrap();
    assert!(normality.p_value >= 0.0 && normality.p_value <= 1.0);
    assert_eq!(normality.is_normal, normality.p_value > NORMALITY_ALPHA);

    let (dataset, _) = pipeline.load().unwrap();
    let fitted = pipeline.fit(&dataset).unwrap();
    assert_eq!(fitted.len(), CostColumn::ALL.len());
    assert!(format_fits(&fitted).contains("Total_Estimate"));
}

#[test]
fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.input.path = dir.path().join("absent.csv");
    let err = Pipeline::new(config).unwrap().run().unwrap_err();
    assert!(matches!(err, EstimatorError::AtlasErr(_)));
}

#[test]
fn config_file_round_trip_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("estimator.toml");
    fs::write(
        &path,
        "[simulation]\nseed = 9\ntotal_formula = \"sum\"\n\n[ai]\nenabled = false\n",
    )
    .unwrap();
    let mut config = PipelineConfig::load(Some(path.as_path())).unwrap();
    config.apply_overrides(&CliOverrides {
        seed: Some(11),
        ..CliOverrides::default()
    });
    assert_eq!(config.simulation.seed, 11);
    assert_eq!(config.simulation.total_formula, TotalFormula::Sum);
    assert!(!config.ai.enabled);
    assert!(matches!(
        PipelineConfig::load(Some(dir.path().join("nope.toml").as_path())),
        Err(EstimatorError::ConfigErr(_))
    ));
}
