use criterion::{black_box, criterion_group, criterion_main, Criterion};
use costatlas::prelude::*;

fn engine(n: usize) -> CostMonteCarloModel {
    let fitted = |column, model| {
        FittedDistribution::new(column, model, None, 0.0, 0.0, (0.0, 0.0), 0, None)
    };
    CostMonteCarloModel::new(
        vec![
            fitted(
                CostColumn::MaterialCost,
                DistributionModel::Parametric(ParametricDistribution::Gamma {
                    shape: 9.0,
                    scale: 6_000.0,
                }),
            ),
            fitted(
                CostColumn::LaborCost,
                DistributionModel::Parametric(ParametricDistribution::LogNormal {
                    mu: 10.0,
                    sigma: 0.3,
                }),
            ),
            fitted(
                CostColumn::ProfitRate,
                DistributionModel::Parametric(ParametricDistribution::Uniform {
                    min: 5.0,
                    max: 20.0,
                }),
            ),
            fitted(
                CostColumn::DiscountOrMarkup,
                DistributionModel::Parametric(ParametricDistribution::Normal {
                    mean: 0.0,
                    std_dev: 500.0,
                }),
            ),
        ],
        n,
        42,
    )
    .unwrap()
}

fn montecarlo_benchmark(c: &mut Criterion) {
    let model = engine(10_000);
    let scenarios = Scenario::default_set();
    c.bench_function("default scenarios sequential", |b| {
        b.iter(|| black_box(model.run_scenarios(&scenarios).unwrap()))
    });
    c.bench_function("default scenarios parallel", |b| {
        b.iter(|| black_box(model.par_run_scenarios(&scenarios).unwrap()))
    });
    let samples = model
        .simulate_scenario(&scenarios[0])
        .unwrap()
        .total()
        .to_vec();
    c.bench_function("risk metrics", |b| {
        b.iter(|| black_box(RiskCalculator::new(60_000.0).calculate(&samples).unwrap()))
    });
}

criterion_group!(benches, montecarlo_benchmark);
criterion_main!(benches);
