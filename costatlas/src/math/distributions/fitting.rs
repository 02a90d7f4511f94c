use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, warn};

use super::family::DistributionFamily;
use super::fitted::{DistributionModel, FittedDistribution, ParametricDistribution};
use super::gamma::fit_gamma_mle;
use crate::data::columns::CostColumn;
use crate::data::dataset::Dataset;
use crate::math::statistics::{mean, population_std_dev};
use crate::utils::errors::{CostAtlasError, Result};

/// One-sample Kolmogorov-Smirnov statistic of sorted data against a CDF.
pub fn ks_statistic<F: Fn(f64) -> f64>(sorted: &[f64], cdf: F) -> f64 {
    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(i, x)| {
            let f = cdf(*x);
            let above = (i as f64 + 1.0) / n - f;
            let below = f - i as f64 / n;
            above.max(below)
        })
        .fold(0.0, f64::max)
}

/// Asymptotic Kolmogorov p-value of a one-sample KS statistic over `n` observations.
///
/// ## Details
/// - Uses the effective `lambda = (sqrt(n) + 0.12 + 0.11 / sqrt(n)) * d` and the
///   alternating series `2 * sum((-1)^(j-1) * exp(-2 j^2 lambda^2))`.
/// - Returns `1.0` for tiny statistics and for `n == 0`.
pub fn ks_p_value(statistic: f64, n: usize) -> f64 {
    if n == 0 || !statistic.is_finite() || statistic <= 0.0 {
        return 1.0;
    }
    let root = (n as f64).sqrt();
    let lambda = (root + 0.12 + 0.11 / root) * statistic;
    if lambda < 0.2 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for j in 1..=100 {
        let term = sign * (-2.0 * (j * j) as f64 * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-12 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Maximum-likelihood estimate of a single family, `None` when the family is
/// not applicable to the data (non-positive values, zero spread).
pub fn fit_family(family: DistributionFamily, values: &[f64]) -> Option<ParametricDistribution> {
    if values.len() < 2 {
        return None;
    }
    if family.requires_positive() && values.iter().any(|v| *v <= 0.0) {
        return None;
    }
    match family {
        DistributionFamily::Normal => {
            let mean = mean(values)?;
            let std_dev = population_std_dev(values)?;
            (std_dev > 0.0 && std_dev.is_finite())
                .then_some(ParametricDistribution::Normal { mean, std_dev })
        }
        DistributionFamily::LogNormal => {
            let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
            let mu = mean(&logs)?;
            let sigma = population_std_dev(&logs)?;
            (sigma > 0.0 && sigma.is_finite())
                .then_some(ParametricDistribution::LogNormal { mu, sigma })
        }
        DistributionFamily::Gamma => match fit_gamma_mle(values) {
            Ok((shape, scale)) => Some(ParametricDistribution::Gamma { shape, scale }),
            Err(e) => {
                debug!(error = %e, "gamma not applicable");
                None
            }
        },
        DistributionFamily::Uniform => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (max > min).then_some(ParametricDistribution::Uniform { min, max })
        }
    }
}

/// # DistributionFitter
/// Scores every candidate family against a column and keeps the one with the
/// smallest KS statistic. Ties keep the earlier candidate.
///
/// ## Example
/// ```
/// use costatlas::prelude::*;
/// let values: Vec<f64> = (1..=50).map(|i| i as f64).collect();
/// let fitted = DistributionFitter::default()
///     .fit_column(CostColumn::MaterialCost, &values)
///     .unwrap();
/// assert_eq!(fitted.family(), Some(DistributionFamily::Uniform));
/// ```
#[derive(Debug, Clone)]
pub struct DistributionFitter {
    candidates: Vec<DistributionFamily>,
}

impl Default for DistributionFitter {
    fn default() -> Self {
        DistributionFitter {
            candidates: DistributionFamily::DEFAULT_CANDIDATES.to_vec(),
        }
    }
}

impl DistributionFitter {
    pub fn new(candidates: Vec<DistributionFamily>) -> DistributionFitter {
        DistributionFitter { candidates }
    }

    pub fn candidates(&self) -> &Vec<DistributionFamily> {
        &self.candidates
    }

    /// Fits a column. Errors with `FitErr` when no candidate applies.
    pub fn fit_column(&self, column: CostColumn, values: &[f64]) -> Result<FittedDistribution> {
        if values.len() < 2 {
            return Err(CostAtlasError::FitErr(format!(
                "Column {} has {} observation(s), at least 2 are needed",
                column,
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CostAtlasError::FitErr(format!(
                "Column {} contains non-finite values",
                column
            )));
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut best: Option<(ParametricDistribution, f64)> = None;
        for family in &self.candidates {
            let Some(candidate) = fit_family(*family, values) else {
                debug!(column = %column, family = %family, "family not applicable");
                continue;
            };
            let cdf = match candidate.cdf_fn() {
                Ok(cdf) => cdf,
                Err(e) => {
                    debug!(column = %column, family = %family, error = %e, "family rejected");
                    continue;
                }
            };
            let d = ks_statistic(&sorted, cdf);
            debug!(column = %column, family = %family, ks = d, "candidate scored");
            if !d.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((candidate, d));
            }
        }

        let (distribution, d) = best.ok_or_else(|| {
            CostAtlasError::FitErr(format!(
                "No candidate family fits column {}",
                column
            ))
        })?;
        Ok(FittedDistribution::new(
            column,
            DistributionModel::Parametric(distribution),
            Some(d),
            mean(values).unwrap_or(0.0),
            sample_std(values),
            (sorted[0], sorted[sorted.len() - 1]),
            values.len(),
            None,
        ))
    }

    /// Fits a column, replacing a `FitErr` with an empirical resampling model.
    pub fn fit_column_or_empirical(&self, column: CostColumn, values: &[f64]) -> FittedDistribution {
        match self.fit_column(column, values) {
            Ok(fitted) => fitted,
            Err(e) => {
                warn!(column = %column, error = %e, "falling back to empirical resampling");
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                FittedDistribution::new(
                    column,
                    DistributionModel::Empirical {
                        observations: values.to_vec(),
                    },
                    None,
                    mean(values).unwrap_or(0.0),
                    sample_std(values),
                    (min, max),
                    values.len(),
                    Some(e.to_string()),
                )
            }
        }
    }

    /// Fits every required column of a dataset, in `CostColumn::ALL` order.
    pub fn fit_dataset(&self, dataset: &Dataset) -> Result<Vec<FittedDistribution>> {
        if dataset.is_empty() {
            return Err(CostAtlasError::DataErr(
                "Cannot fit distributions on an empty dataset".to_string(),
            ));
        }
        let fitted: Vec<FittedDistribution> = CostColumn::ALL
            .to_vec()
            .into_par_iter()
            .map(|column| self.fit_column_or_empirical(column, &dataset.column(column)))
            .collect();
        for f in &fitted {
            info!(
                column = %f.column(),
                family = f.family_name(),
                ks = f.ks_statistic().unwrap_or(f64::NAN),
                "distribution selected"
            );
        }
        Ok(fitted)
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::CostRecord;
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::{Distribution, LogNormal, Normal};

    #[test]
    fn test_ks_p_value() {
        // lambda close to 1.36, the 5% critical value of the Kolmogorov distribution
        let p = ks_p_value(0.136, 100);
        assert!(p > 0.03 && p < 0.06, "p {}", p);
        assert!(ks_p_value(0.01, 100) > 0.99);
        assert!(ks_p_value(0.5, 100) < 1e-6);
        assert_eq!(ks_p_value(0.3, 0), 1.0);
        assert!(ks_p_value(0.05, 100) > ks_p_value(0.1, 100));
    }

    fn normal_values(n: usize, mean: f64, std: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = Normal::new(mean, std).unwrap();
        (0..n).map(|_| d.sample(&mut rng)).collect()
    }

    #[test]
    fn test_ks_statistic_perfect_uniform() {
        let sorted: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
        let d = ks_statistic(&sorted, |x| x.clamp(0.0, 1.0));
        assert!(d <= 0.1 + 1e-12);
    }

    #[test]
    fn test_normal_data_selects_normal() {
        let values = normal_values(2000, 100.0, 10.0, 11);
        let fitted = DistributionFitter::default()
            .fit_column(CostColumn::MaterialCost, &values)
            .unwrap();
        assert!(matches!(
            fitted.family(),
            Some(DistributionFamily::Normal)
                | Some(DistributionFamily::LogNormal)
                | Some(DistributionFamily::Gamma)
        ));
        assert_ne!(fitted.family(), Some(DistributionFamily::Uniform));
        assert!((fitted.observed_mean() - 100.0).abs() < 1.0);
    }

    #[test]
    fn test_lognormal_data_selects_skewed_family() {
        let mut rng = StdRng::seed_from_u64(5);
        let d = LogNormal::new(3.0, 0.8).unwrap();
        let values: Vec<f64> = (0..3000).map(|_| d.sample(&mut rng)).collect();
        let fitted = DistributionFitter::default()
            .fit_column(CostColumn::LaborCost, &values)
            .unwrap();
        assert!(matches!(
            fitted.family(),
            Some(DistributionFamily::LogNormal) | Some(DistributionFamily::Gamma)
        ));
    }

    #[test]
    fn test_negative_values_skip_positive_families() {
        let values = vec![-5.0, -1.0, 0.0, 2.0, 4.0, 7.0];
        assert!(fit_family(DistributionFamily::LogNormal, &values).is_none());
        assert!(fit_family(DistributionFamily::Gamma, &values).is_none());
        assert!(fit_family(DistributionFamily::Normal, &values).is_some());
    }

    #[test]
    fn test_deterministic() {
        let values = normal_values(500, 50.0, 5.0, 3);
        let fitter = DistributionFitter::default();
        let a = fitter.fit_column(CostColumn::LaborCost, &values).unwrap();
        let b = fitter.fit_column(CostColumn::LaborCost, &values).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_column_fails_then_falls_back() {
        let values = vec![10.0; 20];
        let fitter = DistributionFitter::default();
        assert!(matches!(
            fitter.fit_column(CostColumn::ProfitRate, &values),
            Err(CostAtlasError::FitErr(_))
        ));
        let fallback = fitter.fit_column_or_empirical(CostColumn::ProfitRate, &values);
        assert!(fallback.is_empirical());
        assert!(fallback.fallback_reason().is_some());
    }

    #[test]
    fn test_candidate_restriction() {
        let values: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let fitter = DistributionFitter::new(vec![DistributionFamily::Normal]);
        let fitted = fitter.fit_column(CostColumn::MaterialCost, &values).unwrap();
        assert_eq!(fitted.family(), Some(DistributionFamily::Normal));
    }

    #[test]
    fn test_fit_dataset_order() {
        let records = (0..30)
            .map(|i| {
                let x = i as f64;
                CostRecord::new([100.0 + x, 50.0 + x * 0.5, 10.0, -2.0 + x * 0.1, 170.0 + x], None)
            })
            .collect();
        let fitted = DistributionFitter::default()
            .fit_dataset(&Dataset::new(records))
            .unwrap();
        let columns: Vec<CostColumn> = fitted.iter().map(|f| f.column()).collect();
        assert_eq!(columns, CostColumn::ALL.to_vec());
        assert!(fitted[CostColumn::ProfitRate.index()].is_empirical());
    }
}
