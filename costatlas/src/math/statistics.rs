use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::utils::errors::{CostAtlasError, Result};

/// # SummaryStatistics
/// Descriptive statistics of a sample sequence.
///
/// ## Details
/// - `std` is the sample (n - 1) standard deviation; it is `0.0` for a single value.
/// - Quantiles follow the statrs order-statistics estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
    pub q95: f64,
    pub q99: f64,
}

impl SummaryStatistics {
    pub fn from_samples(samples: &[f64]) -> Result<SummaryStatistics> {
        if samples.is_empty() {
            return Err(CostAtlasError::SimulationErr(
                "Cannot summarize an empty sample".to_string(),
            ));
        }
        let mut data = Data::new(samples.to_vec());
        let std = if samples.len() > 1 {
            samples.iter().std_dev()
        } else {
            0.0
        };
        Ok(SummaryStatistics {
            count: samples.len(),
            mean: samples.iter().mean(),
            median: OrderStatistics::median(&mut data),
            std,
            min: Statistics::min(samples.iter()),
            max: Statistics::max(samples.iter()),
            q25: data.quantile(0.25),
            q75: data.quantile(0.75),
            q95: data.quantile(0.95),
            q99: data.quantile(0.99),
        })
    }

    /// Ratio of standard deviation to mean, `0.0` when the mean is zero.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean.abs() < f64::EPSILON {
            0.0
        } else {
            self.std / self.mean.abs()
        }
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(OrderStatistics::median(&mut data))
}

pub fn quantile(values: &[f64], tau: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(data.quantile(tau))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

/// Population (maximum-likelihood) standard deviation.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().population_std_dev())
    }
}

/// Pearson correlation, `None` when either series is constant or lengths differ.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = x.iter().mean();
    let my = y.iter().mean();
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// # CorrelationMatrix
/// Pearson correlations between named series. Undefined entries (constant
/// series) are stored as `None` and serialized as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn from_series(series: &[(String, Vec<f64>)]) -> CorrelationMatrix {
        let n = series.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            for j in i..n {
                let r = if i == j {
                    pearson(&series[i].1, &series[j].1).map(|_| 1.0)
                } else {
                    pearson(&series[i].1, &series[j].1)
                };
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        CorrelationMatrix {
            names: series.iter().map(|(name, _)| name.clone()).collect(),
            values,
        }
    }

    pub fn names(&self) -> &Vec<String> {
        &self.names
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(i).and_then(|row| row.get(j)).copied().flatten()
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    /// Off-diagonal pairs with `|r| > threshold`, strongest first.
    pub fn strong_pairs(&self, threshold: f64) -> Vec<(String, String, f64)> {
        let mut pairs = Vec::new();
        for i in 0..self.size() {
            for j in (i + 1)..self.size() {
                if let Some(r) = self.get(i, j) {
                    if r.abs() > threshold {
                        pairs.push((self.names[i].clone(), self.names[j].clone(), r));
                    }
                }
            }
        }
        pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_statistics() {
        let samples: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let stats = SummaryStatistics::from_samples(&samples).unwrap();
        assert_eq!(stats.count, 100);
        assert!((stats.mean - 50.5).abs() < 1e-12);
        assert!((stats.median - 50.5).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert!(stats.q25 < stats.median && stats.median < stats.q75);
        assert!(stats.q75 <= stats.q95 && stats.q95 <= stats.q99);
        assert!(stats.q99 <= stats.max);
    }

    #[test]
    fn test_summary_single_value() {
        let stats = SummaryStatistics::from_samples(&[7.0]).unwrap();
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.median, 7.0);
        assert!(SummaryStatistics::from_samples(&[]).is_err());
    }

    #[test]
    fn test_pearson() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![2.0, 4.0, 6.0, 8.0];
        let z = vec![8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &z).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]), None);
    }

    #[test]
    fn test_correlation_matrix_symmetric() {
        let series = vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0, 5.0]),
            ("b".to_string(), vec![2.0, 1.0, 4.0, 3.0]),
            ("c".to_string(), vec![9.0, 7.0, 4.0, 1.0]),
        ];
        let matrix = CorrelationMatrix::from_series(&series);
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), Some(1.0));
            for j in 0..3 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }
        let strong = matrix.strong_pairs(0.5);
        assert_eq!(strong[0].0, "a");
        assert_eq!(strong[0].1, "c");
    }
}
