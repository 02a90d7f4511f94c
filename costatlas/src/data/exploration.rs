use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use super::columns::CostColumn;
use super::dataset::Dataset;
use crate::math::distributions::fitting::{ks_p_value, ks_statistic};
use crate::math::statistics::{mean, population_std_dev, CorrelationMatrix, SummaryStatistics};
use crate::utils::errors::Result;

pub const STRONG_CORRELATION: f64 = 0.5;
pub const NORMALITY_ALPHA: f64 = 0.05;

/// # NormalityTest
/// One-sample Kolmogorov-Smirnov test of a column against the normal
/// distribution fitted to it by maximum likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalityTest {
    pub mean: f64,
    pub std_dev: f64,
    pub ks_statistic: f64,
    pub p_value: f64,
    /// `p_value > NORMALITY_ALPHA`.
    pub is_normal: bool,
}

impl NormalityTest {
    /// `None` with fewer than two values or no spread.
    pub fn run(values: &[f64]) -> Option<NormalityTest> {
        if values.len() < 2 {
            return None;
        }
        let mean = mean(values)?;
        let std_dev = population_std_dev(values).filter(|s| *s > 0.0)?;
        let normal = Normal::new(mean, std_dev).ok()?;
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let ks_statistic = ks_statistic(&sorted, |x| normal.cdf(x));
        let p_value = ks_p_value(ks_statistic, sorted.len());
        Some(NormalityTest {
            mean,
            std_dev,
            ks_statistic,
            p_value,
            is_normal: p_value > NORMALITY_ALPHA,
        })
    }
}

/// # ColumnProfile
/// Descriptive profile of one dataset column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub column: CostColumn,
    pub unique: usize,
    pub statistics: SummaryStatistics,
    pub normality: Option<NormalityTest>,
}

/// # DatasetProfile
/// Result of exploring a cleaned dataset: per-column profiles, label counts
/// and the correlation structure between the cost drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    rows: usize,
    columns: Vec<ColumnProfile>,
    label_counts: BTreeMap<String, usize>,
    correlation: CorrelationMatrix,
}

impl DatasetProfile {
    pub fn explore(dataset: &Dataset) -> Result<DatasetProfile> {
        let mut columns = Vec::with_capacity(CostColumn::ALL.len());
        let mut series = Vec::with_capacity(CostColumn::ALL.len());
        for column in CostColumn::ALL {
            let values = dataset.column(column);
            let unique = values
                .iter()
                .map(|v| v.to_bits())
                .collect::<HashSet<u64>>()
                .len();
            columns.push(ColumnProfile {
                column,
                unique,
                statistics: SummaryStatistics::from_samples(&values)?,
                normality: NormalityTest::run(&values),
            });
            series.push((column.header().to_string(), values));
        }

        let mut label_counts = BTreeMap::new();
        for label in dataset.labels().into_iter().flatten() {
            *label_counts.entry(label.to_string()).or_insert(0) += 1;
        }

        Ok(DatasetProfile {
            rows: dataset.len(),
            columns,
            label_counts,
            correlation: CorrelationMatrix::from_series(&series),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &Vec<ColumnProfile> {
        &self.columns
    }

    pub fn label_counts(&self) -> &BTreeMap<String, usize> {
        &self.label_counts
    }

    pub fn correlation(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    pub fn strong_correlations(&self) -> Vec<(String, String, f64)> {
        self.correlation.strong_pairs(STRONG_CORRELATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::CostRecord;

    #[test]
    fn test_explore() {
        let dataset = Dataset::new(vec![
            CostRecord::new([100.0, 50.0, 10.0, 0.0, 165.0], Some("Residential".into())),
            CostRecord::new([200.0, 90.0, 10.0, 5.0, 324.0], Some("Commercial".into())),
            CostRecord::new([300.0, 140.0, 10.0, -5.0, 479.0], Some("Residential".into())),
        ]);
        let profile = DatasetProfile::explore(&dataset).unwrap();
        assert_eq!(profile.rows(), 3);
        assert_eq!(profile.columns()[CostColumn::ProfitRate.index()].unique, 1);
        assert!(profile.columns()[CostColumn::ProfitRate.index()]
            .normality
            .is_none());
        assert!(profile.columns()[CostColumn::MaterialCost.index()]
            .normality
            .is_some());
        assert_eq!(profile.label_counts().get("Residential"), Some(&2));
        let strong = profile.strong_correlations();
        assert!(strong
            .iter()
            .any(|(a, b, _)| a == "Material_Cost" && b == "Total_Estimate"));
    }

    #[test]
    fn test_normality() {
        let standard = Normal::new(1000.0, 100.0).unwrap();
        let bell: Vec<f64> = (0..200)
            .map(|i| standard.inverse_cdf((i as f64 + 0.5) / 200.0))
            .collect();
        let test = NormalityTest::run(&bell).unwrap();
        assert!(test.is_normal);
        assert!(test.p_value > 0.9);
        assert!((test.mean - 1000.0).abs() < 1e-6);

        let split: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 0.0 } else { 100.0 }).collect();
        let test = NormalityTest::run(&split).unwrap();
        assert!(!test.is_normal);
        assert!(test.ks_statistic > 0.3);

        assert!(NormalityTest::run(&[5.0]).is_none());
        assert!(NormalityTest::run(&[5.0, 5.0, 5.0]).is_none());
    }
}
