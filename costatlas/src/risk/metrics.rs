use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::math::statistics::{mean, quantile, SummaryStatistics};
use crate::models::montecarlo::SimulationResult;
use crate::utils::errors::{CostAtlasError, Result};

pub const LOW_VARIATION: f64 = 0.1;
pub const MEDIUM_VARIATION: f64 = 0.3;

/// # RiskLevel
/// Qualitative band of the coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_variation(coefficient_of_variation: f64) -> RiskLevel {
        if coefficient_of_variation < LOW_VARIATION {
            RiskLevel::Low
        } else if coefficient_of_variation < MEDIUM_VARIATION {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// # RiskMetrics
/// Tail measures of a total-cost sample. Overruns are losses, so the tail of
/// interest is the upper one.
///
/// ## Details
/// - `var_95 <= var_99`
/// - `cvar_95 >= var_95` and `cvar_99 >= var_99`
/// - `expected_shortfall` equals `cvar_95`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub baseline: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub probability_of_loss: f64,
    pub expected_shortfall: f64,
    pub coefficient_of_variation: f64,
    pub risk_level: RiskLevel,
}

/// # RiskCalculator
/// Computes [`RiskMetrics`] against a fixed baseline cost.
///
/// ## Example
/// ```
/// use costatlas::prelude::*;
/// let samples: Vec<f64> = (1..=100).map(|i| i as f64).collect();
/// let metrics = RiskCalculator::new(50.0).calculate(&samples).unwrap();
/// assert!(metrics.var_95 <= metrics.var_99);
/// assert!(metrics.cvar_95 >= metrics.var_95);
/// assert_eq!(metrics.probability_of_loss, 0.5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RiskCalculator {
    baseline: f64,
}

impl RiskCalculator {
    pub fn new(baseline: f64) -> RiskCalculator {
        RiskCalculator { baseline }
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn calculate(&self, samples: &[f64]) -> Result<RiskMetrics> {
        if samples.is_empty() {
            return Err(CostAtlasError::SimulationErr(
                "Risk metrics need at least one sample".to_string(),
            ));
        }
        if samples.iter().any(|v| !v.is_finite()) {
            return Err(CostAtlasError::SimulationErr(
                "Risk metrics need finite samples".to_string(),
            ));
        }
        let var_95 = value_at_risk(samples, 0.95)?;
        let var_99 = value_at_risk(samples, 0.99)?;
        let cvar_95 = tail_mean(samples, var_95);
        let cvar_99 = tail_mean(samples, var_99);
        let losses = samples.iter().filter(|v| **v > self.baseline).count();
        let statistics = SummaryStatistics::from_samples(samples)?;
        let coefficient_of_variation = statistics.coefficient_of_variation();

        Ok(RiskMetrics {
            baseline: self.baseline,
            var_95,
            var_99: var_99.max(var_95),
            cvar_95,
            cvar_99: cvar_99.max(var_99),
            probability_of_loss: losses as f64 / samples.len() as f64,
            expected_shortfall: cvar_95,
            coefficient_of_variation,
            risk_level: RiskLevel::from_variation(coefficient_of_variation),
        })
    }

    /// Metrics of the calculated total of a scenario.
    pub fn evaluate(&self, result: &SimulationResult) -> Result<RiskMetrics> {
        self.calculate(result.total())
    }
}

/// Upper `confidence` quantile of the sample.
pub fn value_at_risk(samples: &[f64], confidence: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(CostAtlasError::SimulationErr(format!(
            "Confidence level {} outside [0, 1]",
            confidence
        )));
    }
    quantile(samples, confidence).ok_or_else(|| {
        CostAtlasError::SimulationErr("Value at risk of an empty sample".to_string())
    })
}

// mean of the tail at or beyond the threshold, the threshold itself if empty
fn tail_mean(samples: &[f64], threshold: f64) -> f64 {
    let tail: Vec<f64> = samples.iter().copied().filter(|v| *v >= threshold).collect();
    mean(&tail).map_or(threshold, |m| m.max(threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_variation(0.05), RiskLevel::Low);
        assert_eq!(RiskLevel::from_variation(0.1), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_variation(0.29), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_variation(0.3), RiskLevel::High);
    }

    #[test]
    fn test_constant_sample() {
        let metrics = RiskCalculator::new(10.0).calculate(&[10.0; 50]).unwrap();
        assert_eq!(metrics.var_95, 10.0);
        assert_eq!(metrics.cvar_99, 10.0);
        assert_eq!(metrics.probability_of_loss, 0.0);
        assert_eq!(metrics.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_empty_sample() {
        assert!(matches!(
            RiskCalculator::new(0.0).calculate(&[]),
            Err(CostAtlasError::SimulationErr(_))
        ));
    }

    #[test]
    fn test_tail_ordering() {
        let samples: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.37).sin() * 40.0 + 200.0).collect();
        let metrics = RiskCalculator::new(200.0).calculate(&samples).unwrap();
        assert!(metrics.var_95 <= metrics.var_99);
        assert!(metrics.cvar_95 >= metrics.var_95);
        assert!(metrics.cvar_99 >= metrics.var_99);
        assert_eq!(metrics.expected_shortfall, metrics.cvar_95);
        assert!(metrics.probability_of_loss > 0.0 && metrics.probability_of_loss < 1.0);
    }
}
