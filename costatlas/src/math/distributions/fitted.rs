use rand::distributions::Uniform as UniformSampler;
use rand::Rng;
use rand_distr::{Distribution, Gamma as GammaSampler, LogNormal as LogNormalSampler, Normal as NormalSampler};
use serde::{Deserialize, Serialize};
use statrs::distribution::{self as sd, ContinuousCDF};

use super::family::DistributionFamily;
use crate::data::columns::CostColumn;
use crate::utils::errors::{CostAtlasError, Result};

/// # ParametricDistribution
/// A fitted member of one of the candidate families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ParametricDistribution {
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Gamma { shape: f64, scale: f64 },
    Uniform { min: f64, max: f64 },
}

impl ParametricDistribution {
    pub fn family(&self) -> DistributionFamily {
        match self {
            ParametricDistribution::Normal { .. } => DistributionFamily::Normal,
            ParametricDistribution::LogNormal { .. } => DistributionFamily::LogNormal,
            ParametricDistribution::Gamma { .. } => DistributionFamily::Gamma,
            ParametricDistribution::Uniform { .. } => DistributionFamily::Uniform,
        }
    }

    pub fn parameters(&self) -> (f64, f64) {
        match *self {
            ParametricDistribution::Normal { mean, std_dev } => (mean, std_dev),
            ParametricDistribution::LogNormal { mu, sigma } => (mu, sigma),
            ParametricDistribution::Gamma { shape, scale } => (shape, scale),
            ParametricDistribution::Uniform { min, max } => (min, max),
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            ParametricDistribution::Normal { mean, .. } => mean,
            ParametricDistribution::LogNormal { mu, sigma } => (mu + 0.5 * sigma * sigma).exp(),
            ParametricDistribution::Gamma { shape, scale } => shape * scale,
            ParametricDistribution::Uniform { min, max } => 0.5 * (min + max),
        }
    }

    /// Cumulative distribution function backed by statrs.
    pub fn cdf_fn(&self) -> Result<Box<dyn Fn(f64) -> f64>> {
        let invalid = |e: &dyn std::fmt::Display| {
            CostAtlasError::FitErr(format!("Invalid {} parameters: {}", self.family(), e))
        };
        Ok(match *self {
            ParametricDistribution::Normal { mean, std_dev } => {
                let d = sd::Normal::new(mean, std_dev).map_err(|e| invalid(&e))?;
                Box::new(move |x| d.cdf(x))
            }
            ParametricDistribution::LogNormal { mu, sigma } => {
                let d = sd::LogNormal::new(mu, sigma).map_err(|e| invalid(&e))?;
                Box::new(move |x| d.cdf(x))
            }
            ParametricDistribution::Gamma { shape, scale } => {
                let d = sd::Gamma::new(shape, 1.0 / scale).map_err(|e| invalid(&e))?;
                Box::new(move |x| d.cdf(x))
            }
            ParametricDistribution::Uniform { min, max } => {
                let d = sd::Uniform::new(min, max).map_err(|e| invalid(&e))?;
                Box::new(move |x| d.cdf(x))
            }
        })
    }
}

/// # DistributionModel
/// How a column is resampled: from a fitted family, or directly from the
/// observed values when no family could be fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionModel {
    Parametric(ParametricDistribution),
    Empirical { observations: Vec<f64> },
}

/// # FittedDistribution
/// The retained model of one column, its KS score and the observed moments.
///
/// ## Details
/// - `ks_statistic` is `None` for empirical models.
/// - `fallback_reason` records why an empirical model replaced a parametric one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedDistribution {
    column: CostColumn,
    model: DistributionModel,
    ks_statistic: Option<f64>,
    observed_mean: f64,
    observed_std: f64,
    data_range: (f64, f64),
    observations: usize,
    fallback_reason: Option<String>,
}

impl FittedDistribution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        column: CostColumn,
        model: DistributionModel,
        ks_statistic: Option<f64>,
        observed_mean: f64,
        observed_std: f64,
        data_range: (f64, f64),
        observations: usize,
        fallback_reason: Option<String>,
    ) -> FittedDistribution {
        FittedDistribution {
            column,
            model,
            ks_statistic,
            observed_mean,
            observed_std,
            data_range,
            observations,
            fallback_reason,
        }
    }

    pub fn column(&self) -> CostColumn {
        self.column
    }

    pub fn model(&self) -> &DistributionModel {
        &self.model
    }

    pub fn family(&self) -> Option<DistributionFamily> {
        match &self.model {
            DistributionModel::Parametric(p) => Some(p.family()),
            DistributionModel::Empirical { .. } => None,
        }
    }

    pub fn family_name(&self) -> &'static str {
        self.family().map(|f| f.short_name()).unwrap_or("empirical")
    }

    pub fn ks_statistic(&self) -> Option<f64> {
        self.ks_statistic
    }

    pub fn observed_mean(&self) -> f64 {
        self.observed_mean
    }

    pub fn observed_std(&self) -> f64 {
        self.observed_std
    }

    pub fn data_range(&self) -> (f64, f64) {
        self.data_range
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn is_empirical(&self) -> bool {
        matches!(self.model, DistributionModel::Empirical { .. })
    }

    pub fn sampler(&self) -> Result<ColumnSampler> {
        ColumnSampler::new(&self.model)
    }
}

/// # ColumnSampler
/// Ready-to-draw sampler built once per column and reused across draws.
#[derive(Debug, Clone)]
pub enum ColumnSampler {
    Normal(NormalSampler<f64>),
    LogNormal(LogNormalSampler<f64>),
    Gamma(GammaSampler<f64>),
    Uniform(UniformSampler<f64>),
    Constant(f64),
    Empirical {
        observations: Vec<f64>,
        index: UniformSampler<usize>,
    },
}

impl ColumnSampler {
    pub fn new(model: &DistributionModel) -> Result<ColumnSampler> {
        let invalid = |e: &dyn std::fmt::Display| {
            CostAtlasError::SimulationErr(format!("Cannot build sampler: {}", e))
        };
        Ok(match model {
            DistributionModel::Parametric(p) => match *p {
                ParametricDistribution::Normal { mean, std_dev } => {
                    ColumnSampler::Normal(NormalSampler::new(mean, std_dev).map_err(|e| invalid(&e))?)
                }
                ParametricDistribution::LogNormal { mu, sigma } => ColumnSampler::LogNormal(
                    LogNormalSampler::new(mu, sigma).map_err(|e| invalid(&e))?,
                ),
                ParametricDistribution::Gamma { shape, scale } => {
                    ColumnSampler::Gamma(GammaSampler::new(shape, scale).map_err(|e| invalid(&e))?)
                }
                ParametricDistribution::Uniform { min, max } => {
                    if !(min < max) {
                        return Err(CostAtlasError::SimulationErr(format!(
                            "Uniform sampler needs min < max, got [{}, {}]",
                            min, max
                        )));
                    }
                    ColumnSampler::Uniform(UniformSampler::new(min, max))
                }
            },
            DistributionModel::Empirical { observations } => match observations.len() {
                0 => {
                    return Err(CostAtlasError::SimulationErr(
                        "Empirical sampler has no observations".to_string(),
                    ))
                }
                1 => ColumnSampler::Constant(observations[0]),
                n => ColumnSampler::Empirical {
                    observations: observations.clone(),
                    index: UniformSampler::new(0, n),
                },
            },
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            ColumnSampler::Normal(d) => d.sample(rng),
            ColumnSampler::LogNormal(d) => d.sample(rng),
            ColumnSampler::Gamma(d) => d.sample(rng),
            ColumnSampler::Uniform(d) => d.sample(rng),
            ColumnSampler::Constant(v) => *v,
            ColumnSampler::Empirical {
                observations,
                index,
            } => observations[index.sample(rng)],
        }
    }
}
