use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::errors::{CostAtlasError, Result};

/// # DistributionFamily
/// Parametric families the fitter can score against a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFamily {
    Normal,
    LogNormal,
    Gamma,
    Uniform,
}

impl DistributionFamily {
    pub const DEFAULT_CANDIDATES: [DistributionFamily; 4] = [
        DistributionFamily::Normal,
        DistributionFamily::LogNormal,
        DistributionFamily::Gamma,
        DistributionFamily::Uniform,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            DistributionFamily::Normal => "norm",
            DistributionFamily::LogNormal => "lognorm",
            DistributionFamily::Gamma => "gamma",
            DistributionFamily::Uniform => "uniform",
        }
    }

    /// Families defined only on strictly positive data.
    pub fn requires_positive(&self) -> bool {
        matches!(self, DistributionFamily::LogNormal | DistributionFamily::Gamma)
    }
}

impl Display for DistributionFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for DistributionFamily {
    type Err = CostAtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "norm" | "normal" | "gaussian" => Ok(DistributionFamily::Normal),
            "lognorm" | "lognormal" | "log_normal" | "log-normal" => {
                Ok(DistributionFamily::LogNormal)
            }
            "gamma" => Ok(DistributionFamily::Gamma),
            "uniform" => Ok(DistributionFamily::Uniform),
            other => Err(CostAtlasError::NotFoundErr(format!(
                "Unknown distribution family {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "lognorm".parse::<DistributionFamily>().unwrap(),
            DistributionFamily::LogNormal
        );
        assert_eq!(
            "Normal".parse::<DistributionFamily>().unwrap(),
            DistributionFamily::Normal
        );
        assert!("beta".parse::<DistributionFamily>().is_err());
    }
}
