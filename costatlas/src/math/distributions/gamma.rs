use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::brent::BrentRoot;
use statrs::function::gamma::digamma;

use crate::utils::errors::{CostAtlasError, Result};

const MAX_BRACKET_STEPS: usize = 200;

/// ln(k) - digamma(k) - s, decreasing in k. Its root is the gamma shape MLE.
struct ShapeEquation {
    log_ratio: f64,
}

impl ShapeEquation {
    fn eval(&self, shape: f64) -> f64 {
        shape.ln() - digamma(shape) - self.log_ratio
    }
}

impl CostFunction for ShapeEquation {
    type Param = f64;
    type Output = f64;

    fn cost(&self, shape: &Self::Param) -> std::result::Result<Self::Output, Error> {
        Ok(self.eval(*shape))
    }
}

/// Maximum-likelihood gamma fit with location fixed at zero.
/// Returns `(shape, scale)`. Every value must be strictly positive.
pub fn fit_gamma_mle(values: &[f64]) -> Result<(f64, f64)> {
    if values.len() < 2 {
        return Err(CostAtlasError::FitErr(
            "Gamma fit needs at least two observations".to_string(),
        ));
    }
    if values.iter().any(|v| *v <= 0.0) {
        return Err(CostAtlasError::FitErr(
            "Gamma fit requires strictly positive data".to_string(),
        ));
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let mean_ln = values.iter().map(|v| v.ln()).sum::<f64>() / n;
    let log_ratio = mean.ln() - mean_ln;
    if !log_ratio.is_finite() || log_ratio <= 1e-12 {
        return Err(CostAtlasError::FitErr(
            "Gamma fit is degenerate for constant data".to_string(),
        ));
    }

    // Minka's closed-form approximation seeds the bracket.
    let start = (3.0 - log_ratio + ((log_ratio - 3.0).powi(2) + 24.0 * log_ratio).sqrt())
        / (12.0 * log_ratio);
    let equation = ShapeEquation { log_ratio };

    let mut lower = start / 2.0;
    let mut steps = 0;
    while equation.eval(lower) <= 0.0 {
        lower /= 2.0;
        steps += 1;
        if steps > MAX_BRACKET_STEPS {
            return Err(CostAtlasError::FitErr(
                "Could not bracket gamma shape from below".to_string(),
            ));
        }
    }
    let mut upper = start * 2.0;
    steps = 0;
    while equation.eval(upper) >= 0.0 {
        upper *= 2.0;
        steps += 1;
        if steps > MAX_BRACKET_STEPS {
            return Err(CostAtlasError::FitErr(
                "Could not bracket gamma shape from above".to_string(),
            ));
        }
    }

    let solver = BrentRoot::new(lower, upper, 1e-12);
    let result = Executor::new(equation, solver)
        .configure(|state| state.max_iters(200))
        .run()
        .map_err(|e| CostAtlasError::FitErr(format!("Gamma shape solver failed: {}", e)))?;

    let state = result.state();
    let shape = state
        .get_best_param()
        .or_else(|| state.get_param())
        .copied()
        .ok_or_else(|| CostAtlasError::FitErr("Gamma shape solver gave no result".to_string()))?;
    if !shape.is_finite() || shape <= 0.0 {
        return Err(CostAtlasError::FitErr(format!(
            "Gamma shape solver returned invalid shape {}",
            shape
        )));
    }
    Ok((shape, mean / shape))
}
