use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::data::columns::CostColumn;
use crate::utils::errors::{CostAtlasError, Result};

/// # Scenario
/// A named set of multiplicative adjustments applied to sampled columns.
/// Columns without an adjustment keep a factor of `1.0`.
///
/// ## Example
/// ```
/// use costatlas::prelude::*;
/// let scenario = Scenario::new("material_increase_10pct")
///     .with_adjustment(CostColumn::MaterialCost, 1.1);
/// assert_eq!(scenario.factor(CostColumn::MaterialCost), 1.1);
/// assert_eq!(scenario.factor(CostColumn::LaborCost), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    name: String,
    #[serde(default)]
    adjustments: BTreeMap<CostColumn, f64>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Scenario {
        Scenario {
            name: name.into(),
            adjustments: BTreeMap::new(),
        }
    }

    pub fn with_adjustment(mut self, column: CostColumn, factor: f64) -> Self {
        self.adjustments.insert(column, factor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adjustments(&self) -> &BTreeMap<CostColumn, f64> {
        &self.adjustments
    }

    pub fn factor(&self, column: CostColumn) -> f64 {
        self.adjustments.get(&column).copied().unwrap_or(1.0)
    }

    /// Human readable title, e.g. `material_increase_10pct` -> `Material Increase 10pct`.
    pub fn title(&self) -> String {
        self.name
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CostAtlasError::SimulationErr(
                "Scenario name must not be empty".to_string(),
            ));
        }
        for (column, factor) in &self.adjustments {
            if !factor.is_finite() || *factor <= 0.0 {
                return Err(CostAtlasError::SimulationErr(format!(
                    "Scenario {} has invalid factor {} for {}",
                    self.name, factor, column
                )));
            }
        }
        Ok(())
    }

    /// The scenario set used when no configuration overrides it.
    pub fn default_set() -> Vec<Scenario> {
        vec![
            Scenario::new("baseline"),
            Scenario::new("material_increase_10pct").with_adjustment(CostColumn::MaterialCost, 1.1),
            Scenario::new("material_increase_20pct").with_adjustment(CostColumn::MaterialCost, 1.2),
            Scenario::new("labor_increase_15pct").with_adjustment(CostColumn::LaborCost, 1.15),
            Scenario::new("labor_increase_25pct").with_adjustment(CostColumn::LaborCost, 1.25),
            Scenario::new("combined_moderate")
                .with_adjustment(CostColumn::MaterialCost, 1.1)
                .with_adjustment(CostColumn::LaborCost, 1.15),
            Scenario::new("combined_aggressive")
                .with_adjustment(CostColumn::MaterialCost, 1.2)
                .with_adjustment(CostColumn::LaborCost, 1.25),
            Scenario::new("cost_reduction")
                .with_adjustment(CostColumn::MaterialCost, 0.9)
                .with_adjustment(CostColumn::LaborCost, 0.95),
        ]
    }
}

/// Validates every scenario and rejects empty lists and duplicate names.
pub fn validate_scenarios(scenarios: &[Scenario]) -> Result<()> {
    if scenarios.is_empty() {
        return Err(CostAtlasError::SimulationErr(
            "At least one scenario is required".to_string(),
        ));
    }
    let mut names = HashSet::new();
    for scenario in scenarios {
        scenario.validate()?;
        if !names.insert(scenario.name()) {
            return Err(CostAtlasError::SimulationErr(format!(
                "Duplicate scenario name {}",
                scenario.name()
            )));
        }
    }
    Ok(())
}
