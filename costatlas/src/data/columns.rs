use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::errors::{CostAtlasError, Result};

/// # CostColumn
/// The numeric columns every cost-estimate dataset must carry.
///
/// ## Details
/// - `Profit_Rate` is expressed in percent (`12.5` means 12.5%).
/// - `Discount_or_Markup` is an absolute amount added to the marked-up cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostColumn {
    #[serde(rename = "Material_Cost")]
    MaterialCost,
    #[serde(rename = "Labor_Cost")]
    LaborCost,
    #[serde(rename = "Profit_Rate")]
    ProfitRate,
    #[serde(rename = "Discount_or_Markup")]
    DiscountOrMarkup,
    #[serde(rename = "Total_Estimate")]
    TotalEstimate,
}

impl CostColumn {
    /// Fixed column order. Sampling and reporting iterate in this order.
    pub const ALL: [CostColumn; 5] = [
        CostColumn::MaterialCost,
        CostColumn::LaborCost,
        CostColumn::ProfitRate,
        CostColumn::DiscountOrMarkup,
        CostColumn::TotalEstimate,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            CostColumn::MaterialCost => "Material_Cost",
            CostColumn::LaborCost => "Labor_Cost",
            CostColumn::ProfitRate => "Profit_Rate",
            CostColumn::DiscountOrMarkup => "Discount_or_Markup",
            CostColumn::TotalEstimate => "Total_Estimate",
        }
    }

    /// Columns holding monetary amounts, where negative values are suspicious.
    pub fn is_monetary_cost(&self) -> bool {
        matches!(
            self,
            CostColumn::MaterialCost | CostColumn::LaborCost | CostColumn::TotalEstimate
        )
    }

    pub fn index(&self) -> usize {
        match self {
            CostColumn::MaterialCost => 0,
            CostColumn::LaborCost => 1,
            CostColumn::ProfitRate => 2,
            CostColumn::DiscountOrMarkup => 3,
            CostColumn::TotalEstimate => 4,
        }
    }
}

impl Display for CostColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl FromStr for CostColumn {
    type Err = CostAtlasError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        CostColumn::ALL
            .iter()
            .find(|c| c.header().eq_ignore_ascii_case(needle))
            .copied()
            .ok_or_else(|| CostAtlasError::NotFoundErr(format!("Unknown cost column {}", s)))
    }
}

/// # Variable
/// A simulated quantity: either one of the sampled columns or the total cost
/// recombined from the sampled components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    Column(CostColumn),
    TotalCalculated,
}

impl Variable {
    pub const ALL: [Variable; 6] = [
        Variable::Column(CostColumn::MaterialCost),
        Variable::Column(CostColumn::LaborCost),
        Variable::Column(CostColumn::ProfitRate),
        Variable::Column(CostColumn::DiscountOrMarkup),
        Variable::Column(CostColumn::TotalEstimate),
        Variable::TotalCalculated,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Variable::Column(column) => column.header(),
            Variable::TotalCalculated => "Total_Estimate_Calculated",
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        assert_eq!(
            "material_cost".parse::<CostColumn>().unwrap(),
            CostColumn::MaterialCost
        );
        assert_eq!(
            " Discount_or_Markup ".parse::<CostColumn>().unwrap(),
            CostColumn::DiscountOrMarkup
        );
        assert!("Overhead".parse::<CostColumn>().is_err());
    }

    #[test]
    fn test_index_matches_order() {
        for (i, column) in CostColumn::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
        }
    }
}
