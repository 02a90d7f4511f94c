use serde::{Deserialize, Serialize};

use super::columns::CostColumn;

/// # CostRecord
/// One cleaned row of a cost-estimate dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    values: [f64; 5],
    label: Option<String>,
}

impl CostRecord {
    pub fn new(values: [f64; 5], label: Option<String>) -> CostRecord {
        CostRecord { values, label }
    }

    pub fn value(&self, column: CostColumn) -> f64 {
        self.values[column.index()]
    }

    pub fn values(&self) -> &[f64; 5] {
        &self.values
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Bitwise identity of the row, used for duplicate detection.
    pub fn duplicate_key(&self) -> ([u64; 5], Option<&str>) {
        (self.values.map(f64::to_bits), self.label())
    }
}

/// # Dataset
/// Cleaned cost-estimate rows. Every required cell is a finite number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<CostRecord>,
    label_column: Option<String>,
}

impl Dataset {
    pub fn new(records: Vec<CostRecord>) -> Dataset {
        Dataset {
            records,
            label_column: None,
        }
    }

    pub fn with_label_column(mut self, label_column: Option<String>) -> Self {
        self.label_column = label_column;
        self
    }

    pub fn records(&self) -> &Vec<CostRecord> {
        &self.records
    }

    pub fn label_column(&self) -> Option<&str> {
        self.label_column.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, column: CostColumn) -> Vec<f64> {
        self.records.iter().map(|r| r.value(column)).collect()
    }

    pub fn labels(&self) -> Vec<Option<&str>> {
        self.records.iter().map(|r| r.label()).collect()
    }

    /// Mean of a column, `None` for an empty dataset.
    pub fn column_mean(&self, column: CostColumn) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let sum: f64 = self.records.iter().map(|r| r.value(column)).sum();
        Some(sum / self.records.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_access() {
        let dataset = Dataset::new(vec![
            CostRecord::new([100.0, 50.0, 10.0, 0.0, 165.0], None),
            CostRecord::new([120.0, 60.0, 10.0, -5.0, 193.0], Some("Residential".into())),
        ]);
        assert_eq!(dataset.column(CostColumn::LaborCost), vec![50.0, 60.0]);
        assert_eq!(dataset.column_mean(CostColumn::MaterialCost), Some(110.0));
        assert_eq!(dataset.labels(), vec![None, Some("Residential")]);
    }

    #[test]
    fn test_duplicate_key() {
        let a = CostRecord::new([1.0, 2.0, 3.0, 4.0, 5.0], None);
        let b = CostRecord::new([1.0, 2.0, 3.0, 4.0, 5.0], None);
        let c = CostRecord::new([1.0, 2.0, 3.0, 4.0, 5.0], Some("x".into()));
        let d = CostRecord::new([1.0, 2.0, 3.0, 4.0, -5.0], None);
        assert_eq!(a.duplicate_key(), b.duplicate_key());
        assert_ne!(a.duplicate_key(), c.duplicate_key());
        assert_ne!(a.duplicate_key(), d.duplicate_key());
    }
}
