use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::columns::CostColumn;
use super::dataset::{CostRecord, Dataset};
use crate::math::statistics::median;
use crate::utils::errors::{CostAtlasError, Result};

const MISSING_MARKERS: [&str; 6] = ["", "na", "n/a", "null", "nan", "none"];

/// # MissingValuePolicy
/// What to do with a row whose required cell is missing or not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    #[default]
    Drop,
    ImputeMedian,
}

/// # CleaningReport
/// Bookkeeping of what the loader removed or repaired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub rows_dropped_invalid: usize,
    pub cells_imputed: usize,
    pub duplicates_removed: usize,
    pub negative_values: BTreeMap<CostColumn, usize>,
    pub rows_kept: usize,
}

/// # DatasetLoader
/// Reads a delimited cost-estimate table, validates its header and coerces
/// every required cell into a finite number.
///
/// ## Example
/// ```
/// use costatlas::prelude::*;
/// let csv = "Material_Cost,Labor_Cost,Profit_Rate,Discount_or_Markup,Total_Estimate\n\
///            100,50,10,0,165\n";
/// let (dataset, report) = DatasetLoader::default().load_from_reader(csv.as_bytes()).unwrap();
/// assert_eq!(dataset.len(), 1);
/// assert_eq!(report.rows_kept, 1);
/// ```
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    path: Option<PathBuf>,
    delimiter: u8,
    missing_policy: MissingValuePolicy,
    label_column: Option<String>,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        DatasetLoader {
            path: None,
            delimiter: b',',
            missing_policy: MissingValuePolicy::Drop,
            label_column: None,
        }
    }
}

impl DatasetLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> DatasetLoader {
        DatasetLoader {
            path: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_missing_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    pub fn with_label_column(mut self, label_column: Option<String>) -> Self {
        self.label_column = label_column;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Result<(Dataset, CleaningReport)> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| CostAtlasError::DataErr("No input path configured".to_string()))?;
        if !path.exists() {
            return Err(CostAtlasError::DataErr(format!(
                "Input file not found: {}",
                path.display()
            )));
        }
        info!(path = %path.display(), "loading cost dataset");
        let file = File::open(path)?;
        self.load_from_reader(file)
    }

    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<(Dataset, CleaningReport)> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut positions = [0usize; 5];
        let mut missing_headers = Vec::new();
        for column in CostColumn::ALL {
            match headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column.header()))
            {
                Some(pos) => positions[column.index()] = pos,
                None => missing_headers.push(column.header()),
            }
        }
        if !missing_headers.is_empty() {
            return Err(CostAtlasError::DataErr(format!(
                "Missing required columns: {}",
                missing_headers.join(", ")
            )));
        }
        let label_position = self.label_column.as_ref().and_then(|name| {
            let found = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()));
            if found.is_none() {
                warn!(label = %name, "label column not present, labels ignored");
            }
            found
        });

        let mut report = CleaningReport::default();
        let mut raw_rows: Vec<([Option<f64>; 5], Option<String>)> = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            report.rows_read += 1;
            let mut cells = [None; 5];
            for column in CostColumn::ALL {
                cells[column.index()] = row
                    .get(positions[column.index()])
                    .and_then(parse_numeric_cell);
            }
            let label = label_position
                .and_then(|p| row.get(p))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            raw_rows.push((cells, label));
        }

        if raw_rows.is_empty() {
            return Err(CostAtlasError::DataErr(
                "Dataset has no data rows".to_string(),
            ));
        }

        let records = match self.missing_policy {
            MissingValuePolicy::Drop => {
                let mut records = Vec::with_capacity(raw_rows.len());
                for (cells, label) in raw_rows {
                    match complete_row(&cells) {
                        Some(values) => records.push(CostRecord::new(values, label)),
                        None => report.rows_dropped_invalid += 1,
                    }
                }
                records
            }
            MissingValuePolicy::ImputeMedian => {
                let mut medians = [0.0; 5];
                for column in CostColumn::ALL {
                    let valid: Vec<f64> = raw_rows
                        .iter()
                        .filter_map(|(cells, _)| cells[column.index()])
                        .collect();
                    medians[column.index()] = median(&valid).ok_or_else(|| {
                        CostAtlasError::DataErr(format!(
                            "Column {} has no valid values to impute from",
                            column
                        ))
                    })?;
                }
                raw_rows
                    .into_iter()
                    .map(|(cells, label)| {
                        let mut values = [0.0; 5];
                        for (i, cell) in cells.iter().enumerate() {
                            values[i] = match cell {
                                Some(v) => *v,
                                None => {
                                    report.cells_imputed += 1;
                                    medians[i]
                                }
                            };
                        }
                        CostRecord::new(values, label)
                    })
                    .collect()
            }
        };

        let records = remove_duplicates(records, &mut report);
        if records.is_empty() {
            return Err(CostAtlasError::DataErr(
                "No valid rows left after cleaning".to_string(),
            ));
        }

        for column in CostColumn::ALL.iter().filter(|c| c.is_monetary_cost()) {
            let negatives = records.iter().filter(|r| r.value(*column) < 0.0).count();
            if negatives > 0 {
                warn!(column = %column, negatives, "negative values in cost column");
                report.negative_values.insert(*column, negatives);
            }
        }

        report.rows_kept = records.len();
        debug!(?report, "cleaning finished");
        info!(
            rows = report.rows_kept,
            dropped = report.rows_dropped_invalid,
            duplicates = report.duplicates_removed,
            "dataset ready"
        );

        let dataset = Dataset::new(records).with_label_column(match label_position {
            Some(_) => self.label_column.clone(),
            None => None,
        });
        Ok((dataset, report))
    }
}

/// Parses a numeric cell, tolerating currency symbols, thousands separators
/// and a trailing percent sign. Returns `None` for missing or non-finite cells.
pub fn parse_numeric_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if MISSING_MARKERS
        .iter()
        .any(|m| trimmed.eq_ignore_ascii_case(m))
    {
        return None;
    }
    let cleaned: String = trimmed
        .trim_start_matches("Rp")
        .trim_end_matches('%')
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | ',' | ' ' | '_'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn complete_row(cells: &[Option<f64>; 5]) -> Option<[f64; 5]> {
    let mut values = [0.0; 5];
    for (i, cell) in cells.iter().enumerate() {
        values[i] = (*cell)?;
    }
    Some(values)
}

fn remove_duplicates(records: Vec<CostRecord>, report: &mut CleaningReport) -> Vec<CostRecord> {
    let mut seen: HashSet<([u64; 5], Option<String>)> = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        let (bits, label) = record.duplicate_key();
        if seen.insert((bits, label.map(str::to_string))) {
            unique.push(record);
        } else {
            report.duplicates_removed += 1;
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Project_Type,Material_Cost,Labor_Cost,Profit_Rate,Discount_or_Markup,Total_Estimate\n";

    #[test]
    fn test_parse_numeric_cell() {
        assert_eq!(parse_numeric_cell("$1,200.50"), Some(1200.5));
        assert_eq!(parse_numeric_cell(" 12.5% "), Some(12.5));
        assert_eq!(parse_numeric_cell("Rp 1,000"), Some(1000.0));
        assert_eq!(parse_numeric_cell("-350"), Some(-350.0));
        assert_eq!(parse_numeric_cell("N/A"), None);
        assert_eq!(parse_numeric_cell(""), None);
        assert_eq!(parse_numeric_cell("abc"), None);
        assert_eq!(parse_numeric_cell("inf"), None);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "Material_Cost,Labor_Cost,Profit_Rate\n1,2,3\n";
        let err = DatasetLoader::default()
            .load_from_reader(csv.as_bytes())
            .unwrap_err();
        match err {
            CostAtlasError::DataErr(msg) => {
                assert!(msg.contains("Discount_or_Markup"));
                assert!(msg.contains("Total_Estimate"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_drop_invalid_and_duplicates() {
        let csv = format!(
            "{}{}{}{}{}",
            HEADER,
            "Residential,100,50,10,0,165\n",
            "Residential,100,50,10,0,165\n",
            "Commercial,abc,60,12,5,200\n",
            "Commercial,120,,12,5,200\n",
        );
        let (dataset, report) = DatasetLoader::default()
            .with_label_column(Some("Project_Type".into()))
            .load_from_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rows_dropped_invalid, 2);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records()[0].label(), Some("Residential"));
        for record in dataset.records() {
            assert!(record.values().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_impute_median_keeps_rows() {
        let csv = format!(
            "{}{}{}{}",
            HEADER,
            "A,100,50,10,0,165\n",
            "B,200,NA,10,0,300\n",
            "C,300,70,10,0,420\n",
        );
        let (dataset, report) = DatasetLoader::default()
            .with_missing_policy(MissingValuePolicy::ImputeMedian)
            .load_from_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(report.cells_imputed, 1);
        assert_eq!(dataset.column(CostColumn::LaborCost), vec![50.0, 60.0, 70.0]);
    }

    #[test]
    fn test_no_valid_rows() {
        let csv = format!("{}{}", HEADER, "A,x,y,z,w,v\n");
        let err = DatasetLoader::default()
            .load_from_reader(csv.as_bytes())
            .unwrap_err();
        assert!(matches!(err, CostAtlasError::DataErr(_)));
    }

    #[test]
    fn test_negative_values_reported() {
        let csv = format!("{}{}{}", HEADER, "A,-10,50,10,0,45\n", "B,100,50,10,0,165\n");
        let (_, report) = DatasetLoader::default()
            .load_from_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(report.negative_values.get(&CostColumn::MaterialCost), Some(&1));
    }

    #[test]
    fn test_missing_file() {
        let err = DatasetLoader::new("/definitely/not/here.csv").load().unwrap_err();
        assert!(matches!(err, CostAtlasError::DataErr(_)));
    }
}
