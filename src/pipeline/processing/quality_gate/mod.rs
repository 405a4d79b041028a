use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::constants::{MAX_VALID_SCORE, MAX_VALID_YEAR, MIN_VALID_SCORE, MIN_VALID_YEAR};
use crate::domain::{Column, Record};
use crate::pipeline::batch::Dataset;

/// Data-quality counters for a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_records: usize,
    /// Missing cells per dataset column
    pub missing_values: BTreeMap<String, usize>,
    /// Rows with a numeric `min_score` outside the valid range
    pub invalid_scores: usize,
    /// Rows with a `year` outside the valid range
    pub invalid_years: usize,
    /// Rows repeating the composite key of an earlier row
    pub duplicates: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_scores == 0
            && self.invalid_years == 0
            && self.duplicates == 0
            && self.missing_values.values().all(|count| *count == 0)
    }
}

pub fn is_valid_score(score: f64) -> bool {
    (MIN_VALID_SCORE..=MAX_VALID_SCORE).contains(&score)
}

pub fn is_valid_year(year: i32) -> bool {
    (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year)
}

/// Compute quality counters without touching the dataset.
///
/// Sentinel and missing cells are never range-checked; only present
/// numeric values are.
pub fn validate(dataset: &Dataset) -> ValidationReport {
    info!("Validating dataset of {} records", dataset.len());

    let missing_values = dataset
        .columns()
        .iter()
        .map(|column| {
            let count = dataset.rows.iter().filter(|row| row.cell(*column).is_missing()).count();
            (column.name().to_string(), count)
        })
        .collect();

    let invalid_scores = dataset
        .rows
        .iter()
        .filter(|row| matches!(row.cell(Column::MinScore).as_number(), Some(score) if !is_valid_score(score)))
        .count();

    let invalid_years = dataset
        .rows
        .iter()
        .filter(|row| matches!(row.year.present(), Some(year) if !is_valid_year(*year)))
        .count();

    let mut seen = HashSet::with_capacity(dataset.len());
    let duplicates = dataset.rows.iter().filter(|row| !seen.insert(row.key())).count();

    let report = ValidationReport {
        total_records: dataset.len(),
        missing_values,
        invalid_scores,
        invalid_years,
        duplicates,
    };

    if report.duplicates > 0 {
        warn!("Dataset has {} duplicate composite keys", report.duplicates);
    }
    if report.invalid_scores > 0 || report.invalid_years > 0 {
        warn!(
            "Dataset has {} out-of-range scores and {} out-of-range years",
            report.invalid_scores, report.invalid_years
        );
    }
    info!("Validation finished: {:?}", report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataSource, Field, MergedRecord, ScoreRecord};

    fn merged(school: &str, year: i32, score: Field<f64>) -> MergedRecord {
        MergedRecord::from_source(
            ScoreRecord {
                school: Field::Present(school.to_string()),
                major: Field::Present("计算机".to_string()),
                province: Field::Present("北京".to_string()),
                year: Field::Present(year),
                min_score: score,
                ..Default::default()
            },
            DataSource::Portal,
        )
    }

    fn dataset(rows: Vec<MergedRecord>) -> Dataset {
        Dataset::new(
            [
                Column::School,
                Column::Major,
                Column::Province,
                Column::Year,
                Column::MinScore,
                Column::DataSource,
                Column::MinScoreSource,
            ],
            rows,
        )
    }

    #[test]
    fn test_empty_dataset_reports_zeros() {
        let report = validate(&Dataset::default());
        assert_eq!(report.total_records, 0);
        assert!(report.missing_values.is_empty());
        assert_eq!(report.invalid_scores, 0);
        assert_eq!(report.invalid_years, 0);
        assert_eq!(report.duplicates, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_score_boundaries() {
        let data = dataset(vec![
            merged("a", 2023, Field::Present(750.0)),
            merged("b", 2023, Field::Present(751.0)),
            merged("c", 2023, Field::Present(0.0)),
            merged("d", 2023, Field::Present(-1.0)),
            merged("e", 2023, Field::NotAvailable),
            merged("f", 2023, Field::Missing),
        ]);
        let report = validate(&data);
        assert_eq!(report.invalid_scores, 2);
        assert_eq!(report.missing_values["min_score"], 1);
        assert_eq!(report.missing_values["school"], 0);
    }

    #[test]
    fn test_year_range_is_flagged_not_removed() {
        let data = dataset(vec![
            merged("a", 2009, Field::Present(600.0)),
            merged("b", 2010, Field::Present(600.0)),
            merged("c", 2024, Field::Present(600.0)),
            merged("d", 2025, Field::Present(600.0)),
        ]);
        let report = validate(&data);
        assert_eq!(report.invalid_years, 2);
        assert_eq!(report.total_records, 4);
    }

    #[test]
    fn test_duplicates_in_unmerged_dataset() {
        let data = dataset(vec![
            merged("a", 2023, Field::Present(600.0)),
            merged("a", 2023, Field::Present(601.0)),
            merged("a", 2023, Field::Present(602.0)),
            merged("b", 2023, Field::Present(600.0)),
        ]);
        assert_eq!(validate(&data).duplicates, 2);
    }

    #[test]
    fn test_validate_does_not_mutate() {
        let data = dataset(vec![
            merged("a", 2023, Field::Present(800.0)),
            merged("a", 2023, Field::Missing),
        ]);
        let before = data.clone();
        let _ = validate(&data);
        assert_eq!(data, before);
    }
}
