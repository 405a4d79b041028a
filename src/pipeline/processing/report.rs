use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

use crate::domain::{CellRef, Column, ColumnKind, Record};
use crate::pipeline::batch::Dataset;

/// Descriptive statistics over the numeric values of one column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sample standard deviation (n - 1)
    pub std: Option<f64>,
}

impl DescriptiveStats {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = sorted.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        let std = if count > 1 {
            let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(variance.sqrt())
        } else {
            None
        };

        Self {
            count,
            mean: Some(mean),
            median: Some(median),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            std,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_records: usize,
    pub total_columns: usize,
    /// Storage kind per column: text, integer or number
    pub column_types: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCounts {
    /// Rows identical to an earlier row in every column
    pub total_duplicates: usize,
    /// Rows repeating the composite key of an earlier row
    pub duplicate_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityScores {
    /// Percentage of non-missing cells
    pub completeness: f64,
    /// Percentage of rows that are not whole-row duplicates
    pub uniqueness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Derived statistics describing a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub summary: ReportSummary,
    pub missing_values: BTreeMap<String, usize>,
    pub duplicates: DuplicateCounts,
    pub data_quality: QualityScores,
    pub numeric_stats: BTreeMap<String, DescriptiveStats>,
    pub categorical_stats: BTreeMap<String, Vec<ValueCount>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

/// Headline numbers of a merged dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub total_schools: usize,
    pub total_majors: usize,
    pub total_provinces: usize,
    pub year_range: YearRange,
    pub score_statistics: DescriptiveStats,
}

fn kind_name(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text => "text",
        ColumnKind::Integer => "integer",
        ColumnKind::Number => "number",
    }
}

/// Numeric values of a column; sentinel and missing cells are skipped
fn numeric_values(dataset: &Dataset, column: Column) -> Vec<f64> {
    dataset
        .rows
        .iter()
        .filter_map(|row| row.cell(column).as_number())
        .collect()
}

fn distinct_text(dataset: &Dataset, column: Column) -> usize {
    dataset
        .rows
        .iter()
        .filter_map(|row| match row.cell(column) {
            CellRef::Text(text) => Some(text),
            _ => None,
        })
        .collect::<HashSet<_>>()
        .len()
}

fn value_counts(dataset: &Dataset, column: Column) -> Vec<ValueCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in &dataset.rows {
        let cell = row.cell(column);
        if !cell.is_missing() {
            *counts.entry(cell.to_text()).or_default() += 1;
        }
    }

    let mut counts: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    counts
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        100.0
    } else {
        (1.0 - part as f64 / whole as f64) * 100.0
    }
}

/// Build the quality report for a dataset; the dataset is only read
pub fn generate_quality_report(dataset: &Dataset) -> QualityReport {
    info!("Generating data quality report...");
    let columns = dataset.columns();
    let total_records = dataset.len();

    let missing_values: BTreeMap<String, usize> = columns
        .iter()
        .map(|column| {
            let count = dataset.rows.iter().filter(|row| row.cell(*column).is_missing()).count();
            (column.name().to_string(), count)
        })
        .collect();
    let missing_cells: usize = missing_values.values().sum();

    // Whole-row identity via the rendered cells
    let mut seen_rows = HashSet::with_capacity(total_records);
    let total_duplicates = dataset
        .rows
        .iter()
        .filter(|row| {
            let rendered: Vec<String> = columns.iter().map(|c| row.cell(*c).to_json().to_string()).collect();
            !seen_rows.insert(rendered)
        })
        .count();

    let mut seen_keys = HashSet::with_capacity(total_records);
    let duplicate_keys = dataset.rows.iter().filter(|row| !seen_keys.insert(row.key())).count();

    let numeric_stats = columns
        .iter()
        .filter(|column| column.is_numeric())
        .map(|column| {
            let values = numeric_values(dataset, *column);
            (column.name().to_string(), DescriptiveStats::from_values(&values))
        })
        .collect();

    let categorical_stats = columns
        .iter()
        .filter(|column| !column.is_numeric())
        .map(|column| (column.name().to_string(), value_counts(dataset, *column)))
        .collect();

    let report = QualityReport {
        summary: ReportSummary {
            total_records,
            total_columns: columns.len(),
            column_types: columns
                .iter()
                .map(|c| (c.name().to_string(), kind_name(c.kind()).to_string()))
                .collect(),
        },
        missing_values,
        duplicates: DuplicateCounts {
            total_duplicates,
            duplicate_keys,
        },
        data_quality: QualityScores {
            completeness: percentage(missing_cells, total_records * columns.len()),
            uniqueness: percentage(total_duplicates, total_records),
        },
        numeric_stats,
        categorical_stats,
    };

    info!(
        "Quality report ready: completeness {:.2}%, uniqueness {:.2}%",
        report.data_quality.completeness, report.data_quality.uniqueness
    );
    report
}

/// Distinct counts, year span and score statistics of a dataset
pub fn create_summary_statistics(dataset: &Dataset) -> SummaryStatistics {
    info!("Creating summary statistics...");
    let years: Vec<i32> = dataset.rows.iter().filter_map(|row| row.year.present().copied()).collect();

    SummaryStatistics {
        total_schools: distinct_text(dataset, Column::School),
        total_majors: distinct_text(dataset, Column::Major),
        total_provinces: distinct_text(dataset, Column::Province),
        year_range: YearRange {
            min: years.iter().min().copied(),
            max: years.iter().max().copied(),
        },
        score_statistics: DescriptiveStats::from_values(&numeric_values(dataset, Column::MinScore)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataSource, Field, MergedRecord, ScoreRecord};

    fn merged(school: &str, province: &str, year: i32, score: Field<f64>) -> MergedRecord {
        MergedRecord::from_source(
            ScoreRecord {
                school: Field::Present(school.to_string()),
                major: Field::Present("计算机".to_string()),
                province: Field::Present(province.to_string()),
                year: Field::Present(year),
                min_score: score,
                ..Default::default()
            },
            DataSource::Provincial,
        )
    }

    fn sample() -> Dataset {
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
            vec![
                merged("北京大学", "北京", 2021, Field::Present(680.0)),
                merged("北京大学", "上海", 2022, Field::Present(670.0)),
                merged("复旦大学", "上海", 2023, Field::NotAvailable),
                merged("浙江大学", "浙江", 2020, Field::Missing),
            ],
        )
    }

    #[test]
    fn test_descriptive_stats() {
        let stats = DescriptiveStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count, 8);
        assert_eq!(stats.mean, Some(5.0));
        assert_eq!(stats.median, Some(4.5));
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(9.0));
        let std = stats.std.unwrap();
        assert!((std - 2.138_089_935).abs() < 1e-6);

        let single = DescriptiveStats::from_values(&[600.0]);
        assert_eq!(single.median, Some(600.0));
        assert_eq!(single.std, None);

        assert_eq!(DescriptiveStats::from_values(&[]), DescriptiveStats::default());
    }

    #[test]
    fn test_quality_report() {
        let report = generate_quality_report(&sample());

        assert_eq!(report.summary.total_records, 4);
        assert_eq!(report.summary.total_columns, 7);
        assert_eq!(report.summary.column_types["year"], "integer");
        assert_eq!(report.missing_values["min_score"], 1);
        assert_eq!(report.duplicates.total_duplicates, 0);
        assert_eq!(report.duplicates.duplicate_keys, 0);

        // one missing cell out of 28
        assert!((report.data_quality.completeness - (1.0 - 1.0 / 28.0) * 100.0).abs() < 1e-9);
        assert_eq!(report.data_quality.uniqueness, 100.0);

        assert_eq!(report.numeric_stats["min_score"].count, 2);
        assert_eq!(report.numeric_stats["min_score"].mean, Some(675.0));
        assert_eq!(report.numeric_stats["year"].min, Some(2020.0));

        let schools = &report.categorical_stats["school"];
        assert_eq!(schools[0], ValueCount { value: "北京大学".to_string(), count: 2 });
        assert_eq!(schools.len(), 3);
        assert_eq!(report.categorical_stats["min_score_source"][0].value, "provincial");
    }

    #[test]
    fn test_quality_report_counts_whole_row_duplicates() {
        let mut data = sample();
        data.rows.push(data.rows[0].clone());
        let report = generate_quality_report(&data);
        assert_eq!(report.duplicates.total_duplicates, 1);
        assert_eq!(report.duplicates.duplicate_keys, 1);
        assert!((report.data_quality.uniqueness - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_report_on_empty_dataset() {
        let report = generate_quality_report(&Dataset::default());
        assert_eq!(report.summary.total_records, 0);
        assert_eq!(report.data_quality.completeness, 100.0);
        assert_eq!(report.data_quality.uniqueness, 100.0);
        assert!(report.numeric_stats.is_empty());
    }

    #[test]
    fn test_summary_statistics() {
        let summary = create_summary_statistics(&sample());
        assert_eq!(summary.total_schools, 3);
        assert_eq!(summary.total_majors, 1);
        assert_eq!(summary.total_provinces, 3);
        assert_eq!(summary.year_range, YearRange { min: Some(2020), max: Some(2023) });
        // the sentinel and the missing score are excluded
        assert_eq!(summary.score_statistics.count, 2);
        assert_eq!(summary.score_statistics.median, Some(675.0));
    }
}
