use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

use crate::domain::{Column, CompositeKey, DataSource, MergedRecord, Record};
use crate::error::GaokaoError;
use crate::pipeline::batch::{Batch, Dataset};
use crate::pipeline::processing::normalize::standardize;

/// One cleaned input to the merger
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: DataSource,
    pub batch: Batch,
}

impl SourceBatch {
    pub fn new(source: DataSource, batch: Batch) -> Self {
        Self { source, batch }
    }
}

/// A source left out of a merge, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSource {
    pub source: DataSource,
    pub reason: String,
}

/// Bookkeeping for a merge run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    /// Sources that contributed rows, in merge order
    pub sources_merged: Vec<DataSource>,
    pub skipped_sources: Vec<SkippedSource>,
    /// Rows entering deduplication
    pub rows_in: usize,
    /// Rows in the merged dataset
    pub rows_out: usize,
    /// Rows replaced by a later row with the same composite key
    pub rows_superseded: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub dataset: Dataset,
    pub report: MergeReport,
}

/// Merge cleaned source batches into a dataset unique by composite key.
///
/// Sources are listed from lowest to highest priority: when two rows share
/// `(school, major, province, year)` the row from the later source is kept,
/// in the position of its last occurrence. Sources lacking an identity
/// column are skipped with a warning and the remaining sources still merge.
pub fn merge(sources: Vec<SourceBatch>) -> MergeOutcome {
    info!("Merging {} sources", sources.len());
    let mut report = MergeReport::default();
    let mut columns: BTreeSet<Column> = BTreeSet::new();
    let mut rows: Vec<MergedRecord> = Vec::new();

    for SourceBatch { source, mut batch } in sources {
        if batch.is_empty() {
            info!("Source {} is empty, nothing to merge", source);
            continue;
        }

        let missing = batch.missing_identity_columns();
        if !missing.is_empty() {
            let error = GaokaoError::SchemaMismatch {
                source_name: source.id().to_string(),
                missing: missing.iter().map(|c| c.name().to_string()).collect(),
            };
            warn!("Skipping source {}: {}", source, error);
            report.skipped_sources.push(SkippedSource {
                source,
                reason: error.to_string(),
            });
            continue;
        }

        standardize(&mut batch, Column::School);
        standardize(&mut batch, Column::Major);

        info!("Source {} contributes {} rows", source, batch.len());
        columns.extend(batch.columns());
        rows.extend(batch.rows.into_iter().map(|row| MergedRecord::from_source(row, source)));
        report.sources_merged.push(source);
    }

    report.rows_in = rows.len();
    let rows = keep_last_by_key(rows);
    report.rows_out = rows.len();
    report.rows_superseded = report.rows_in - report.rows_out;

    if report.rows_superseded > 0 {
        info!("{} rows superseded by higher-priority sources", report.rows_superseded);
    }

    let shadows: Vec<Column> = Column::CONFLICT_PRONE
        .iter()
        .filter(|column| columns.contains(column))
        .filter_map(|column| column.shadow())
        .collect();
    if !report.sources_merged.is_empty() {
        columns.insert(Column::DataSource);
    }
    columns.extend(shadows);

    info!("Merge complete, final dataset has {} records", report.rows_out);
    MergeOutcome {
        dataset: Dataset::new(columns, rows),
        report,
    }
}

/// Drop every row whose key reappears later, preserving the order of survivors
fn keep_last_by_key(rows: Vec<MergedRecord>) -> Vec<MergedRecord> {
    let mut last_index: HashMap<CompositeKey, usize> = HashMap::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        last_index.insert(row.key(), index);
    }

    rows.into_iter()
        .enumerate()
        .filter(|(index, row)| last_index.get(&row.key()) == Some(index))
        .map(|(_, row)| row)
        .collect()
}
