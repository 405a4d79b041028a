use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::domain::{ColumnKind, Field, Record};
use crate::error::GaokaoError;
use crate::pipeline::batch::Batch;

/// How missing cells are handled before merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    /// Replace every missing cell with the `N/A` sentinel
    #[default]
    MarkNa,
    /// Linearly interpolate interior gaps of numeric columns
    Interpolate,
    /// Remove every row with at least one missing cell
    Drop,
    /// Carry the last non-missing value of each column forward
    ForwardFill,
}

impl MissingValueStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            MissingValueStrategy::MarkNa => "mark_na",
            MissingValueStrategy::Interpolate => "interpolate",
            MissingValueStrategy::Drop => "drop",
            MissingValueStrategy::ForwardFill => "forward_fill",
        }
    }
}

impl fmt::Display for MissingValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MissingValueStrategy {
    type Err = GaokaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mark_na" => Ok(MissingValueStrategy::MarkNa),
            "interpolate" => Ok(MissingValueStrategy::Interpolate),
            "drop" => Ok(MissingValueStrategy::Drop),
            "forward_fill" => Ok(MissingValueStrategy::ForwardFill),
            other => Err(GaokaoError::InvalidConfiguration(format!(
                "unknown missing-value strategy '{}' (expected mark_na, interpolate, drop or forward_fill)",
                other
            ))),
        }
    }
}

/// What a resolution pass changed, kept for the quality report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MissingValueReport {
    pub strategy: MissingValueStrategy,
    /// Missing cells before the pass
    pub missing_before: usize,
    /// Cells that received a value
    pub cells_filled: usize,
    /// Rows removed by the drop strategy
    pub rows_dropped: usize,
    /// Missing cells after the pass
    pub missing_after: usize,
}

/// Apply `strategy` to `batch` in place. Never fails; the schema is unchanged.
pub fn resolve(batch: &mut Batch, strategy: MissingValueStrategy) -> MissingValueReport {
    info!("Resolving missing values with strategy: {}", strategy);
    let missing_before = batch.missing_cells();
    let mut report = MissingValueReport {
        strategy,
        missing_before,
        ..Default::default()
    };

    match strategy {
        MissingValueStrategy::MarkNa => {
            report.cells_filled = fill_columns(batch, mark_na);
            if report.cells_filled > 0 {
                warn!("Marked {} missing cells as N/A", report.cells_filled);
            }
        }
        MissingValueStrategy::Interpolate => {
            for column in batch.columns() {
                if column.kind() != ColumnKind::Number {
                    continue;
                }
                let fields: Vec<&mut Field<f64>> = batch.rows.iter_mut().filter_map(|r| r.number_mut(column)).collect();
                let filled = interpolate(fields);
                if filled > 0 {
                    info!("Interpolated {} cells in column {}", filled, column.name());
                }
                report.cells_filled += filled;
            }
        }
        MissingValueStrategy::Drop => {
            let columns = batch.columns();
            let before = batch.rows.len();
            batch
                .rows
                .retain(|row| !columns.iter().any(|column| row.cell(*column).is_missing()));
            report.rows_dropped = before - batch.rows.len();
            if report.rows_dropped > 0 {
                warn!("Dropped {} rows containing missing values", report.rows_dropped);
            }
        }
        MissingValueStrategy::ForwardFill => {
            report.cells_filled = fill_columns(batch, forward_fill);
            info!("Forward filled {} cells", report.cells_filled);
        }
    }

    report.missing_after = batch.missing_cells();
    report
}

/// Run a per-column fill over every schema column, whatever its storage kind
fn fill_columns(batch: &mut Batch, fill: impl Fn(ColumnFields<'_>) -> usize) -> usize {
    let mut filled = 0;
    for column in batch.columns() {
        let fields = match column.kind() {
            ColumnKind::Text => ColumnFields::Text(batch.rows.iter_mut().filter_map(|r| r.text_mut(column)).collect()),
            ColumnKind::Integer => ColumnFields::Integer(batch.rows.iter_mut().map(|r| &mut r.year).collect()),
            ColumnKind::Number => {
                ColumnFields::Number(batch.rows.iter_mut().filter_map(|r| r.number_mut(column)).collect())
            }
        };
        filled += fill(fields);
    }
    filled
}

/// Mutable cells of one column, grouped by storage type
enum ColumnFields<'a> {
    Text(Vec<&'a mut Field<String>>),
    Integer(Vec<&'a mut Field<i32>>),
    Number(Vec<&'a mut Field<f64>>),
}

fn mark_na(fields: ColumnFields<'_>) -> usize {
    fn mark<T>(fields: Vec<&mut Field<T>>) -> usize {
        let mut marked = 0;
        for field in fields {
            if field.is_missing() {
                *field = Field::NotAvailable;
                marked += 1;
            }
        }
        marked
    }

    match fields {
        ColumnFields::Text(f) => mark(f),
        ColumnFields::Integer(f) => mark(f),
        ColumnFields::Number(f) => mark(f),
    }
}

fn forward_fill(fields: ColumnFields<'_>) -> usize {
    fn fill<T: Clone>(fields: Vec<&mut Field<T>>) -> usize {
        let mut last: Option<Field<T>> = None;
        let mut filled = 0;
        for field in fields {
            if field.is_missing() {
                if let Some(previous) = &last {
                    *field = previous.clone();
                    filled += 1;
                }
            } else {
                last = Some(field.clone());
            }
        }
        filled
    }

    match fields {
        ColumnFields::Text(f) => fill(f),
        ColumnFields::Integer(f) => fill(f),
        ColumnFields::Number(f) => fill(f),
    }
}

/// Fill interior gaps linearly by row position.
///
/// Anchors are present values only; sentinel cells are neither anchors nor
/// filled. Leading and trailing gaps stay missing.
fn interpolate(mut fields: Vec<&mut Field<f64>>) -> usize {
    let anchors: Vec<(usize, f64)> = fields
        .iter()
        .enumerate()
        .filter_map(|(i, field)| field.present().map(|v| (i, *v)))
        .collect();

    let mut filled = 0;
    for pair in anchors.windows(2) {
        let (start, from) = pair[0];
        let (end, to) = pair[1];
        for i in start + 1..end {
            if fields[i].is_missing() {
                let offset = (to - from) * (i - start) as f64 / (end - start) as f64;
                *fields[i] = Field::Present(from + offset);
                filled += 1;
            }
        }
    }
    filled
}
