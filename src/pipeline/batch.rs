use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

use crate::constants::NA_SENTINEL;
use crate::domain::{Column, DataSource, Field, MergedRecord, Record, ScoreRecord};
use crate::error::{GaokaoError, Result};

/// A raw row exactly as handed over by a collector
pub type RawRow = Map<String, Value>;

/// A row that could not be parsed into the score schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// Position of the row in its raw input
    pub index: usize,
    pub reason: String,
}

/// Ordered score records from one source sharing a common column set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    columns: BTreeSet<Column>,
    pub rows: Vec<ScoreRecord>,
}

impl Batch {
    pub fn new(columns: impl IntoIterator<Item = Column>, rows: Vec<ScoreRecord>) -> Self {
        Self {
            columns: columns.into_iter().filter(|c| Column::INPUT.contains(c)).collect(),
            rows,
        }
    }

    /// Parse raw entries into a batch, collecting the entries that fail to parse.
    ///
    /// Entries must be JSON objects. The schema is the set of known columns
    /// seen as keys on any row that parsed.
    pub fn from_values(values: &[Value]) -> (Batch, Vec<RejectedRow>) {
        let mut columns = BTreeSet::new();
        let mut rows = Vec::with_capacity(values.len());
        let mut rejected = Vec::new();

        for (index, value) in values.iter().enumerate() {
            let Value::Object(raw) = value else {
                rejected.push(RejectedRow {
                    index,
                    reason: GaokaoError::ParseFailure {
                        context: format!("row {}", index),
                        reason: format!("expected an object, found {}", value),
                    }
                    .to_string(),
                });
                continue;
            };

            match parse_row(raw) {
                Ok(record) => rows.push(record),
                Err(e) => {
                    rejected.push(RejectedRow {
                        index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            }

            // only rows that survive parsing contribute to the schema
            for key in raw.keys() {
                match Column::from_name(key) {
                    Some(column) => {
                        columns.insert(column);
                    }
                    None => debug!("Ignoring unknown column '{}' in row {}", key, index),
                }
            }
        }

        (Batch { columns, rows }, rejected)
    }

    /// Columns in canonical order
    pub fn columns(&self) -> Vec<Column> {
        self.columns.iter().copied().collect()
    }

    /// Identity columns this batch lacks
    pub fn missing_identity_columns(&self) -> Vec<Column> {
        Column::IDENTITY
            .into_iter()
            .filter(|column| !self.columns.contains(column))
            .collect()
    }

    /// Append another batch; the schema becomes the union of both
    pub fn extend(&mut self, other: Batch) {
        self.columns.extend(other.columns);
        self.rows.extend(other.rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Count of missing cells across the schema columns
    pub fn missing_cells(&self) -> usize {
        self.columns
            .iter()
            .map(|column| self.rows.iter().filter(|row| row.cell(*column).is_missing()).count())
            .sum()
    }
}

/// Deduplicated output of the merger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    pub rows: Vec<MergedRecord>,
}

impl Dataset {
    /// Build a dataset directly; callers that bypass the merger are responsible for key uniqueness
    pub fn new(columns: impl IntoIterator<Item = Column>, rows: Vec<MergedRecord>) -> Self {
        let columns: BTreeSet<Column> = columns.into_iter().collect();
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// View a single source as a dataset without deduplicating it
    pub fn from_batch(batch: Batch, source: DataSource) -> Self {
        let mut columns = batch.columns.clone();
        if !batch.is_empty() {
            columns.insert(Column::DataSource);
        }
        let shadows: Vec<Column> = batch.columns.iter().filter_map(|c| c.shadow()).collect();
        columns.extend(shadows);

        let rows = batch
            .rows
            .into_iter()
            .map(|row| MergedRecord::from_source(row, source))
            .collect();
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn failure(column: Column, reason: String) -> GaokaoError {
    GaokaoError::ParseFailure {
        context: format!("column '{}'", column.name()),
        reason,
    }
}

fn parse_row(raw: &RawRow) -> Result<ScoreRecord> {
    let text = |column: Column| parse_text(raw.get(column.name()), column);
    let number = |column: Column| parse_number(raw.get(column.name()), column);

    Ok(ScoreRecord {
        school: text(Column::School)?,
        major: text(Column::Major)?,
        province: text(Column::Province)?,
        year: parse_year(raw.get(Column::Year.name()))?,
        min_score: number(Column::MinScore)?,
        min_rank: number(Column::MinRank)?,
        plan_count: number(Column::PlanCount)?,
    })
}

/// Classify a string cell as missing, sentinel or a trimmed payload
fn classify(text: &str) -> Field<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Field::Missing
    } else if trimmed == NA_SENTINEL {
        Field::NotAvailable
    } else {
        Field::Present(trimmed)
    }
}

fn parse_text(value: Option<&Value>, column: Column) -> Result<Field<String>> {
    match value {
        None | Some(Value::Null) => Ok(Field::Missing),
        Some(Value::String(s)) => Ok(match classify(s) {
            Field::Missing => Field::Missing,
            Field::NotAvailable => Field::NotAvailable,
            // keep the raw text; whitespace is the normalizer's job
            Field::Present(_) => Field::Present(s.clone()),
        }),
        Some(Value::Number(n)) => Ok(Field::Present(n.to_string())),
        Some(other) => Err(failure(column, format!("expected text, found {}", other))),
    }
}

fn parse_year(value: Option<&Value>) -> Result<Field<i32>> {
    let column = Column::Year;
    let as_year = |n: f64| -> Result<Field<i32>> {
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
            Ok(Field::Present(n as i32))
        } else {
            Err(failure(column, format!("'{}' is not a whole year", n)))
        }
    };

    match value {
        None | Some(Value::Null) => Ok(Field::Missing),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(n) => as_year(n),
            None => Err(failure(column, format!("'{}' is not a number", n))),
        },
        Some(Value::String(s)) => match classify(s) {
            Field::Missing => Ok(Field::Missing),
            Field::NotAvailable => Ok(Field::NotAvailable),
            Field::Present(text) => match text.parse::<f64>() {
                Ok(n) => as_year(n),
                Err(_) => Err(failure(column, format!("'{}' is not a year", text))),
            },
        },
        Some(other) => Err(failure(column, format!("expected a year, found {}", other))),
    }
}

fn parse_number(value: Option<&Value>, column: Column) -> Result<Field<f64>> {
    let finite = |n: f64| -> Result<Field<f64>> {
        if n.is_finite() {
            Ok(Field::Present(n))
        } else {
            Err(failure(column, format!("'{}' is not a finite number", n)))
        }
    };

    match value {
        None | Some(Value::Null) => Ok(Field::Missing),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(n) => finite(n),
            None => Err(failure(column, format!("'{}' is not a number", n))),
        },
        Some(Value::String(s)) => match classify(s) {
            Field::Missing => Ok(Field::Missing),
            Field::NotAvailable => Ok(Field::NotAvailable),
            Field::Present(text) => match text.replace(',', "").parse::<f64>() {
                Ok(n) => finite(n),
                Err(_) => Err(failure(column, format!("'{}' is not numeric", text))),
            },
        },
        Some(other) => Err(failure(column, format!("expected a number, found {}", other))),
    }
}
