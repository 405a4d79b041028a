use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::DataSource;
use crate::constants::NA_SENTINEL;

/// A single cell of the fixed score schema.
///
/// `Missing` is an absent or empty value; `NotAvailable` is the explicit
/// `"N/A"` sentinel written by the mark-na strategy and is never treated as
/// missing by later stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field<T> {
    Missing,
    NotAvailable,
    Present(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Missing
    }
}

impl<T> Field<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Columns of the fixed score schema, in canonical output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    School,
    Major,
    Province,
    Year,
    MinScore,
    MinRank,
    PlanCount,
    DataSource,
    MinScoreSource,
    MinRankSource,
    PlanCountSource,
}

/// Storage kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Number,
}

impl Column {
    /// Columns a raw source row may carry
    pub const INPUT: [Column; 7] = [
        Column::School,
        Column::Major,
        Column::Province,
        Column::Year,
        Column::MinScore,
        Column::MinRank,
        Column::PlanCount,
    ];

    /// Columns forming the composite key
    pub const IDENTITY: [Column; 4] = [Column::School, Column::Major, Column::Province, Column::Year];

    /// Numeric columns whose provenance is tracked through a merge
    pub const CONFLICT_PRONE: [Column; 3] = [Column::MinScore, Column::MinRank, Column::PlanCount];

    pub fn name(&self) -> &'static str {
        match self {
            Column::School => "school",
            Column::Major => "major",
            Column::Province => "province",
            Column::Year => "year",
            Column::MinScore => "min_score",
            Column::MinRank => "min_rank",
            Column::PlanCount => "plan_count",
            Column::DataSource => "data_source",
            Column::MinScoreSource => "min_score_source",
            Column::MinRankSource => "min_rank_source",
            Column::PlanCountSource => "plan_count_source",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::INPUT.into_iter().find(|column| column.name() == name)
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Year => ColumnKind::Integer,
            Column::MinScore | Column::MinRank | Column::PlanCount => ColumnKind::Number,
            _ => ColumnKind::Text,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() != ColumnKind::Text
    }

    /// Shadow column carrying the provenance of a conflict-prone field
    pub fn shadow(&self) -> Option<Column> {
        match self {
            Column::MinScore => Some(Column::MinScoreSource),
            Column::MinRank => Some(Column::MinRankSource),
            Column::PlanCount => Some(Column::PlanCountSource),
            _ => None,
        }
    }
}

/// Borrowed view of one cell, independent of the row type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellRef<'a> {
    Missing,
    NotAvailable,
    Text(&'a str),
    Integer(i32),
    Number(f64),
}

impl<'a> CellRef<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellRef::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellRef::Integer(value) => Some(*value as f64),
            CellRef::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellRef::Missing => Value::Null,
            CellRef::NotAvailable => Value::String(NA_SENTINEL.to_string()),
            CellRef::Text(text) => Value::String(text.to_string()),
            CellRef::Integer(value) => Value::from(*value),
            CellRef::Number(value) => number_to_json(*value),
        }
    }

    /// Text form used by delimited exports; missing cells are empty
    pub fn to_text(&self) -> String {
        match self {
            CellRef::Missing => String::new(),
            CellRef::NotAvailable => NA_SENTINEL.to_string(),
            CellRef::Text(text) => text.to_string(),
            CellRef::Integer(value) => value.to_string(),
            CellRef::Number(value) => format_number(*value),
        }
    }
}

fn is_integral(value: f64) -> bool {
    value.fract() == 0.0 && value.abs() < 9.0e15
}

/// Integral floats are written as integers so scores read `680`, not `680.0`
pub fn number_to_json(value: f64) -> Value {
    if is_integral(value) {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub fn format_number(value: f64) -> String {
    if is_integral(value) {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn field_cell<'a>(field: &'a Field<String>) -> CellRef<'a> {
    match field {
        Field::Missing => CellRef::Missing,
        Field::NotAvailable => CellRef::NotAvailable,
        Field::Present(text) => CellRef::Text(text),
    }
}

fn year_cell(field: &Field<i32>) -> CellRef<'static> {
    match field {
        Field::Missing => CellRef::Missing,
        Field::NotAvailable => CellRef::NotAvailable,
        Field::Present(year) => CellRef::Integer(*year),
    }
}

fn number_cell(field: &Field<f64>) -> CellRef<'static> {
    match field {
        Field::Missing => CellRef::Missing,
        Field::NotAvailable => CellRef::NotAvailable,
        Field::Present(value) => CellRef::Number(*value),
    }
}

/// Row access shared by raw batches and merged datasets
pub trait Record {
    fn cell(&self, column: Column) -> CellRef<'_>;

    fn key(&self) -> CompositeKey;
}

/// The `(school, major, province, year)` tuple identifying one observation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub school: Field<String>,
    pub major: Field<String>,
    pub province: Field<String>,
    pub year: Field<i32>,
}

/// One (school, major, province, year) observation as produced by a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreRecord {
    pub school: Field<String>,
    pub major: Field<String>,
    pub province: Field<String>,
    pub year: Field<i32>,
    pub min_score: Field<f64>,
    pub min_rank: Field<f64>,
    pub plan_count: Field<f64>,
}

impl ScoreRecord {
    pub fn text_mut(&mut self, column: Column) -> Option<&mut Field<String>> {
        match column {
            Column::School => Some(&mut self.school),
            Column::Major => Some(&mut self.major),
            Column::Province => Some(&mut self.province),
            _ => None,
        }
    }

    pub fn number_mut(&mut self, column: Column) -> Option<&mut Field<f64>> {
        match column {
            Column::MinScore => Some(&mut self.min_score),
            Column::MinRank => Some(&mut self.min_rank),
            Column::PlanCount => Some(&mut self.plan_count),
            _ => None,
        }
    }
}

impl Record for ScoreRecord {
    fn cell(&self, column: Column) -> CellRef<'_> {
        match column {
            Column::School => field_cell(&self.school),
            Column::Major => field_cell(&self.major),
            Column::Province => field_cell(&self.province),
            Column::Year => year_cell(&self.year),
            Column::MinScore => number_cell(&self.min_score),
            Column::MinRank => number_cell(&self.min_rank),
            Column::PlanCount => number_cell(&self.plan_count),
            _ => CellRef::Missing,
        }
    }

    fn key(&self) -> CompositeKey {
        CompositeKey {
            school: self.school.clone(),
            major: self.major.clone(),
            province: self.province.clone(),
            year: self.year.clone(),
        }
    }
}

/// A value paired with the source that supplied it
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: Field<T>,
    pub source: DataSource,
}

/// A row of a merged dataset
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub school: Field<String>,
    pub major: Field<String>,
    pub province: Field<String>,
    pub year: Field<i32>,
    pub min_score: Sourced<f64>,
    pub min_rank: Sourced<f64>,
    pub plan_count: Sourced<f64>,
    pub data_source: DataSource,
}

impl MergedRecord {
    /// Tag a cleaned source row with its provenance
    pub fn from_source(record: ScoreRecord, source: DataSource) -> Self {
        Self {
            school: record.school,
            major: record.major,
            province: record.province,
            year: record.year,
            min_score: Sourced { value: record.min_score, source },
            min_rank: Sourced { value: record.min_rank, source },
            plan_count: Sourced { value: record.plan_count, source },
            data_source: source,
        }
    }
}

impl Record for MergedRecord {
    fn cell(&self, column: Column) -> CellRef<'_> {
        match column {
            Column::School => field_cell(&self.school),
            Column::Major => field_cell(&self.major),
            Column::Province => field_cell(&self.province),
            Column::Year => year_cell(&self.year),
            Column::MinScore => number_cell(&self.min_score.value),
            Column::MinRank => number_cell(&self.min_rank.value),
            Column::PlanCount => number_cell(&self.plan_count.value),
            Column::DataSource => CellRef::Text(self.data_source.id()),
            Column::MinScoreSource => CellRef::Text(self.min_score.source.id()),
            Column::MinRankSource => CellRef::Text(self.min_rank.source.id()),
            Column::PlanCountSource => CellRef::Text(self.plan_count.source.id()),
        }
    }

    fn key(&self) -> CompositeKey {
        CompositeKey {
            school: self.school.clone(),
            major: self.major.clone(),
            province: self.province.clone(),
            year: self.year.clone(),
        }
    }
}

/// Serializes a row as a JSON object restricted to, and ordered by, `columns`
pub struct RowView<'a, R> {
    pub columns: &'a [Column],
    pub row: &'a R,
}

impl<'a, R: Record> Serialize for RowView<'a, R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in self.columns {
            map.serialize_entry(column.name(), &self.row.cell(*column).to_json())?;
        }
        map.end()
    }
}
