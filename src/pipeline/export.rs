use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::domain::{Column, Record, RowView};
use crate::error::{GaokaoError, Result};
use crate::pipeline::batch::{Batch, Dataset};

/// UTF-8 byte-order mark so spreadsheet tools detect the encoding of delimited files
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Output formats supported by [`export`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
    /// Tab-separated table for spreadsheet tools; row-oriented data only
    #[serde(alias = "excel")]
    Tabular,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Tabular => "tsv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Tabular => "tabular",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = GaokaoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "tabular" | "excel" => Ok(ExportFormat::Tabular),
            other => Err(GaokaoError::InvalidConfiguration(format!(
                "unknown export format '{}' (expected json, csv or tabular)",
                other
            ))),
        }
    }
}

/// Something the writer can persist
#[derive(Debug, Clone, Copy)]
pub enum ExportData<'a> {
    Dataset(&'a Dataset),
    Batch(&'a Batch),
    /// Non-tabular data such as reports and summaries
    Mapping(&'a Value),
}

/// Write `data` to `path` in `format`, creating parent directories.
///
/// Not atomic: a failure mid-write can leave a partial file behind.
pub fn export(data: ExportData<'_>, path: &Path, format: ExportFormat) -> Result<()> {
    info!("Saving {} data to {}", format, path.display());
    ensure_parent_dir(path)?;

    match (format, data) {
        (ExportFormat::Json, ExportData::Dataset(dataset)) => write_json_rows(path, dataset.columns(), &dataset.rows)?,
        (ExportFormat::Json, ExportData::Batch(batch)) => write_json_rows(path, &batch.columns(), &batch.rows)?,
        (ExportFormat::Json, ExportData::Mapping(value)) => write_json(path, value)?,
        (ExportFormat::Csv, ExportData::Dataset(dataset)) => {
            write_delimited_rows(path, b',', dataset.columns(), &dataset.rows)?
        }
        (ExportFormat::Csv, ExportData::Batch(batch)) => write_delimited_rows(path, b',', &batch.columns(), &batch.rows)?,
        (ExportFormat::Csv, ExportData::Mapping(value)) => write_csv_mapping(path, value)?,
        (ExportFormat::Tabular, ExportData::Dataset(dataset)) => {
            write_delimited_rows(path, b'\t', dataset.columns(), &dataset.rows)?
        }
        (ExportFormat::Tabular, ExportData::Batch(batch)) => {
            write_delimited_rows(path, b'\t', &batch.columns(), &batch.rows)?
        }
        (ExportFormat::Tabular, ExportData::Mapping(_)) => {
            return Err(GaokaoError::UnsupportedFormat(
                "tabular export requires row-oriented data".to_string(),
            ))
        }
    }

    info!("Data saved to: {}", path.display());
    Ok(())
}

/// Serialize any report-like value and export it as a mapping
pub fn export_serializable<T: Serialize>(value: &T, path: &Path, format: ExportFormat) -> Result<()> {
    let value = serde_json::to_value(value)?;
    export(ExportData::Mapping(&value), path, format)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn write_json_rows<R: Record>(path: &Path, columns: &[Column], rows: &[R]) -> Result<()> {
    let views: Vec<RowView<'_, R>> = rows.iter().map(|row| RowView { columns, row }).collect();
    write_json(path, &views)
}

fn bom_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;
    Ok(csv::WriterBuilder::new().delimiter(delimiter).from_writer(file))
}

fn write_delimited_rows<R: Record>(path: &Path, delimiter: u8, columns: &[Column], rows: &[R]) -> Result<()> {
    let mut writer = bom_writer(path, delimiter)?;
    writer.write_record(columns.iter().map(|c| c.name()))?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| row.cell(*c).to_text()))?;
    }
    writer.flush()?;
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten nested objects into `(dotted.key, value)` pairs
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        other => out.push((prefix.to_string(), scalar_text(other))),
    }
}

/// CSV for non-tabular data: an array of objects becomes one row per element,
/// an object becomes `key,value` rows with nested keys dotted
fn write_csv_mapping(path: &Path, value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => {
            let mut headers: Vec<String> = Vec::new();
            for item in items {
                let Value::Object(map) = item else {
                    return Err(GaokaoError::UnsupportedFormat(
                        "csv export of an array requires every element to be an object".to_string(),
                    ));
                };
                for key in map.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }

            let mut writer = bom_writer(path, b',')?;
            writer.write_record(&headers)?;
            for item in items {
                writer.write_record(headers.iter().map(|h| item.get(h).map(scalar_text).unwrap_or_default()))?;
            }
            writer.flush()?;
        }
        Value::Object(_) => {
            let mut pairs = Vec::new();
            flatten("", value, &mut pairs);
            let mut writer = bom_writer(path, b',')?;
            writer.write_record(["key", "value"])?;
            for (key, text) in pairs {
                writer.write_record([key, text])?;
            }
            writer.flush()?;
        }
        _ => {
            return Err(GaokaoError::UnsupportedFormat(
                "csv export requires an object or an array of objects".to_string(),
            ))
        }
    }
    Ok(())
}
