use csv::{ReaderBuilder, Trim};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::app::ports::{PortalHarvestPort, RecordSourcePort};
use crate::domain::{DataSource, PortalHarvest};
use crate::error::{GaokaoError, Result};
use crate::pipeline::batch::RawRow;

const BOM: char = '\u{feff}';

/// Score rows for one source read from a JSON or CSV file
pub struct FileRecordSource {
    source: DataSource,
    path: PathBuf,
}

impl FileRecordSource {
    pub fn new(source: DataSource, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }
}

impl RecordSourcePort for FileRecordSource {
    fn source(&self) -> DataSource {
        self.source
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<Value>> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let rows = match extension.as_deref() {
            Some("json") => read_json_rows(&self.path)?,
            Some("csv") => read_csv_rows(&self.path)?,
            _ => {
                return Err(GaokaoError::UnsupportedFormat(format!(
                    "cannot read rows from '{}'; expected .json or .csv",
                    self.path.display()
                )))
            }
        };

        info!("Loaded {} raw rows for {} from {}", rows.len(), self.source, self.path.display());
        Ok(rows)
    }
}

/// Portal harvest read from a single JSON document
pub struct PortalHarvestFile {
    path: PathBuf,
}

impl PortalHarvestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PortalHarvestPort for PortalHarvestFile {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<PortalHarvest> {
        let content = fs::read_to_string(&self.path)?;
        let harvest: PortalHarvest = serde_json::from_str(content.trim_start_matches(BOM))?;
        info!(
            "Loaded portal harvest: {} schools, {} majors, {} score rows, {} rule documents",
            harvest.schools.len(),
            harvest.majors.len(),
            harvest.scores.len(),
            harvest.admission_rules.len() + harvest.admission_rule_texts.len()
        );
        Ok(harvest)
    }
}

/// A top-level array of rows, or an object carrying them under `scores`
fn read_json_rows(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(content.trim_start_matches(BOM))?;

    match document {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("scores") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(unexpected_shape(path)),
        },
        _ => Err(unexpected_shape(path)),
    }
}

fn unexpected_shape(path: &Path) -> GaokaoError {
    GaokaoError::ParseFailure {
        context: path.display().to_string(),
        reason: "expected an array of rows or an object with a 'scores' array".to_string(),
    }
}

/// Every record becomes an object of string cells keyed by header.
///
/// Short records leave the trailing columns absent. A record with more cells
/// than headers is kept as a bare array so row parsing rejects it.
fn read_csv_rows(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)?;
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(content.trim_start_matches(BOM).as_bytes());

    let headers = reader.headers()?.clone();
    debug!("CSV headers for {}: {:?}", path.display(), headers);

    let mut rows = Vec::new();
    let mut overlong = 0;
    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            overlong += 1;
            warn!(
                "Record {} of {} has {} cells for {} headers",
                rows.len(),
                path.display(),
                record.len(),
                headers.len()
            );
            rows.push(Value::Array(
                record.iter().map(|cell| Value::String(cell.to_string())).collect(),
            ));
            continue;
        }

        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), Value::String(cell.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }

    if overlong > 0 {
        warn!("{} over-long records in {} will be rejected", overlong, path.display());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_reads_json_array_and_scores_object() {
        let dir = tempdir().unwrap();
        let array = dir.path().join("rows.json");
        fs::write(&array, json!([{"school": "北京大学"}, 3]).to_string()).unwrap();
        let wrapped = dir.path().join("wrapped.json");
        fs::write(&wrapped, json!({"scores": [{"school": "清华大学"}]}).to_string()).unwrap();

        let rows = FileRecordSource::new(DataSource::Provincial, &array).load().unwrap();
        assert_eq!(rows.len(), 2);
        let rows = FileRecordSource::new(DataSource::Provincial, &wrapped).load().unwrap();
        assert_eq!(rows, vec![json!({"school": "清华大学"})]);
    }

    #[test]
    fn test_rejects_other_json_shapes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, r#"{"rows": []}"#).unwrap();
        let result = FileRecordSource::new(DataSource::ThirdParty, &path).load();
        assert!(matches!(result, Err(GaokaoError::ParseFailure { .. })));
    }

    #[test]
    fn test_reads_csv_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "\u{feff}school,year,min_score\n复旦大学,2022,N/A\n浙江大学,2023,\n").unwrap();

        let rows = FileRecordSource::new(DataSource::ThirdParty, &path).load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], json!({"school": "复旦大学", "year": "2022", "min_score": "N/A"}));
        assert_eq!(rows[1]["min_score"], json!(""));
    }

    #[test]
    fn test_overlong_csv_record_is_not_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(
            &path,
            "school,major,province,year\n北京大学,数学,北京,2023,680,EXTRA\n复旦大学,数学,上海,2023\n",
        )
        .unwrap();

        let rows = FileRecordSource::new(DataSource::Provincial, &path).load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], json!(["北京大学", "数学", "北京", "2023", "680", "EXTRA"]));
        assert_eq!(rows[1]["school"], json!("复旦大学"));

        let (batch, rejected) = crate::pipeline::batch::Batch::from_values(&rows);
        assert_eq!(batch.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].index, 0);
        assert!(rejected[0].reason.contains("EXTRA"));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = FileRecordSource::new(DataSource::Portal, "scores.xlsx").load();
        assert!(matches!(result, Err(GaokaoError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = FileRecordSource::new(DataSource::Portal, "/nonexistent/scores.json").load();
        assert!(matches!(result, Err(GaokaoError::Io(_))));
    }

    #[test]
    fn test_loads_portal_harvest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portal.json");
        fs::write(
            &path,
            json!({
                "schools": [{"name": "北京大学", "location": "北京"}],
                "scores": [{"school": "北京大学", "year": 2023}],
                "admission_rule_texts": [{"school_id": 1, "text": "录取规则"}]
            })
            .to_string(),
        )
        .unwrap();

        let harvest = PortalHarvestFile::new(&path).load().unwrap();
        assert_eq!(harvest.schools[0]["location"], json!("北京"));
        assert_eq!(harvest.scores.len(), 1);
        assert!(harvest.majors.is_empty());
        assert_eq!(harvest.admission_rule_texts[0]["school_id"], json!(1));
    }

    #[test]
    fn test_portal_harvest_keeps_malformed_catalog_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portal.json");
        fs::write(
            &path,
            json!({
                "schools": [{"name": 123}],
                "scores": [{"school": "北京大学", "major": "数学", "province": "北京", "year": 2023}]
            })
            .to_string(),
        )
        .unwrap();

        let harvest = PortalHarvestFile::new(&path).load().unwrap();
        assert_eq!(harvest.schools, vec![json!({"name": 123})]);
        assert_eq!(harvest.scores.len(), 1);
    }
}
