use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::app::ports::{PortalHarvestPort, RecordSourcePort};
use crate::config::Config;
use crate::constants::{
    cleaned_file_name, ADMISSION_RULES_FILE, DATASET_FILE_STEM, MAJORS_FILE, QUALITY_REPORT_FILE, SCHOOLS_FILE,
    SUMMARY_FILE,
};
use crate::domain::{Column, DataSource};
use crate::error::Result;
use crate::pipeline::batch::{Batch, Dataset, RejectedRow};
use crate::pipeline::catalog::{check_catalogs, CatalogLog, CheckedCatalogs};
use crate::pipeline::export::{export, export_serializable, ExportData, ExportFormat};
use crate::pipeline::processing::conflation::{merge, MergeReport, SkippedSource, SourceBatch};
use crate::pipeline::processing::missing::{resolve, MissingValueReport};
use crate::pipeline::processing::normalize::{normalize_province, standardize};
use crate::pipeline::processing::quality_gate::{validate, ValidationReport};
use crate::pipeline::processing::report::{create_summary_statistics, generate_quality_report, QualityReport};

/// Sources in merge order, lowest priority first
const MERGE_ORDER: [DataSource; 3] = [DataSource::Portal, DataSource::Provincial, DataSource::ThirdParty];

/// Collaborators feeding one pipeline run
#[derive(Default)]
pub struct PipelineInputs {
    pub portal: Option<Box<dyn PortalHarvestPort>>,
    /// Row sources of any kind; several ports for one source are concatenated
    pub sources: Vec<Box<dyn RecordSourcePort>>,
}

/// One raw input as it was read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputLog {
    pub origin: String,
    pub rows_read: usize,
    pub rows_rejected: Vec<RejectedRow>,
}

/// What cleaning did to one source before the merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningLog {
    pub source: DataSource,
    pub inputs: Vec<InputLog>,
    /// Rows that parsed
    pub rows_in: usize,
    pub provinces_normalized: usize,
    pub schools_standardized: usize,
    pub majors_standardized: usize,
    pub missing_values: MissingValueReport,
    pub rows_out: usize,
}

/// Contents of the data-quality report file
#[derive(Debug, Serialize)]
struct DataQualityDocument<'a> {
    validation: &'a ValidationReport,
    quality: &'a QualityReport,
    merge: &'a MergeReport,
    cleaning: &'a [CleaningLog],
    /// Portal catalog entries checked one by one
    catalogs: &'a [CatalogLog],
    /// Sources that could not be loaded
    skipped_sources: &'a [SkippedSource],
    out_of_scope_rows: usize,
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub records: usize,
    pub sources_merged: Vec<DataSource>,
    /// Sources skipped while loading or merging
    pub skipped_sources: Vec<SkippedSource>,
    pub rows_rejected: usize,
    pub rows_dropped: usize,
    /// Portal catalog and rule entries that could not be parsed
    pub catalog_entries_rejected: usize,
    /// Merged rows whose province and year fall outside the configured scope
    pub out_of_scope_rows: usize,
    pub validation: ValidationReport,
    pub files_written: Vec<PathBuf>,
}

/// Load, clean, merge, validate and export the collected admission data
pub struct CollectUseCase {
    config: Config,
}

impl CollectUseCase {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run every stage once.
    ///
    /// Unreadable sources and unparseable rows are recorded and skipped.
    /// Any failure while writing outputs aborts the run; files already
    /// written are left in place.
    #[instrument(skip_all, fields(strategy = %self.config.cleaning.missing_strategy))]
    pub fn run(&self, inputs: PipelineInputs) -> Result<PipelineSummary> {
        info!(
            "Starting collection run for {} provinces and years {:?}",
            self.config.scope.provinces.len(),
            self.config.scope.years
        );
        let mut files_written = Vec::new();
        let mut skipped_sources = Vec::new();

        let harvest = match &inputs.portal {
            Some(port) => match port.load() {
                Ok(harvest) => Some(harvest),
                Err(e) => {
                    warn!("Skipping portal harvest {}: {}", port.origin(), e);
                    skipped_sources.push(SkippedSource {
                        source: DataSource::Portal,
                        reason: format!("{}: {}", port.origin(), e),
                    });
                    None
                }
            },
            None => None,
        };
        let catalogs = harvest.as_ref().map(check_catalogs).unwrap_or_default();

        let mut cleaning = Vec::new();
        let mut merge_inputs = Vec::new();
        for source in MERGE_ORDER {
            let portal_rows = match (source, &harvest) {
                (DataSource::Portal, Some(harvest)) => Some((
                    inputs.portal.as_ref().map(|p| p.origin()).unwrap_or_default(),
                    harvest.scores.as_slice(),
                )),
                _ => None,
            };
            let ports: Vec<&dyn RecordSourcePort> = inputs
                .sources
                .iter()
                .filter(|port| port.source() == source)
                .map(|port| port.as_ref())
                .collect();
            if portal_rows.is_none() && ports.is_empty() {
                continue;
            }

            let Some((mut batch, inputs_read)) = gather(source, portal_rows, &ports, &mut skipped_sources) else {
                continue;
            };
            let log = self.clean(source, &mut batch, inputs_read);

            if !batch.is_empty() {
                let path = self.config.paths.cleaned_dir.join(cleaned_file_name(source.id()));
                export(ExportData::Batch(&batch), &path, ExportFormat::Json)?;
                files_written.push(path);
            }
            cleaning.push(log);
            merge_inputs.push(SourceBatch::new(source, batch));
        }

        let outcome = merge(merge_inputs);
        let dataset = outcome.dataset;
        let validation = validate(&dataset);
        let out_of_scope_rows = self.count_out_of_scope(&dataset);

        if dataset.is_empty() {
            error!("No data to save; final outputs were not written");
        } else {
            let quality = generate_quality_report(&dataset);
            let summary = create_summary_statistics(&dataset);
            let final_dir = &self.config.paths.final_dir;

            for format in &self.config.export.formats {
                let path = final_dir.join(format!("{}.{}", DATASET_FILE_STEM, format.extension()));
                export(ExportData::Dataset(&dataset), &path, *format)?;
                files_written.push(path);
            }

            let document = DataQualityDocument {
                validation: &validation,
                quality: &quality,
                merge: &outcome.report,
                cleaning: &cleaning,
                catalogs: &catalogs.logs,
                skipped_sources: &skipped_sources,
                out_of_scope_rows,
            };
            let path = final_dir.join(QUALITY_REPORT_FILE);
            export_serializable(&document, &path, ExportFormat::Json)?;
            files_written.push(path);

            let path = final_dir.join(SUMMARY_FILE);
            export_serializable(&summary, &path, ExportFormat::Json)?;
            files_written.push(path);
        }

        if harvest.is_some() {
            files_written.extend(write_catalogs(&catalogs, &self.config.paths.raw_dir)?);
        }

        skipped_sources.extend(outcome.report.skipped_sources.iter().cloned());
        let summary = PipelineSummary {
            records: dataset.len(),
            sources_merged: outcome.report.sources_merged.clone(),
            skipped_sources,
            rows_rejected: cleaning
                .iter()
                .flat_map(|log| &log.inputs)
                .map(|input| input.rows_rejected.len())
                .sum(),
            rows_dropped: cleaning.iter().map(|log| log.missing_values.rows_dropped).sum(),
            catalog_entries_rejected: catalogs.entries_rejected(),
            out_of_scope_rows,
            validation,
            files_written,
        };
        info!(
            "Collection run finished: {} records from {} sources, {} files written",
            summary.records,
            summary.sources_merged.len(),
            summary.files_written.len()
        );
        Ok(summary)
    }

    /// Normalize provinces, standardize names, then resolve missing values
    fn clean(&self, source: DataSource, batch: &mut Batch, inputs: Vec<InputLog>) -> CleaningLog {
        info!("Cleaning {} rows from {}", batch.len(), source);
        let rows_in = batch.len();
        let provinces_normalized = normalize_province(batch);
        let schools_standardized = standardize(batch, Column::School);
        let majors_standardized = standardize(batch, Column::Major);
        let missing_values = resolve(batch, self.config.cleaning.missing_strategy);

        CleaningLog {
            source,
            inputs,
            rows_in,
            provinces_normalized,
            schools_standardized,
            majors_standardized,
            missing_values,
            rows_out: batch.len(),
        }
    }

    fn count_out_of_scope(&self, dataset: &Dataset) -> usize {
        let scope = &self.config.scope;
        let count = dataset
            .rows
            .iter()
            .filter(|row| match (row.province.present(), row.year.present()) {
                (Some(province), Some(year)) => !scope.contains(province, *year),
                _ => false,
            })
            .count();
        if count > 0 {
            warn!("{} merged rows fall outside the configured provinces and years", count);
        }
        count
    }
}

/// Parse every input of one source into a single batch.
///
/// Returns `None` when no input could be loaded; each failure is recorded.
fn gather(
    source: DataSource,
    portal_rows: Option<(String, &[serde_json::Value])>,
    ports: &[&dyn RecordSourcePort],
    skipped: &mut Vec<SkippedSource>,
) -> Option<(Batch, Vec<InputLog>)> {
    let mut batch: Option<Batch> = None;
    let mut logs = Vec::new();

    let mut absorb = |origin: String, values: &[serde_json::Value]| {
        let (parsed, rows_rejected) = Batch::from_values(values);
        if !rows_rejected.is_empty() {
            warn!("{} of {} rows from {} could not be parsed", rows_rejected.len(), values.len(), origin);
        }
        logs.push(InputLog {
            origin,
            rows_read: values.len(),
            rows_rejected,
        });
        match batch.as_mut() {
            Some(batch) => batch.extend(parsed),
            None => batch = Some(parsed),
        }
    };

    if let Some((origin, values)) = portal_rows {
        absorb(origin, values);
    }
    for port in ports {
        match port.load() {
            Ok(values) => absorb(port.origin(), &values),
            Err(e) => {
                warn!("Skipping {} input {}: {}", source, port.origin(), e);
                skipped.push(SkippedSource {
                    source,
                    reason: format!("{}: {}", port.origin(), e),
                });
            }
        }
    }

    batch.map(|batch| (batch, logs))
}

/// Write the non-empty portal catalogs; accepted school and major entries verbatim
fn write_catalogs(catalogs: &CheckedCatalogs, raw_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if !catalogs.schools.is_empty() {
        let path = raw_dir.join(SCHOOLS_FILE);
        export_serializable(&catalogs.schools, &path, ExportFormat::Json)?;
        written.push(path);
    }
    if !catalogs.majors.is_empty() {
        let path = raw_dir.join(MAJORS_FILE);
        export_serializable(&catalogs.majors, &path, ExportFormat::Json)?;
        written.push(path);
    }
    if !catalogs.admission_rules.is_empty() {
        let path = raw_dir.join(ADMISSION_RULES_FILE);
        export_serializable(&catalogs.admission_rules, &path, ExportFormat::Json)?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::Field;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    struct StaticSource {
        source: DataSource,
        rows: Option<Vec<Value>>,
    }

    impl RecordSourcePort for StaticSource {
        fn source(&self) -> DataSource {
            self.source
        }

        fn origin(&self) -> String {
            format!("static:{}", self.source.id())
        }

        fn load(&self) -> Result<Vec<Value>> {
            match &self.rows {
                Some(rows) => Ok(rows.clone()),
                None => Err(crate::error::GaokaoError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "gone",
                ))),
            }
        }
    }

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.raw_dir = dir.join("raw");
        config.paths.cleaned_dir = dir.join("cleaned");
        config.paths.final_dir = dir.join("final");
        config
    }

    fn boxed(source: DataSource, rows: Option<Vec<Value>>) -> Box<dyn RecordSourcePort> {
        Box::new(StaticSource { source, rows })
    }

    #[test]
    fn test_failed_source_is_skipped_and_others_merge() {
        let dir = tempdir().unwrap();
        let use_case = CollectUseCase::new(config_in(dir.path()));
        let inputs = PipelineInputs {
            portal: None,
            sources: vec![
                boxed(DataSource::Provincial, None),
                boxed(
                    DataSource::ThirdParty,
                    Some(vec![json!({
                        "school": "浙江大学", "major": "计算机", "province": "浙江省",
                        "year": 2023, "min_score": 660
                    })]),
                ),
            ],
        };

        let summary = use_case.run(inputs).unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.sources_merged, vec![DataSource::ThirdParty]);
        assert_eq!(summary.skipped_sources.len(), 1);
        assert_eq!(summary.skipped_sources[0].source, DataSource::Provincial);
        assert!(dir.path().join("final").join(QUALITY_REPORT_FILE).exists());
    }

    #[test]
    fn test_cleaning_runs_before_merge() {
        let dir = tempdir().unwrap();
        let use_case = CollectUseCase::new(config_in(dir.path()));
        let row = |province: &str, score: i64| {
            json!({"school": "北京大学", "major": "数学", "province": province, "year": 2022, "min_score": score})
        };
        let inputs = PipelineInputs {
            portal: None,
            sources: vec![
                boxed(DataSource::Provincial, Some(vec![row("北京市", 670)])),
                boxed(DataSource::ThirdParty, Some(vec![row("北京", 672)])),
            ],
        };

        let summary = use_case.run(inputs).unwrap();
        // both provinces normalize to 北京, so the rows collide and the later source wins
        assert_eq!(summary.records, 1);
        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("final").join("gaokao_data.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(written[0]["min_score"], json!(672));
        assert_eq!(written[0]["min_score_source"], json!("third_party"));
    }

    #[test]
    fn test_out_of_scope_rows_are_counted_not_removed() {
        let dir = tempdir().unwrap();
        let use_case = CollectUseCase::new(config_in(dir.path()));
        let inputs = PipelineInputs {
            portal: None,
            sources: vec![boxed(
                DataSource::ThirdParty,
                Some(vec![
                    json!({"school": "a", "major": "b", "province": "西藏", "year": 2023}),
                    json!({"school": "a", "major": "b", "province": "北京", "year": 2023}),
                    json!({"school": "a", "major": "b", "province": "北京"}),
                ]),
            )],
        };

        let summary = use_case.run(inputs).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.out_of_scope_rows, 1);
    }

    #[test]
    fn test_clean_records_every_step() {
        let use_case = CollectUseCase::new(Config::default());
        let mut batch = Batch::new(
            Column::INPUT,
            vec![crate::domain::ScoreRecord {
                school: Field::Present("北大(医学部)".to_string()),
                major: Field::Present(" 临床医学 ".to_string()),
                province: Field::Present("广东省".to_string()),
                year: Field::Present(2023),
                ..Default::default()
            }],
        );

        let log = use_case.clean(DataSource::Portal, &mut batch, Vec::new());
        assert_eq!(log.provinces_normalized, 1);
        assert_eq!(log.schools_standardized, 1);
        assert_eq!(log.majors_standardized, 1);
        assert_eq!(log.missing_values.cells_filled, 3);
        assert_eq!(batch.rows[0].school, Field::Present("北京大学".to_string()));
    }
}
