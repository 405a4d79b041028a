/// Output file names and fixed validation bounds shared across the pipeline

// Sentinel written in place of a missing cell
pub const NA_SENTINEL: &str = "N/A";

// Valid ranges checked by the validator (inclusive)
pub const MIN_VALID_YEAR: i32 = 2010;
pub const MAX_VALID_YEAR: i32 = 2024;
pub const MIN_VALID_SCORE: f64 = 0.0;
pub const MAX_VALID_SCORE: f64 = 750.0;

// Final outputs
pub const DATASET_FILE_STEM: &str = "gaokao_data";
pub const QUALITY_REPORT_FILE: &str = "data_quality_report.json";
pub const SUMMARY_FILE: &str = "summary_statistics.json";

// Raw catalog outputs
pub const SCHOOLS_FILE: &str = "schools.json";
pub const MAJORS_FILE: &str = "majors.json";
pub const ADMISSION_RULES_FILE: &str = "admission_rules.json";

/// Lines of context kept around a keyword hit when extracting rule sections
pub const RULE_CONTEXT_LINES: usize = 3;

/// Default crawl scope handed to the collector
pub fn default_provinces() -> Vec<String> {
    ["北京", "上海", "广东", "江苏", "浙江", "山东", "河南", "四川", "湖北", "湖南"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

pub fn default_years() -> Vec<i32> {
    vec![2020, 2021, 2022, 2023]
}

/// Cleaned interim file name for one source
pub fn cleaned_file_name(source_id: &str) -> String {
    format!("{}_scores.json", source_id)
}
