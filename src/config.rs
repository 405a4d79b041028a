use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{default_provinces, default_years};
use crate::error::{GaokaoError, Result};
use crate::pipeline::export::ExportFormat;
use crate::pipeline::processing::missing::MissingValueStrategy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    pub cleaning: CleaningConfig,
    pub export: ExportConfig,
    pub scope: ScopeConfig,
}

/// Where each pipeline stage writes its files
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub cleaned_dir: PathBuf,
    pub final_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            cleaned_dir: PathBuf::from("data/cleaned"),
            final_dir: PathBuf::from("data/final"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningConfig {
    pub missing_strategy: MissingValueStrategy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Formats the merged dataset is written in
    pub formats: Vec<ExportFormat>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            formats: vec![ExportFormat::Json, ExportFormat::Csv],
        }
    }
}

/// Provinces and years the collector was asked for
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    pub provinces: Vec<String>,
    pub years: Vec<i32>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            provinces: default_provinces(),
            years: default_years(),
        }
    }
}

impl ScopeConfig {
    pub fn contains(&self, province: &str, year: i32) -> bool {
        self.provinces.iter().any(|p| p == province) && self.years.contains(&year)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            GaokaoError::InvalidConfiguration(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&config_content)
    }

    /// Parse and check a TOML document; unknown strategies or formats are rejected here
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| GaokaoError::InvalidConfiguration(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.export.formats.is_empty() {
            return Err(GaokaoError::InvalidConfiguration(
                "export.formats must name at least one format".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.paths.final_dir, PathBuf::from("data/final"));
        assert_eq!(config.cleaning.missing_strategy, MissingValueStrategy::MarkNa);
        assert_eq!(config.export.formats, vec![ExportFormat::Json, ExportFormat::Csv]);
        assert_eq!(config.scope.provinces.len(), 10);
        assert!(config.scope.contains("北京", 2023));
        assert!(!config.scope.contains("北京", 2019));
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [cleaning]
            missing_strategy = "forward_fill"

            [export]
            formats = ["json", "excel"]
            "#,
        )
        .unwrap();
        assert_eq!(config.cleaning.missing_strategy, MissingValueStrategy::ForwardFill);
        assert_eq!(config.export.formats, vec![ExportFormat::Json, ExportFormat::Tabular]);
        assert_eq!(config.paths.raw_dir, PathBuf::from("data/raw"));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result = Config::from_toml("[cleaning]\nmissing_strategy = \"guess\"\n");
        assert!(matches!(result, Err(GaokaoError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = Config::from_toml("[export]\nformats = [\"parquet\"]\n");
        assert!(matches!(result, Err(GaokaoError::InvalidConfiguration(_))));

        let result = Config::from_toml("[export]\nformats = []\n");
        assert!(matches!(result, Err(GaokaoError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(GaokaoError::InvalidConfiguration(_))));
    }
}
