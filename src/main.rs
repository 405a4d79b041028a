use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use gaokao_collector::app::collect_use_case::{CollectUseCase, PipelineInputs};
use gaokao_collector::app::ports::{PortalHarvestPort, RecordSourcePort};
use gaokao_collector::config::Config;
use gaokao_collector::domain::DataSource;
use gaokao_collector::infra::file_source::{FileRecordSource, PortalHarvestFile};
use gaokao_collector::logging;
use gaokao_collector::pipeline::batch::{Batch, Dataset};
use gaokao_collector::pipeline::export::ExportFormat;
use gaokao_collector::pipeline::processing::missing::MissingValueStrategy;
use gaokao_collector::pipeline::processing::quality_gate::validate;
use gaokao_collector::pipeline::rules::extract_rules;

#[derive(Parser)]
#[command(name = "gaokao_collector")]
#[command(about = "Clean, merge and validate university admission statistics")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, merge and export every collected source
    Run {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Portal harvest (JSON)
        #[arg(long)]
        portal: Option<PathBuf>,
        /// Provincial examination authority rows (JSON or CSV); repeatable
        #[arg(long)]
        provincial: Vec<PathBuf>,
        /// Third-party dataset rows (JSON or CSV); repeatable
        #[arg(long = "third-party")]
        third_party: Vec<PathBuf>,
        /// Missing-value strategy: mark_na, interpolate, drop or forward_fill
        #[arg(long)]
        strategy: Option<MissingValueStrategy>,
        /// Dataset formats, comma-separated: json, csv, tabular
        #[arg(long, value_delimiter = ',')]
        formats: Vec<ExportFormat>,
        #[arg(long)]
        raw_dir: Option<PathBuf>,
        #[arg(long)]
        cleaned_dir: Option<PathBuf>,
        #[arg(long)]
        final_dir: Option<PathBuf>,
    },
    /// Validate a dataset file as-is, without merging, and print the report
    Validate {
        #[arg(long)]
        input: PathBuf,
    },
    /// Split an admission-rule document into its sections and print them as JSON
    ExtractRules {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            portal,
            provincial,
            third_party,
            strategy,
            formats,
            raw_dir,
            cleaned_dir,
            final_dir,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path).with_context(|| format!("loading {}", path.display()))?,
                None => Config::default(),
            };
            if let Some(strategy) = strategy {
                config.cleaning.missing_strategy = strategy;
            }
            if !formats.is_empty() {
                config.export.formats = formats;
            }
            if let Some(dir) = raw_dir {
                config.paths.raw_dir = dir;
            }
            if let Some(dir) = cleaned_dir {
                config.paths.cleaned_dir = dir;
            }
            if let Some(dir) = final_dir {
                config.paths.final_dir = dir;
            }

            let _guard = logging::init_logging(&config.paths.log_dir);
            println!("🚀 Running admission data pipeline...");

            let mut sources: Vec<Box<dyn RecordSourcePort>> = Vec::new();
            for path in provincial {
                sources.push(Box::new(FileRecordSource::new(DataSource::Provincial, path)));
            }
            for path in third_party {
                sources.push(Box::new(FileRecordSource::new(DataSource::ThirdParty, path)));
            }
            let inputs = PipelineInputs {
                portal: portal.map(|path| Box::new(PortalHarvestFile::new(path)) as Box<dyn PortalHarvestPort>),
                sources,
            };

            let summary = CollectUseCase::new(config).run(inputs).context("pipeline run failed")?;

            println!("\n📊 Pipeline Results:");
            println!("   Records: {}", summary.records);
            println!(
                "   Sources merged: {}",
                summary.sources_merged.iter().map(|s| s.id()).collect::<Vec<_>>().join(", ")
            );
            println!("   Rows rejected: {}", summary.rows_rejected);
            println!("   Rows dropped: {}", summary.rows_dropped);
            println!("   Catalog entries rejected: {}", summary.catalog_entries_rejected);
            println!("   Out-of-scope rows: {}", summary.out_of_scope_rows);
            println!("   Invalid scores: {}", summary.validation.invalid_scores);
            println!("   Invalid years: {}", summary.validation.invalid_years);
            println!("   Duplicate keys: {}", summary.validation.duplicates);
            for file in &summary.files_written {
                println!("   Output file: {}", file.display());
            }
            if !summary.skipped_sources.is_empty() {
                println!("\n⚠️  Skipped sources:");
                for skipped in &summary.skipped_sources {
                    println!("   - {}: {}", skipped.source.id(), skipped.reason);
                }
            }
        }
        Commands::Validate { input } => {
            let _guard = logging::init_logging(&Config::default().paths.log_dir);
            let values = FileRecordSource::new(DataSource::ThirdParty, &input)
                .load()
                .with_context(|| format!("reading {}", input.display()))?;
            let (batch, rejected) = Batch::from_values(&values);
            if !rejected.is_empty() {
                warn!("{} rows of {} could not be parsed", rejected.len(), input.display());
            }

            let report = validate(&Dataset::from_batch(batch, DataSource::ThirdParty));
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                info!("Dataset has quality findings");
            }
        }
        Commands::ExtractRules { input } => {
            let _guard = logging::init_logging(&Config::default().paths.log_dir);
            let text = fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let rules = extract_rules(&text);
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
    }

    Ok(())
}
