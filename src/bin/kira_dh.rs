use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kira_dataset_harvester::app::{App, ProgressSink, RunRequest};
use kira_dataset_harvester::arrayexpress::ArrayExpressHttpClient;
use kira_dataset_harvester::config::{ConfigLoader, Overrides, RunMode};
use kira_dataset_harvester::error::KiraError;
use kira_dataset_harvester::geo::GeoHttpClient;
use kira_dataset_harvester::impact::{JournalImpactTable, locate_table};
use kira_dataset_harvester::output::{JsonOutput, LogProgress, OutputMode, print_human_summary};
use kira_dataset_harvester::pubmed::PubmedHttpClient;
use kira_dataset_harvester::sink::OutputLayout;

#[derive(Parser)]
#[command(name = "kira-dh")]
#[command(about = "Harvest GEO and ArrayExpress dataset metadata into one table")]
#[command(version, author)]
struct Cli {
    /// Search terms (searching runs) or an accession list (analyze-only runs).
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(short, long, default_value = "argeos_output")]
    output: PathBuf,

    #[arg(short, long)]
    verbose: bool,

    /// Also write the tagged text rendition of every record.
    #[arg(short = 't', long)]
    text_out: bool,

    /// Keep multi-organism and multi-type datasets on a single row.
    #[arg(short, long)]
    unique: bool,

    /// Maximum characters per chunk of a long cell.
    #[arg(short = 'l', long = "cell-size")]
    cell_size: Option<usize>,

    /// Datasets fetched and resolved together.
    #[arg(short = 'c', long = "chunk-size")]
    chunk_size: Option<usize>,

    #[arg(long, alias = "mode1")]
    search_only: bool,

    #[arg(long, alias = "mode2")]
    analyze_only: bool,

    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV of journal name and impact score.
    #[arg(long)]
    impact_table: Option<PathBuf>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::ConfigConflict(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::ImpactTable(_)
        | KiraError::InvalidSearchTerm(_)
        | KiraError::InvalidAccession(_) => 2,
        KiraError::GeoHttp(_)
        | KiraError::GeoStatus { .. }
        | KiraError::ArrayExpressHttp(_)
        | KiraError::ArrayExpressStatus { .. }
        | KiraError::PubmedHttp(_)
        | KiraError::PubmedStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mode = RunMode::from_flags(cli.search_only, cli.analyze_only)?;
    let overrides = Overrides {
        batch_width: cli.chunk_size,
        cell_width: cli.cell_size,
        unique: cli.unique,
        verbose: cli.verbose,
        impact_table: cli.impact_table.clone(),
    };
    let resolved = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;

    let impact = match locate_table(resolved.impact_table.as_deref()) {
        Some(path) => {
            let table = JournalImpactTable::from_path(&path)?;
            info!(path = %path.display(), journals = table.len(), "impact table loaded");
            table
        }
        None => {
            warn!("no journal impact table found; every journal is unscored");
            JournalImpactTable::empty()
        }
    };

    let output_dir = Utf8PathBuf::from_path_buf(cli.output.clone()).map_err(|path| {
        KiraError::Filesystem(format!("non UTF-8 output path {}", path.display()))
    })?;

    let geo = GeoHttpClient::new(&resolved.eutils_base_url, &resolved.geo_base_url)?;
    let array_express = ArrayExpressHttpClient::new(&resolved.array_express_base_url)?;
    let literature = PubmedHttpClient::new(&resolved.eutils_base_url)?;
    let app = App::new(geo, array_express, literature, resolved.settings.clone(), impact)
        .with_max_search_results(resolved.max_search_results)
        .with_skip_list(resolved.skip_accessions.clone());

    let request = RunRequest {
        mode,
        input: cli.input.clone(),
        layout: OutputLayout::new(output_dir),
        text_output: cli.text_out,
    };

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let progress: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &LogProgress,
    };

    let summary = app.run(&request, progress)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Human => print_human_summary(&summary).into_diagnostic()?,
    }
    Ok(())
}
