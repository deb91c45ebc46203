use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress on stderr through the log, a short summary at the end.
    Human,
    /// Only the JSON run summary on stdout.
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(result: &RunSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress events to the log.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub fn print_human_summary(summary: &RunSummary) -> io::Result<()> {
    let mut stderr = io::stderr();
    for search in &summary.searches {
        writeln!(
            stderr,
            "{}: {} unique datasets over {} terms",
            search.registry,
            search.accessions.len(),
            search.terms.len()
        )?;
    }
    for analysis in &summary.analyses {
        let label = analysis
            .registry
            .map(|registry| registry.label())
            .unwrap_or("unknown");
        writeln!(
            stderr,
            "{label}: {} requested, {} skipped, {} failed, {} records",
            analysis.requested, analysis.skipped, analysis.failed, analysis.records
        )?;
    }
    if !summary.new_journals.is_empty() {
        writeln!(
            stderr,
            "journals missing from the impact table: {}",
            summary.new_journals.join("; ")
        )?;
    }
    writeln!(stderr, "output written to {}", summary.output_dir)
}
