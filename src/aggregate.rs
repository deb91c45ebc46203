//! Turns resolved datasets into sink rows.

use tracing::{debug, warn};

use crate::error::KiraError;
use crate::record::{CanonicalRecord, Dataset};
use crate::report::RunReport;
use crate::sink::RecordSink;

/// Limits below this are treated as "no limit".
pub const MIN_CELL_WIDTH: usize = 10;

/// Replaces every run of tabs and line breaks with one space.
pub fn sanitize_cell(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_break = false;
    for ch in value.chars() {
        if matches!(ch, '\t' | '\n' | '\r') {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out
}

/// Cuts `value` every `limit` characters and joins the pieces with tabs.
pub fn wrap_cell(value: &str, limit: usize) -> String {
    if limit < MIN_CELL_WIDTH || value.chars().count() <= limit {
        return value.to_string();
    }
    let chars = value.chars().collect::<Vec<_>>();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\t")
}

/// Row for `dataset` with single-line cells and wrapped free text.
pub fn to_record(dataset: &Dataset, cell_width: usize) -> CanonicalRecord {
    let mut record = CanonicalRecord::from_dataset(dataset);
    for cell in record.cells_mut() {
        *cell = sanitize_cell(cell);
    }
    for cell in [
        &mut record.title,
        &mut record.summary,
        &mut record.paper_title,
        &mut record.all_references,
        &mut record.all_protocols,
    ] {
        *cell = wrap_cell(cell, cell_width);
    }
    record
}

/// Writes records in arrival order and counts what went where.
pub struct Aggregator {
    cell_width: usize,
    written: usize,
    skipped: usize,
}

impl Aggregator {
    pub fn new(cell_width: usize) -> Self {
        Self {
            cell_width,
            written: 0,
            skipped: 0,
        }
    }

    pub fn push(
        &mut self,
        dataset: &Dataset,
        sink: &mut dyn RecordSink,
        report: &mut RunReport,
    ) -> Result<(), KiraError> {
        if dataset.accession.is_empty() {
            warn!("skipping record without accession");
            report.skipped_record(format!("record without accession (title: {})", dataset.title));
            self.skipped += 1;
            return Ok(());
        }
        let record = to_record(dataset, self.cell_width);
        sink.write(dataset, &record)?;
        debug!(accession = %dataset.accession, "record written");
        self.written += 1;
        Ok(())
    }

    pub fn push_all(
        &mut self,
        datasets: &[Dataset],
        sink: &mut dyn RecordSink,
        report: &mut RunReport,
    ) -> Result<(), KiraError> {
        for dataset in datasets {
            self.push(dataset, sink, report)?;
        }
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
