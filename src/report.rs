//! Append-only error and data-quality channel of one run.

use std::collections::HashSet;
use std::io::Write;

use serde::Serialize;
use tracing::warn;

use crate::domain::Accession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEntry {
    /// Raw document unavailable or malformed; the dataset was skipped.
    SourceFailure { accession: String, reason: String },
    /// Literature index has no entry for an identifier.
    LookupMiss { accession: String, identifier: String },
    /// A literature-index call failed; the listed datasets fell back to local data.
    LookupFailure {
        accessions: Vec<String>,
        reason: String,
    },
    /// A line of an accession list that names no known registry.
    InvalidAccession { line: String },
    /// A finished record could not be written.
    SkippedRecord { reason: String },
    /// Journal name absent from the impact table under every variant.
    NewJournal { name: String },
}

impl ReportEntry {
    pub fn line(&self) -> String {
        match self {
            ReportEntry::SourceFailure { accession, reason } => {
                format!("error was (bad document) {accession}: {reason}")
            }
            ReportEntry::LookupMiss {
                accession,
                identifier,
            } => format!("no literature entry for {identifier} ({accession})"),
            ReportEntry::LookupFailure { accessions, reason } => format!(
                "literature lookup failed for {}: {reason}",
                accessions.join(", ")
            ),
            ReportEntry::InvalidAccession { line } => format!("invalid accession skipped: {line}"),
            ReportEntry::SkippedRecord { reason } => format!("skipped record: {reason}"),
            ReportEntry::NewJournal { name } => format!("new journal: {name}"),
        }
    }
}

/// Collects report entries in memory and mirrors each one to an optional writer.
#[derive(Default)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
    seen_journals: HashSet<String>,
    writer: Option<Box<dyn Write>>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        Self {
            writer: Some(writer),
            ..Self::default()
        }
    }

    pub fn source_failure(&mut self, accession: &Accession, reason: impl Into<String>) {
        self.push(ReportEntry::SourceFailure {
            accession: accession.as_str().to_string(),
            reason: reason.into(),
        });
    }

    pub fn lookup_miss(&mut self, accession: &Accession, identifier: &str) {
        self.push(ReportEntry::LookupMiss {
            accession: accession.as_str().to_string(),
            identifier: identifier.to_string(),
        });
    }

    pub fn lookup_failure<'a>(
        &mut self,
        accessions: impl IntoIterator<Item = &'a Accession>,
        reason: impl Into<String>,
    ) {
        self.push(ReportEntry::LookupFailure {
            accessions: accessions
                .into_iter()
                .map(|accession| accession.as_str().to_string())
                .collect(),
            reason: reason.into(),
        });
    }

    pub fn invalid_accession(&mut self, line: &str) {
        self.push(ReportEntry::InvalidAccession {
            line: line.to_string(),
        });
    }

    pub fn skipped_record(&mut self, reason: impl Into<String>) {
        self.push(ReportEntry::SkippedRecord {
            reason: reason.into(),
        });
    }

    /// Records a journal the first time it is seen in this run.
    pub fn new_journal(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || !self.seen_journals.insert(name.to_lowercase()) {
            return false;
        }
        self.push(ReportEntry::NewJournal {
            name: name.to_string(),
        });
        true
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn new_journals(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ReportEntry::NewJournal { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count_where(&self, predicate: impl Fn(&ReportEntry) -> bool) -> usize {
        self.entries.iter().filter(|entry| predicate(entry)).count()
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(err) = writer.flush() {
                warn!(error = %err, "failed to flush error report");
            }
        }
    }

    fn push(&mut self, entry: ReportEntry) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(err) = writeln!(writer, "{}", entry.line()) {
                warn!(error = %err, "failed to write error report line");
            }
        }
        self.entries.push(entry);
    }
}
