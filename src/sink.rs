//! Output files of a run.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{Accession, Registry};
use crate::error::KiraError;
use crate::record::{CanonicalRecord, Dataset, MULTI_VALUE_SEPARATOR, NONE_SENTINEL};

pub const TERM_TABLE: &str = "table_term.tsv";
pub const RECORD_TABLE: &str = "output_argeos.tsv";
pub const RECORD_TEXT: &str = "output_argeos.txt";
pub const ERROR_REPORT: &str = "errors_argeos.txt";

/// File names inside the output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: Utf8PathBuf,
}

impl OutputLayout {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<(), KiraError> {
        fs::create_dir_all(&self.root)
            .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn term_table(&self) -> Utf8PathBuf {
        self.root.join(TERM_TABLE)
    }

    pub fn accession_list(&self, registry: Registry) -> Utf8PathBuf {
        self.root.join(registry.accession_list_name())
    }

    pub fn record_table(&self) -> Utf8PathBuf {
        self.root.join(RECORD_TABLE)
    }

    pub fn record_text(&self) -> Utf8PathBuf {
        self.root.join(RECORD_TEXT)
    }

    pub fn error_report(&self) -> Utf8PathBuf {
        self.root.join(ERROR_REPORT)
    }
}

pub fn create_file(path: &Utf8Path) -> Result<BufWriter<File>, KiraError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|err| KiraError::Filesystem(format!("create {path}: {err}")))
}

fn io_error(err: std::io::Error) -> KiraError {
    KiraError::Filesystem(err.to_string())
}

pub trait RecordSink {
    /// `record` is the finished row; `dataset` carries the fields only text reports show.
    fn write(&mut self, dataset: &Dataset, record: &CanonicalRecord) -> Result<(), KiraError>;

    fn finish(&mut self) -> Result<(), KiraError> {
        Ok(())
    }
}

/// Tab separated table: header row plus one line per record.
pub struct TsvSink<W: Write> {
    writer: W,
}

impl<W: Write> TsvSink<W> {
    pub fn new(mut writer: W) -> Result<Self, KiraError> {
        writeln!(writer, "{}", CanonicalRecord::HEADER.join("\t")).map_err(io_error)?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for TsvSink<W> {
    fn write(&mut self, _dataset: &Dataset, record: &CanonicalRecord) -> Result<(), KiraError> {
        writeln!(self.writer, "{}", record.cells().join("\t")).map_err(io_error)
    }

    fn finish(&mut self) -> Result<(), KiraError> {
        self.writer.flush().map_err(io_error)
    }
}

/// Human readable report: a `#` line, then one tagged line per field.
pub struct TextSink<W: Write> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for TextSink<W> {
    fn write(&mut self, dataset: &Dataset, record: &CanonicalRecord) -> Result<(), KiraError> {
        let identifiers = if dataset.publication.identifiers.is_empty() {
            NONE_SENTINEL.to_string()
        } else {
            dataset.publication.identifiers.join(MULTI_VALUE_SEPARATOR)
        };
        let samples = &dataset.samples;
        let lines = [
            ("GSE", record.accession.clone()),
            ("BPJ", record.bioproject_ncbi.clone()),
            ("SRA", record.sra.clone()),
            ("ORG", record.organism.clone()),
            ("TYP", record.experiment_type.clone()),
            ("SPS", record.samples.clone()),
            ("PLT", record.platform.clone()),
            ("TTL", dataset.title.clone()),
            ("SBD", record.submission_date.clone()),
            ("DOI", record.doi_or_id.clone()),
            ("JUR", record.journal.clone()),
            ("IMP", record.impact.clone()),
            ("PBI", identifiers),
            ("PTL", dataset.publication.title.clone()),
            ("SUM", dataset.summary.clone()),
            ("OVD", dataset.overall_design.clone()),
            ("CLT", samples.cell_types.render()),
            ("TRE", samples.treatment_protocols.render()),
            ("TYM", samples.molecule_types.render()),
            ("GRP", samples.growth_protocols.render()),
        ];
        writeln!(self.writer, "#").map_err(io_error)?;
        for (tag, value) in lines {
            writeln!(self.writer, "{tag}\t{}", single_line(&value)).map_err(io_error)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), KiraError> {
        self.writer.flush().map_err(io_error)
    }
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Forwards every record to each inner sink in order.
#[derive(Default)]
pub struct SinkFanout {
    sinks: Vec<Box<dyn RecordSink>>,
}

impl SinkFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn RecordSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RecordSink for SinkFanout {
    fn write(&mut self, dataset: &Dataset, record: &CanonicalRecord) -> Result<(), KiraError> {
        for sink in &mut self.sinks {
            sink.write(dataset, record)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), KiraError> {
        for sink in &mut self.sinks {
            sink.finish()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermHits {
    pub term: String,
    pub hits: usize,
}

/// Search results of one registry over every term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySearch {
    pub registry: Registry,
    pub terms: Vec<TermHits>,
    pub accessions: Vec<Accession>,
}

impl RegistrySearch {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            terms: Vec::new(),
            accessions: Vec::new(),
        }
    }

    /// Records one term's hits; accessions already seen are not added twice.
    pub fn add(&mut self, term: &str, hits: Vec<Accession>) {
        self.terms.push(TermHits {
            term: term.to_string(),
            hits: hits.len(),
        });
        for accession in hits {
            if !self.accessions.contains(&accession) {
                self.accessions.push(accession);
            }
        }
    }
}

/// Per registry: a header, one row per term, then the unique total.
pub fn write_term_table<W: Write>(
    mut writer: W,
    searches: &[RegistrySearch],
) -> Result<(), KiraError> {
    for search in searches {
        let label = search.registry.label();
        writeln!(writer, "term\tnumber of found datasets ({label})").map_err(io_error)?;
        for row in &search.terms {
            writeln!(writer, "{}\t{}", row.term, row.hits).map_err(io_error)?;
        }
        writeln!(
            writer,
            "TOTAL {label} (UNIQUE)\t{}",
            search.accessions.len()
        )
        .map_err(io_error)?;
    }
    writer.flush().map_err(io_error)
}

pub fn write_accession_list<W: Write>(
    mut writer: W,
    accessions: &[Accession],
) -> Result<(), KiraError> {
    for accession in accessions {
        writeln!(writer, "{accession}").map_err(io_error)?;
    }
    writer.flush().map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new("GSE7".parse().unwrap());
        dataset.organism = "Homo sapiens".to_string();
        dataset.summary = "line one\nline two".to_string();
        dataset
    }

    #[test]
    fn tsv_sink_writes_header_then_rows() {
        let mut dataset = dataset();
        dataset.summary = "flat".to_string();
        let record = CanonicalRecord::from_dataset(&dataset);
        let mut sink = TsvSink::new(Vec::new()).unwrap();
        sink.write(&dataset, &record).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Accession\tOrganism\tSamples"));
        assert!(lines[1].starts_with("GSE7\tHomo sapiens\t0\t"));
    }

    #[test]
    fn text_sink_tags_each_field() {
        let dataset = dataset();
        let record = CanonicalRecord::from_dataset(&dataset);
        let mut sink = TextSink::new(Vec::new());
        sink.write(&dataset, &record).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("#\nGSE\tGSE7\n"));
        assert!(text.contains("SUM\tline one line two\n"));
        assert!(text.contains("PBI\tNone\n"));
        assert_eq!(text.lines().count(), 21);
    }

    #[test]
    fn term_table_counts_unique_accessions() {
        let mut search = RegistrySearch::new(Registry::Geo);
        let a: Accession = "GSE1".parse().unwrap();
        let b: Accession = "GSE2".parse().unwrap();
        search.add("(lung) AND gse[ETYP]", vec![a.clone(), b]);
        search.add("(liver) AND gse[ETYP]", vec![a]);
        let mut out = Vec::new();
        write_term_table(&mut out, &[search]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "term\tnumber of found datasets (GEO)\n(lung) AND gse[ETYP]\t2\n(liver) AND gse[ETYP]\t1\nTOTAL GEO (UNIQUE)\t2\n"
        );
    }
}
