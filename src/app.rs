use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::arrayexpress::{self, ArrayExpressClient};
use crate::config::{DEFAULT_MAX_SEARCH_RESULTS, RunMode};
use crate::context::{PipelineContext, PipelineSettings};
use crate::document::SourceDocument;
use crate::domain::{Accession, Registry, parse_accession_list};
use crate::error::KiraError;
use crate::expand::expand_all;
use crate::geo::GeoClient;
use crate::impact::JournalImpactTable;
use crate::normalize::normalizer_for;
use crate::pubmed::LiteratureIndex;
use crate::report::RunReport;
use crate::resolver::resolve_batch;
use crate::sink::{
    OutputLayout, RecordSink, RegistrySearch, SinkFanout, TextSink, TsvSink, create_file,
    write_accession_list, write_term_table,
};
use crate::term::{self, CompiledQuery};

pub const DEFAULT_TERMS_FILE: &str = "input_terms.txt";

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(progress: &dyn ProgressSink, message: String, elapsed: Option<Duration>) {
    progress.event(ProgressEvent { message, elapsed });
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: RunMode,
    /// Search terms for searching runs; an accession list for analyze-only runs.
    pub input: Option<PathBuf>,
    pub layout: OutputLayout,
    pub text_output: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryAnalysis {
    pub registry: Option<Registry>,
    pub requested: usize,
    pub skipped: usize,
    pub failed: usize,
    pub datasets: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub mode: RunMode,
    pub output_dir: String,
    pub searches: Vec<RegistrySearch>,
    pub analyses: Vec<RegistryAnalysis>,
    pub records_written: usize,
    pub new_journals: Vec<String>,
    pub report_lines: usize,
}

pub struct App<G: GeoClient, A: ArrayExpressClient, L: LiteratureIndex> {
    geo: G,
    array_express: A,
    literature: L,
    settings: PipelineSettings,
    impact: JournalImpactTable,
    max_search_results: usize,
    skip: BTreeSet<String>,
}

impl<G: GeoClient, A: ArrayExpressClient, L: LiteratureIndex> App<G, A, L> {
    pub fn new(
        geo: G,
        array_express: A,
        literature: L,
        settings: PipelineSettings,
        impact: JournalImpactTable,
    ) -> Self {
        Self {
            geo,
            array_express,
            literature,
            settings,
            impact,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            skip: BTreeSet::new(),
        }
    }

    pub fn with_max_search_results(mut self, max: usize) -> Self {
        self.max_search_results = max;
        self
    }

    /// Accessions that are never fetched.
    pub fn with_skip_list(mut self, skip: BTreeSet<String>) -> Self {
        self.skip = skip;
        self
    }

    pub fn run(
        &self,
        request: &RunRequest,
        progress: &dyn ProgressSink,
    ) -> Result<RunSummary, KiraError> {
        let started_at = Utc::now();
        let layout = &request.layout;
        layout.ensure()?;

        let mut searches = Vec::new();
        if request.mode.searches() {
            let terms_path = request
                .input
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TERMS_FILE));
            let terms = term::read_terms(&terms_path)?;
            searches = self.search(&terms, progress)?;
            write_term_table(create_file(&layout.term_table())?, &searches)?;
            for search in &searches {
                write_accession_list(
                    create_file(&layout.accession_list(search.registry))?,
                    &search.accessions,
                )?;
            }
        }

        let mut analyses = Vec::new();
        let mut records_written = 0;
        let mut new_journals = Vec::new();
        let mut report_lines = 0;
        if request.mode.analyzes() {
            let mut report = RunReport::with_writer(Box::new(create_file(&layout.error_report())?));
            let (geo, array_express) = if request.mode.searches() {
                split_searches(&searches)
            } else {
                load_accessions(request, &mut report)?
            };

            let mut ctx = PipelineContext::new(self.settings.clone(), self.impact.clone(), report);
            let mut sinks = SinkFanout::new();
            sinks.push(Box::new(TsvSink::new(create_file(&layout.record_table())?)?));
            if request.text_output {
                sinks.push(Box::new(TextSink::new(create_file(&layout.record_text())?)));
            }

            let mut aggregator = Aggregator::new(ctx.settings.cell_width);
            analyses = self.analyze(
                &geo,
                &array_express,
                &mut ctx,
                &mut sinks,
                &mut aggregator,
                progress,
            )?;
            sinks.finish()?;
            ctx.report.flush();

            records_written = aggregator.written();
            new_journals = ctx
                .report
                .new_journals()
                .into_iter()
                .map(str::to_string)
                .collect();
            report_lines = ctx.report.entries().len();
        }

        let finished_at = Utc::now();
        info!(
            records = records_written,
            report_lines,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "run finished"
        );
        Ok(RunSummary {
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            mode: request.mode,
            output_dir: layout.root().to_string(),
            searches,
            analyses,
            records_written,
            new_journals,
            report_lines,
        })
    }

    /// Runs every term against both registries, GEO first.
    pub fn search(
        &self,
        terms: &[String],
        progress: &dyn ProgressSink,
    ) -> Result<Vec<RegistrySearch>, KiraError> {
        let queries = terms
            .iter()
            .map(|phrase| term::compile(phrase))
            .collect::<Result<Vec<CompiledQuery>, KiraError>>()?;

        let mut geo = RegistrySearch::new(Registry::Geo);
        for query in &queries {
            let start = Instant::now();
            let hits = self.geo.search(&query.geo, self.max_search_results)?;
            emit(
                progress,
                format!("phase=Search; GEO {} hits={}", query.phrase, hits.len()),
                Some(start.elapsed()),
            );
            geo.add(&query.geo, hits);
        }

        let mut array_express = RegistrySearch::new(Registry::ArrayExpress);
        for query in &queries {
            let start = Instant::now();
            let hits = self.array_express.search(&query.array_express)?;
            emit(
                progress,
                format!("phase=Search; ArrayExpress {} hits={}", query.phrase, hits.len()),
                Some(start.elapsed()),
            );
            array_express.add(&query.array_express.display(), hits);
        }
        Ok(vec![geo, array_express])
    }

    /// Fetch, normalize, resolve, expand and write both registries in batches.
    pub fn analyze(
        &self,
        geo: &[Accession],
        array_express: &[Accession],
        ctx: &mut PipelineContext,
        sink: &mut dyn RecordSink,
        aggregator: &mut Aggregator,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<RegistryAnalysis>, KiraError> {
        let mut analyses = Vec::new();
        let registries = [(Registry::Geo, geo), (Registry::ArrayExpress, array_express)];
        for (registry, accessions) in registries {
            let analysis =
                self.analyze_registry(registry, accessions, ctx, sink, aggregator, progress)?;
            analyses.push(analysis);
        }
        Ok(analyses)
    }

    fn analyze_registry(
        &self,
        registry: Registry,
        accessions: &[Accession],
        ctx: &mut PipelineContext,
        sink: &mut dyn RecordSink,
        aggregator: &mut Aggregator,
        progress: &dyn ProgressSink,
    ) -> Result<RegistryAnalysis, KiraError> {
        let mut analysis = RegistryAnalysis {
            registry: Some(registry),
            requested: accessions.len(),
            ..RegistryAnalysis::default()
        };
        let pending = accessions
            .iter()
            .filter(|accession| {
                let skipped = self.skip.contains(accession.as_str());
                if skipped {
                    info!(%accession, "accession is on the skip list");
                }
                !skipped
            })
            .collect::<Vec<_>>();
        analysis.skipped = accessions.len() - pending.len();

        let normalizer = normalizer_for(registry);
        let batch_width = ctx.settings.batch_width.max(1);
        let batch_count = pending.len().div_ceil(batch_width);
        let written_before = aggregator.written();

        for (idx, batch) in pending.chunks(batch_width).enumerate() {
            let start = Instant::now();
            emit(
                progress,
                format!("phase=Fetch; {} batch {}/{}", registry, idx + 1, batch_count),
                None,
            );

            let mut datasets = Vec::new();
            for accession in batch {
                let fetched = Instant::now();
                let outcome = self
                    .fetch(accession)
                    .and_then(|doc| normalizer.normalize(&doc));
                let status = match outcome {
                    Ok(dataset) => {
                        datasets.push(dataset);
                        "ok"
                    }
                    Err(err) if err.is_record_level() => {
                        warn!(%accession, error = %err, "dataset skipped");
                        ctx.report.source_failure(accession, err.to_string());
                        analysis.failed += 1;
                        "failed"
                    }
                    Err(err) => return Err(err),
                };
                if ctx.settings.verbose {
                    emit(
                        progress,
                        format!("phase=Fetch; {accession} {status}"),
                        Some(fetched.elapsed()),
                    );
                }
            }
            analysis.datasets += datasets.len();

            emit(
                progress,
                format!("phase=Resolve; {} datasets={}", registry, datasets.len()),
                None,
            );
            resolve_batch(&self.literature, &mut datasets, ctx);

            let rows = expand_all(datasets, ctx.settings.split);
            aggregator.push_all(&rows, sink, &mut ctx.report)?;
            emit(
                progress,
                format!("phase=Write; {} rows={}", registry, rows.len()),
                Some(start.elapsed()),
            );
        }

        analysis.records = aggregator.written() - written_before;
        Ok(analysis)
    }

    fn fetch(&self, accession: &Accession) -> Result<SourceDocument, KiraError> {
        match accession.registry() {
            Registry::Geo => {
                let xml = self.geo.fetch_family(accession)?;
                SourceDocument::parse(accession.clone(), &xml)
            }
            Registry::ArrayExpress => arrayexpress::fetch_document(&self.array_express, accession),
        }
    }
}

fn split_searches(searches: &[RegistrySearch]) -> (Vec<Accession>, Vec<Accession>) {
    let collect = |registry: Registry| {
        searches
            .iter()
            .filter(|search| search.registry == registry)
            .flat_map(|search| search.accessions.iter().cloned())
            .collect::<Vec<_>>()
    };
    (collect(Registry::Geo), collect(Registry::ArrayExpress))
}

/// An explicit list may mix registries; otherwise both lists of an earlier search are read.
/// Lines that are not accessions go to the report and are skipped.
fn load_accessions(
    request: &RunRequest,
    report: &mut RunReport,
) -> Result<(Vec<Accession>, Vec<Accession>), KiraError> {
    let mut geo = Vec::new();
    let mut array_express = Vec::new();
    let sources: Vec<PathBuf> = match &request.input {
        Some(path) => vec![path.clone()],
        None => [Registry::Geo, Registry::ArrayExpress]
            .into_iter()
            .map(|registry| request.layout.accession_list(registry).into_std_path_buf())
            .filter(|path| {
                let exists = path.exists();
                if !exists {
                    warn!(path = %path.display(), "accession list not found");
                }
                exists
            })
            .collect(),
    };
    if sources.is_empty() {
        return Err(KiraError::Filesystem(format!(
            "no accession lists in {}; run a search first",
            request.layout.root()
        )));
    }
    for path in sources {
        for parsed in read_accessions(&path)? {
            let accession = match parsed {
                Ok(accession) => accession,
                Err(KiraError::InvalidAccession(line)) => {
                    warn!(path = %path.display(), line = %line, "invalid accession skipped");
                    report.invalid_accession(&line);
                    continue;
                }
                Err(err) => return Err(err),
            };
            let bucket = match accession.registry() {
                Registry::Geo => &mut geo,
                Registry::ArrayExpress => &mut array_express,
            };
            if !bucket.contains(&accession) {
                bucket.push(accession);
            }
        }
    }
    Ok((geo, array_express))
}

fn read_accessions(path: &Path) -> Result<Vec<Result<Accession, KiraError>>, KiraError> {
    let content = fs::read_to_string(path)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
    Ok(parse_accession_list(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_results_split_by_registry() {
        let mut geo = RegistrySearch::new(Registry::Geo);
        geo.add("(a) AND gse[ETYP]", vec!["GSE1".parse().unwrap()]);
        let mut ae = RegistrySearch::new(Registry::ArrayExpress);
        ae.add("(a)", vec!["E-MTAB-1".parse().unwrap()]);
        let (geo_ids, ae_ids) = split_searches(&[geo, ae]);
        assert_eq!(geo_ids.len(), 1);
        assert_eq!(ae_ids[0].as_str(), "E-MTAB-1");
    }
}
