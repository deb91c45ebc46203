//! Publication resolution for a batch of datasets.
//!
//! A batch costs at most one title search and one summary lookup against the
//! literature index. Over HTTP a title search is itself an esearch plus an
//! esummary request, so a batch with citations can reach three requests.
//! Each dataset then gets a single "best" publication, the
//! one with the highest journal impact; unscored journals rank at -0.5 and
//! ties keep the earliest reference.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::context::PipelineContext;
use crate::domain::Accession;
use crate::impact::JournalMatch;
use crate::pubmed::{ArticleSummary, LiteratureIndex};
use crate::record::{
    Dataset, ImpactScore, MULTI_VALUE_SEPARATOR, NONE_SENTINEL, OrderedSet, PublicationInfo,
    PublicationRef,
};

/// A reference after title matching.
#[derive(Debug, Clone)]
enum Reference {
    Identifier {
        id: String,
        fallback: Option<LocalCitation>,
    },
    Local(LocalCitation),
}

#[derive(Debug, Clone)]
struct LocalCitation {
    title: String,
    journal: Option<String>,
    doi: Option<String>,
}

#[derive(Debug, Clone)]
struct Candidate {
    journal: String,
    impact: ImpactScore,
    doi_or_id: String,
    title: String,
}

impl Candidate {
    fn reference(&self) -> String {
        format!("{{{} ({}) {}}}", self.journal, self.impact, self.doi_or_id)
    }
}

/// Outcome of the summary lookup for the whole batch.
enum Lookup {
    Found(HashMap<String, ArticleSummary>),
    Failed,
}

pub fn resolve_batch<L: LiteratureIndex + ?Sized>(
    index: &L,
    datasets: &mut [Dataset],
    ctx: &mut PipelineContext,
) {
    let title_ids = search_titles(index, datasets, ctx);
    let references: Vec<Vec<Reference>> = datasets
        .iter()
        .map(|dataset| match_references(dataset, &title_ids))
        .collect();

    let mut identifiers = OrderedSet::new();
    for reference in references.iter().flatten() {
        if let Reference::Identifier { id, .. } = reference {
            identifiers.insert(id);
        }
    }

    let lookup = if identifiers.is_empty() {
        Lookup::Found(HashMap::new())
    } else {
        let ids = identifiers.iter().map(str::to_string).collect::<Vec<_>>();
        match index.summaries(&ids) {
            Ok(found) => {
                debug!(requested = ids.len(), found = found.len(), "literature summaries");
                Lookup::Found(found)
            }
            Err(err) => {
                warn!(error = %err, "literature lookup failed; using local references");
                let degraded = datasets
                    .iter()
                    .zip(&references)
                    .filter(|(_, refs)| {
                        refs.iter()
                            .any(|reference| matches!(reference, Reference::Identifier { .. }))
                    })
                    .map(|(dataset, _)| &dataset.accession);
                ctx.report.lookup_failure(degraded, err.to_string());
                Lookup::Failed
            }
        }
    };

    for (dataset, references) in datasets.iter_mut().zip(references) {
        dataset.publication = resolve_dataset(&dataset.accession, &references, &lookup, ctx);
        if ctx.settings.verbose {
            let chosen = &dataset.publication;
            info!(
                accession = %dataset.accession,
                journal = %chosen.journal,
                impact = %chosen.impact,
                "publication chosen"
            );
        }
    }
}

fn search_titles<L: LiteratureIndex + ?Sized>(
    index: &L,
    datasets: &[Dataset],
    ctx: &mut PipelineContext,
) -> HashMap<String, String> {
    let mut titles = OrderedSet::new();
    for dataset in datasets {
        for title in dataset.citation_titles() {
            titles.insert(title);
        }
    }
    if titles.is_empty() {
        return HashMap::new();
    }
    let titles = titles.iter().map(str::to_string).collect::<Vec<_>>();
    match index.search_titles(&titles) {
        Ok(found) => {
            debug!(requested = titles.len(), matched = found.len(), "literature title search");
            found
        }
        Err(err) => {
            warn!(error = %err, "literature title search failed");
            let degraded = datasets
                .iter()
                .filter(|dataset| dataset.citation_titles().next().is_some())
                .map(|dataset| &dataset.accession);
            ctx.report.lookup_failure(degraded, err.to_string());
            HashMap::new()
        }
    }
}

fn match_references(dataset: &Dataset, title_ids: &HashMap<String, String>) -> Vec<Reference> {
    let mut seen = OrderedSet::new();
    let mut out = Vec::new();
    for publication in &dataset.publications {
        let reference = match publication {
            PublicationRef::Pmid(id) => Reference::Identifier {
                id: id.clone(),
                fallback: None,
            },
            PublicationRef::Citation {
                title,
                journal,
                doi,
            } => {
                let local = LocalCitation {
                    title: title.clone(),
                    journal: journal.clone(),
                    doi: doi.clone(),
                };
                match title_ids.get(title.trim()) {
                    Some(id) => Reference::Identifier {
                        id: id.clone(),
                        fallback: Some(local),
                    },
                    None => Reference::Local(local),
                }
            }
        };
        if let Reference::Identifier { id, .. } = &reference {
            if !seen.insert(id) {
                continue;
            }
        }
        out.push(reference);
    }
    out
}

fn resolve_dataset(
    accession: &Accession,
    references: &[Reference],
    lookup: &Lookup,
    ctx: &mut PipelineContext,
) -> PublicationInfo {
    if references.is_empty() {
        return PublicationInfo::none();
    }

    let candidates = references
        .iter()
        .map(|reference| candidate_for(accession, reference, lookup, ctx))
        .collect::<Vec<_>>();

    let mut best = 0;
    for (idx, candidate) in candidates.iter().enumerate().skip(1) {
        if candidate.impact.rank() > candidates[best].impact.rank() {
            best = idx;
        }
    }
    let chosen = &candidates[best];

    PublicationInfo {
        journal: chosen.journal.clone(),
        doi_or_id: chosen.doi_or_id.clone(),
        impact: chosen.impact,
        title: chosen.title.clone(),
        identifiers: references
            .iter()
            .filter_map(|reference| match reference {
                Reference::Identifier { id, .. } => Some(id.clone()),
                Reference::Local(_) => None,
            })
            .collect(),
        all_references: candidates
            .iter()
            .map(Candidate::reference)
            .collect::<Vec<_>>()
            .join(MULTI_VALUE_SEPARATOR),
    }
}

fn candidate_for(
    accession: &Accession,
    reference: &Reference,
    lookup: &Lookup,
    ctx: &mut PipelineContext,
) -> Candidate {
    match reference {
        Reference::Local(local) => local_candidate(local, ctx),
        Reference::Identifier { id, fallback } => {
            let summary = match lookup {
                Lookup::Found(found) => found.get(id),
                Lookup::Failed => None,
            };
            match (summary, fallback) {
                (Some(summary), _) => summary_candidate(summary, ctx),
                (None, Some(local)) => local_candidate(local, ctx),
                (None, None) => {
                    if let Lookup::Found(_) = lookup {
                        ctx.report.lookup_miss(accession, id);
                    }
                    Candidate {
                        journal: NONE_SENTINEL.to_string(),
                        impact: ImpactScore::Unscored,
                        doi_or_id: format!("pubmed_id = {id}"),
                        title: NONE_SENTINEL.to_string(),
                    }
                }
            }
        }
    }
}

fn summary_candidate(summary: &ArticleSummary, ctx: &mut PipelineContext) -> Candidate {
    let journal = if summary.journal.is_empty() {
        summary.source.clone()
    } else {
        summary.journal.clone()
    };
    let source = Some(summary.source.as_str()).filter(|source| !source.is_empty());
    Candidate {
        impact: score_journal(&journal, source, ctx),
        journal: or_none(journal),
        doi_or_id: match &summary.doi {
            Some(doi) => doi_link(doi),
            None => format!("pubmed_id = {}", summary.id),
        },
        title: or_none(summary.title.clone()),
    }
}

fn local_candidate(local: &LocalCitation, ctx: &mut PipelineContext) -> Candidate {
    let journal = local.journal.clone().unwrap_or_default();
    Candidate {
        impact: score_journal(&journal, None, ctx),
        journal: or_none(journal),
        doi_or_id: local
            .doi
            .as_deref()
            .map(doi_link)
            .unwrap_or_else(|| NONE_SENTINEL.to_string()),
        title: or_none(local.title.clone()),
    }
}

fn score_journal(
    journal: &str,
    abbreviation: Option<&str>,
    ctx: &mut PipelineContext,
) -> ImpactScore {
    if journal.trim().is_empty() {
        return ImpactScore::Unscored;
    }
    let matched = ctx.impact.score(journal, abbreviation);
    if matched == JournalMatch::Unknown && ctx.report.new_journal(journal) {
        debug!(journal, "journal missing from impact table");
    }
    matched.score()
}

fn doi_link(doi: &str) -> String {
    let doi = doi.trim();
    if doi.starts_with("http://") || doi.starts_with("https://") {
        doi.to_string()
    } else {
        format!("https://doi.org/{doi}")
    }
}

fn or_none(value: String) -> String {
    if value.trim().is_empty() {
        NONE_SENTINEL.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doi_links_are_not_doubled() {
        assert_eq!(doi_link("10.1/x"), "https://doi.org/10.1/x");
        assert_eq!(doi_link("https://doi.org/10.1/x"), "https://doi.org/10.1/x");
    }

    #[test]
    fn references_render_journal_impact_and_link() {
        let candidate = Candidate {
            journal: "Cell".to_string(),
            impact: ImpactScore::Scored(14.2),
            doi_or_id: "https://doi.org/10.1/x".to_string(),
            title: "T".to_string(),
        };
        assert_eq!(candidate.reference(), "{Cell (14.2) https://doi.org/10.1/x}");
    }
}
