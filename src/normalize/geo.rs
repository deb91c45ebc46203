use tracing::debug;

use super::{RecordNormalizer, join_or_none, text_or_none};
use crate::document::{SourceDocument, XmlNode};
use crate::domain::{Accession, Registry};
use crate::error::KiraError;
use crate::record::{Dataset, OrderedSet, PublicationRef, SampleAggregate};

const NCBI_BIOPROJECT: &str = "https://www.ncbi.nlm.nih.gov/bioproject/";
const EBI_BIOPROJECT: &str = "https://www.ebi.ac.uk/ena/browser/view/";

/// Normalizes GEO MINiML family documents.
pub struct GeoNormalizer;

impl RecordNormalizer for GeoNormalizer {
    fn registry(&self) -> Registry {
        Registry::Geo
    }

    fn normalize(&self, doc: &SourceDocument) -> Result<Dataset, KiraError> {
        let requested = doc.accession.as_str();
        let series = doc
            .root
            .find("series")
            .ok_or_else(|| KiraError::malformed(requested, "missing series block"))?;

        let accession_text = series
            .child("accession")
            .map(XmlNode::text)
            .filter(|text| !text.is_empty())
            .or_else(|| series.attr("iid").map(str::trim).map(str::to_string))
            .filter(|text| !text.is_empty())
            .ok_or_else(|| KiraError::malformed(requested, "series block has no accession"))?;
        let accession = Accession::new(Registry::Geo, accession_text);

        let platforms = doc.root.find_all("platform");
        let samples = doc.root.find_all("sample");

        let mut organisms = OrderedSet::new();
        for platform in &platforms {
            if let Some(organism) = platform.find_text("organism") {
                organisms.insert(&organism);
            }
        }
        for sample in &samples {
            for channel in sample.find_all("channel") {
                if let Some(organism) = channel.find_text("organism") {
                    organisms.insert(&organism);
                }
            }
        }

        let mut dataset = Dataset::new(accession);
        dataset.organism = organisms.render();
        dataset.platform = join_or_none(
            platforms
                .iter()
                .filter_map(|platform| platform.find_text("accession")),
        );
        dataset.experiment_type = join_or_none(series.children_named("type").map(XmlNode::text));
        dataset.sample_count = samples.len() as u64;
        dataset.title = text_or_none(series, "title");
        dataset.submission_date = text_or_none(series, "submission-date");
        dataset.summary = text_or_none(series, "summary");
        dataset.overall_design = text_or_none(series, "overall-design");

        for relation in series.children_named("relation") {
            let Some(target) = relation.attr("target").map(str::trim) else {
                continue;
            };
            match relation.attr("type").map(str::to_lowercase).as_deref() {
                Some("bioproject") => {
                    let id = bioproject_id(target);
                    dataset.bioproject_ncbi = Some(format!("{NCBI_BIOPROJECT}{id}"));
                    dataset.bioproject_ebi = Some(format!("{EBI_BIOPROJECT}{id}"));
                }
                Some("sra") => dataset.sra = Some(target.to_string()),
                _ => {}
            }
        }

        let mut seen = OrderedSet::new();
        for pubmed in series.find_all("pubmed-id") {
            let id = pubmed.text();
            if seen.insert(&id) {
                dataset.publications.push(PublicationRef::Pmid(id));
            }
        }

        dataset.samples = aggregate_samples(&samples, &dataset.overall_design);
        debug!(
            accession = %dataset.accession,
            samples = dataset.sample_count,
            publications = dataset.publications.len(),
            "normalized GEO series"
        );
        Ok(dataset)
    }
}

fn bioproject_id(target: &str) -> &str {
    match target.split_once("bioproject/") {
        Some((_, id)) => id.trim_end_matches('/'),
        None => target.rsplit('/').next().unwrap_or(target),
    }
}

fn aggregate_samples(samples: &[&XmlNode], overall_design: &str) -> SampleAggregate {
    let mut aggregate = SampleAggregate::default();
    for sample in samples {
        for channel in sample.find_all("channel") {
            if let Some(cell_type) = cell_type(channel) {
                aggregate.cell_types.insert(&cell_type);
            }
            if let Some(value) = channel.find_text("treatment-protocol") {
                aggregate.treatment_protocols.insert(&value);
            }
            if let Some(value) = channel.find_text("growth-protocol") {
                aggregate.growth_protocols.insert(&value);
            }
            if let Some(value) = channel.find_text("molecule") {
                aggregate.molecule_types.insert(&value);
            }
            if let Some(value) = channel.find_text("extract-protocol") {
                aggregate.extraction_protocols.insert(&value);
            }
            let characteristics = channel
                .children_named("characteristics")
                .filter_map(|item| {
                    let text = item.text();
                    if text.is_empty() {
                        return None;
                    }
                    Some(match item.attr("tag").map(str::trim) {
                        Some(tag) if !tag.is_empty() => format!("{tag}: {text}"),
                        _ => text,
                    })
                })
                .collect::<Vec<_>>();
            aggregate.characteristics.insert(&characteristics.join("; "));
        }
    }

    aggregate.all_protocols = format!(
        "[Overall design] {overall_design}; [Treatment] {}; [Growth] {}; [Extraction] {}; [Cell type] {}; [Characteristics] {}",
        aggregate.treatment_protocols.render(),
        aggregate.growth_protocols.render(),
        aggregate.extraction_protocols.render(),
        aggregate.cell_types.render(),
        aggregate.characteristics.render(),
    );
    aggregate
}

/// `characteristics tag="cell type"`, else the channel source marked as such.
fn cell_type(channel: &XmlNode) -> Option<String> {
    channel
        .children_named("characteristics")
        .find(|item| {
            item.attr("tag")
                .is_some_and(|tag| tag.trim().eq_ignore_ascii_case("cell type"))
        })
        .map(XmlNode::text)
        .filter(|text| !text.is_empty())
        .or_else(|| {
            channel
                .find_text("source")
                .map(|source| format!("Source: {source}"))
        })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn document(xml: &str) -> SourceDocument {
        SourceDocument::parse("GSE100".parse().unwrap(), xml).unwrap()
    }

    const FAMILY: &str = r#"<MINiML>
  <Platform iid="GPL1"><Accession database="GEO">GPL1</Accession><Organism taxid="9606">Homo sapiens</Organism></Platform>
  <Platform iid="GPL2"><Accession database="GEO">GPL2</Accession><Organism taxid="10090">Mus musculus</Organism></Platform>
  <Sample iid="GSM1">
    <Channel position="1">
      <Source>cervix</Source>
      <Organism>Homo sapiens</Organism>
      <Characteristics tag="Cell Type">HeLa</Characteristics>
      <Characteristics tag="age">30</Characteristics>
      <Treatment-Protocol>none</Treatment-Protocol>
      <Molecule>total RNA</Molecule>
      <Extract-Protocol>Trizol</Extract-Protocol>
    </Channel>
  </Sample>
  <Sample iid="GSM2">
    <Channel position="1">
      <Source>liver</Source>
      <Organism>Mus musculus</Organism>
      <Molecule>total RNA</Molecule>
      <Extract-Protocol>Trizol</Extract-Protocol>
    </Channel>
  </Sample>
  <Series iid="GSE100">
    <Status><Submission-Date>2019-03-01</Submission-Date></Status>
    <Accession database="GEO">GSE100</Accession>
    <Title>Two   species</Title>
    <Pubmed-ID>111</Pubmed-ID>
    <Pubmed-ID>222</Pubmed-ID>
    <Summary>Some summary</Summary>
    <Overall-Design>Compare</Overall-Design>
    <Type>Expression profiling by array</Type>
    <Type>Expression profiling by high throughput sequencing</Type>
    <Relation type="BioProject" target="https://www.ncbi.nlm.nih.gov/bioproject/PRJNA1" />
    <Relation type="SRA" target="https://www.ncbi.nlm.nih.gov/sra?term=SRP1" />
  </Series>
</MINiML>"#;

    #[test]
    fn normalizes_series_fields() {
        let dataset = GeoNormalizer.normalize(&document(FAMILY)).unwrap();
        assert_eq!(dataset.accession.as_str(), "GSE100");
        assert_eq!(dataset.organism, "Homo sapiens; Mus musculus");
        assert_eq!(dataset.platform, "GPL1; GPL2");
        assert_eq!(
            dataset.experiment_type,
            "Expression profiling by array; Expression profiling by high throughput sequencing"
        );
        assert_eq!(dataset.sample_count, 2);
        assert_eq!(dataset.title, "Two species");
        assert_eq!(dataset.submission_date, "2019-03-01");
        assert_eq!(
            dataset.bioproject_ebi.as_deref(),
            Some("https://www.ebi.ac.uk/ena/browser/view/PRJNA1")
        );
        assert_eq!(dataset.pmids().collect::<Vec<_>>(), vec!["111", "222"]);
    }

    #[test]
    fn aggregates_samples_with_source_fallback() {
        let dataset = GeoNormalizer.normalize(&document(FAMILY)).unwrap();
        let samples = &dataset.samples;
        assert_eq!(samples.cell_types.render(), "HeLa; Source: liver");
        assert_eq!(samples.molecule_types.render(), "total RNA");
        assert_eq!(samples.growth_protocols.render(), "None");
        assert_eq!(samples.characteristics.render(), "Cell Type: HeLa; age: 30");
        assert!(samples.all_protocols.starts_with("[Overall design] Compare; [Treatment] none;"));
        assert!(samples.all_protocols.ends_with("[Characteristics] Cell Type: HeLa; age: 30"));
    }

    #[test]
    fn missing_fields_become_sentinels() {
        let doc = document("<MINiML><Series><Accession>GSE100</Accession></Series></MINiML>");
        let dataset = GeoNormalizer.normalize(&doc).unwrap();
        assert_eq!(dataset.summary, "None");
        assert_eq!(dataset.organism, "None");
        assert_eq!(dataset.platform, "None");
        assert!(dataset.publications.is_empty());
    }

    #[test]
    fn missing_series_is_malformed() {
        let doc = document("<MINiML><Platform/></MINiML>");
        assert_matches!(
            GeoNormalizer.normalize(&doc),
            Err(KiraError::MalformedDocument { ref accession, .. }) if accession == "GSE100"
        );
    }
}
