use tracing::debug;

use super::{RecordNormalizer, join_or_none, text_or_none};
use crate::document::{SourceDocument, XmlNode};
use crate::domain::{Accession, Registry};
use crate::error::KiraError;
use crate::record::{Dataset, NONE_SENTINEL, OrderedSet, PublicationRef};

/// Normalizes ArrayExpress v3 experiment documents and their attached protocols.
pub struct ArrayExpressNormalizer;

impl RecordNormalizer for ArrayExpressNormalizer {
    fn registry(&self) -> Registry {
        Registry::ArrayExpress
    }

    fn normalize(&self, doc: &SourceDocument) -> Result<Dataset, KiraError> {
        let requested = doc.accession.as_str();
        let experiment = doc
            .root
            .find("experiment")
            .ok_or_else(|| KiraError::malformed(requested, "missing experiment block"))?;

        let id = experiment
            .child("accession")
            .map(XmlNode::text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| requested.to_string());
        let mut dataset = Dataset::new(Accession::new(Registry::ArrayExpress, id));

        dataset.title = text_or_none(experiment, "name");
        let mut organisms = OrderedSet::new();
        for organism in experiment.children_named("organism") {
            organisms.insert(&organism.text());
        }
        dataset.organism = organisms.render();
        dataset.experiment_type =
            join_or_none(experiment.children_named("experimenttype").map(XmlNode::text));
        dataset.sample_count = sample_count(&doc.root, experiment);
        dataset.submission_date = text_or_none(experiment, "releasedate");
        dataset.summary = experiment
            .child("description")
            .map(|description| {
                description
                    .find_text("text")
                    .unwrap_or_else(|| description.text())
            })
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NONE_SENTINEL.to_string());
        dataset.platform = join_or_none(
            experiment
                .children_named("arraydesign")
                .filter_map(|design| design.find_text("accession")),
        );
        dataset.overall_design =
            join_or_none(experiment.children_named("experimentdesign").map(XmlNode::text));

        for entry in experiment.children_named("bibliography") {
            let Some(title) = entry.find_text("title") else {
                continue;
            };
            dataset.publications.push(PublicationRef::Citation {
                title,
                journal: entry.find_text("publication"),
                doi: entry.find_text("doi"),
            });
        }

        let mut all_protocols = String::new();
        if dataset.overall_design != NONE_SENTINEL {
            dataset
                .samples
                .growth_protocols
                .insert(&dataset.overall_design);
            all_protocols.push_str(&format!("[Growth] {}; ", dataset.overall_design));
        }
        for protocol in &doc.attachments {
            if let Some(line) = protocol_line(protocol) {
                all_protocols.push_str(&line);
            }
        }
        let all_protocols = all_protocols.trim_end();
        dataset.samples.all_protocols = if all_protocols.is_empty() {
            NONE_SENTINEL.to_string()
        } else {
            all_protocols.to_string()
        };

        debug!(
            accession = %dataset.accession,
            protocols = doc.attachments.len(),
            citations = dataset.publications.len(),
            "normalized ArrayExpress experiment"
        );
        Ok(dataset)
    }
}

/// `total-samples` on the envelope, else the experiment's `samples` count.
fn sample_count(root: &XmlNode, experiment: &XmlNode) -> u64 {
    root.find("experiments")
        .and_then(|envelope| envelope.attr("total-samples"))
        .and_then(|value| value.trim().parse().ok())
        .or_else(|| {
            experiment
                .child("samples")
                .and_then(|samples| samples.text().parse().ok())
        })
        .unwrap_or(0)
}

/// `"[<id>] <type>: <text>"; ` for a protocol carrying both a type and a text.
fn protocol_line(document: &XmlNode) -> Option<String> {
    let protocol = document.find("protocol").unwrap_or(document);
    let id = protocol
        .find_text("id")
        .or_else(|| protocol.find_text("accession"))?;
    let kind = protocol.find_text("type")?;
    let text = protocol.find_text("text")?;
    Some(format!("\"[{id}] {kind}: {text}\"; "))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const EXPERIMENT: &str = r#"<experiments version="3.0" total="1" total-samples="12">
  <experiment>
    <id>1</id>
    <accession>E-MTAB-100</accession>
    <name>HeLa time course</name>
    <releasedate>2015-06-01</releasedate>
    <organism>Homo sapiens</organism>
    <experimenttype>RNA-seq of coding RNA</experimenttype>
    <experimentdesign>time series design</experimentdesign>
    <description><id/><text>Cells were sampled hourly.</text></description>
    <bibliography>
      <title>A clock in cells.</title>
      <publication>Cell</publication>
      <doi>10.1/x</doi>
    </bibliography>
    <protocol><id>77</id><accession>P-MTAB-1</accession></protocol>
  </experiment>
</experiments>"#;

    const PROTOCOL: &str = r#"<protocols><protocol><id>77</id><accession>P-MTAB-1</accession>
      <type>nucleic acid extraction protocol</type><text>Qiagen kit</text></protocol></protocols>"#;

    fn document() -> SourceDocument {
        let mut doc = SourceDocument::parse("E-MTAB-100".parse().unwrap(), EXPERIMENT).unwrap();
        doc.attachments.push(XmlNode::parse(PROTOCOL).unwrap());
        doc.attachments
            .push(XmlNode::parse("<protocols><protocol><id>78</id></protocol></protocols>").unwrap());
        doc
    }

    #[test]
    fn normalizes_experiment_fields() {
        let dataset = ArrayExpressNormalizer.normalize(&document()).unwrap();
        assert_eq!(dataset.accession.as_str(), "E-MTAB-100");
        assert_eq!(dataset.title, "HeLa time course");
        assert_eq!(dataset.organism, "Homo sapiens");
        assert_eq!(dataset.sample_count, 12);
        assert_eq!(dataset.summary, "Cells were sampled hourly.");
        assert_eq!(dataset.platform, "None");
        assert_eq!(
            dataset.publications,
            vec![PublicationRef::Citation {
                title: "A clock in cells.".to_string(),
                journal: Some("Cell".to_string()),
                doi: Some("10.1/x".to_string()),
            }]
        );
    }

    #[test]
    fn protocols_feed_the_composite_string() {
        let dataset = ArrayExpressNormalizer.normalize(&document()).unwrap();
        assert_eq!(
            dataset.samples.all_protocols,
            "[Growth] time series design; \"[77] nucleic acid extraction protocol: Qiagen kit\";"
        );
        assert_eq!(dataset.samples.growth_protocols.render(), "time series design");
    }

    #[test]
    fn missing_experiment_is_malformed() {
        let doc = SourceDocument::parse("E-MTAB-9".parse().unwrap(), "<experiments/>").unwrap();
        assert_matches!(
            ArrayExpressNormalizer.normalize(&doc),
            Err(KiraError::MalformedDocument { .. })
        );
    }
}
