use std::fmt;

use serde::Serialize;

use crate::domain::Accession;

/// Rendered in place of any value the sources did not provide.
pub const NONE_SENTINEL: &str = "None";

/// Separator of multi-valued fields until the expander splits them.
pub const MULTI_VALUE_SEPARATOR: &str = "; ";

/// Insertion-ordered set of strings; rendering an empty set yields `"None"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderedSet(Vec<String>);

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a trimmed, non-empty value unless it is already present.
    pub fn insert(&mut self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || self.0.iter().any(|existing| existing == value) {
            return false;
        }
        self.0.push(value.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn joined(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join(MULTI_VALUE_SEPARATOR))
        }
    }

    pub fn render(&self) -> String {
        self.joined().unwrap_or_else(|| NONE_SENTINEL.to_string())
    }
}

impl<'a> FromIterator<&'a str> for OrderedSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// Values aggregated over every sample of one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleAggregate {
    pub cell_types: OrderedSet,
    pub treatment_protocols: OrderedSet,
    pub growth_protocols: OrderedSet,
    pub extraction_protocols: OrderedSet,
    pub molecule_types: OrderedSet,
    pub characteristics: OrderedSet,
    pub all_protocols: String,
}

/// A publication attached to a dataset before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublicationRef {
    /// Literature-index identifier (PubMed id).
    Pmid(String),
    /// Bibliography entry that only carries a title and maybe journal and DOI.
    Citation {
        title: String,
        journal: Option<String>,
        doi: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ImpactScore {
    Scored(f64),
    Unscored,
}

impl ImpactScore {
    /// Ranking key: unscored sorts below every numeric score.
    pub fn rank(&self) -> f64 {
        match self {
            ImpactScore::Scored(value) => *value,
            ImpactScore::Unscored => -0.5,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            ImpactScore::Scored(value) => Some(*value),
            ImpactScore::Unscored => None,
        }
    }
}

impl fmt::Display for ImpactScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactScore::Scored(value) => write!(f, "{value}"),
            ImpactScore::Unscored => write!(f, "{NONE_SENTINEL}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicationInfo {
    pub journal: String,
    pub doi_or_id: String,
    pub impact: ImpactScore,
    pub title: String,
    pub identifiers: Vec<String>,
    pub all_references: String,
}

impl PublicationInfo {
    pub fn none() -> Self {
        Self {
            journal: NONE_SENTINEL.to_string(),
            doi_or_id: NONE_SENTINEL.to_string(),
            impact: ImpactScore::Unscored,
            title: NONE_SENTINEL.to_string(),
            identifiers: Vec::new(),
            all_references: NONE_SENTINEL.to_string(),
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Self::none()
    }
}

impl Default for PublicationInfo {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub accession: Accession,
    pub organism: String,
    pub experiment_type: String,
    pub sample_count: u64,
    pub platform: String,
    pub title: String,
    pub submission_date: String,
    pub summary: String,
    pub overall_design: String,
    pub bioproject_ncbi: Option<String>,
    pub bioproject_ebi: Option<String>,
    pub sra: Option<String>,
    pub publications: Vec<PublicationRef>,
    pub samples: SampleAggregate,
    pub publication: PublicationInfo,
}

impl Dataset {
    /// A dataset with every descriptive field at the `"None"` sentinel.
    pub fn new(accession: Accession) -> Self {
        Self {
            accession,
            organism: NONE_SENTINEL.to_string(),
            experiment_type: NONE_SENTINEL.to_string(),
            sample_count: 0,
            platform: NONE_SENTINEL.to_string(),
            title: NONE_SENTINEL.to_string(),
            submission_date: NONE_SENTINEL.to_string(),
            summary: NONE_SENTINEL.to_string(),
            overall_design: NONE_SENTINEL.to_string(),
            bioproject_ncbi: None,
            bioproject_ebi: None,
            sra: None,
            publications: Vec::new(),
            samples: SampleAggregate::default(),
            publication: PublicationInfo::none(),
        }
    }

    pub fn pmids(&self) -> impl Iterator<Item = &str> {
        self.publications.iter().filter_map(|item| match item {
            PublicationRef::Pmid(id) => Some(id.as_str()),
            PublicationRef::Citation { .. } => None,
        })
    }

    pub fn citation_titles(&self) -> impl Iterator<Item = &str> {
        self.publications.iter().filter_map(|item| match item {
            PublicationRef::Citation { title, .. } => Some(title.as_str()),
            PublicationRef::Pmid(_) => None,
        })
    }
}

/// The column set handed to sinks, one row per expanded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    pub accession: String,
    pub organism: String,
    pub samples: String,
    pub experiment_type: String,
    pub platform: String,
    pub title: String,
    pub submission_date: String,
    pub summary: String,
    pub link: String,
    pub paper_title: String,
    pub journal: String,
    pub impact: String,
    pub doi_or_id: String,
    pub all_references: String,
    pub molecule_type: String,
    pub bioproject_ncbi: String,
    pub bioproject_ebi: String,
    pub sra: String,
    pub all_protocols: String,
}

impl CanonicalRecord {
    pub const HEADER: [&'static str; 19] = [
        "Accession",
        "Organism",
        "Samples",
        "Type",
        "Platform",
        "Title",
        "Year",
        "Summary",
        "Link",
        "Paper_title",
        "Journal",
        "Impact factor",
        "doi or pubmed id",
        "All references",
        "Type of molecule",
        "BioProject link (NCBI)",
        "BioProject link (EBI)",
        "SRA",
        "All protocols",
    ];

    pub fn from_dataset(dataset: &Dataset) -> Self {
        let optional = |value: &Option<String>| {
            value
                .clone()
                .unwrap_or_else(|| NONE_SENTINEL.to_string())
        };
        Self {
            accession: dataset.accession.as_str().to_string(),
            organism: dataset.organism.clone(),
            samples: dataset.sample_count.to_string(),
            experiment_type: dataset.experiment_type.clone(),
            platform: dataset.platform.clone(),
            title: dataset.title.clone(),
            submission_date: dataset.submission_date.clone(),
            summary: dataset.summary.clone(),
            link: dataset.accession.browse_url(),
            paper_title: dataset.publication.title.clone(),
            journal: dataset.publication.journal.clone(),
            impact: dataset.publication.impact.to_string(),
            doi_or_id: dataset.publication.doi_or_id.clone(),
            all_references: dataset.publication.all_references.clone(),
            molecule_type: dataset.samples.molecule_types.render(),
            bioproject_ncbi: optional(&dataset.bioproject_ncbi),
            bioproject_ebi: optional(&dataset.bioproject_ebi),
            sra: optional(&dataset.sra),
            all_protocols: dataset.samples.all_protocols.clone(),
        }
    }

    pub fn cells(&self) -> [&str; 19] {
        [
            self.accession.as_str(),
            self.organism.as_str(),
            self.samples.as_str(),
            self.experiment_type.as_str(),
            self.platform.as_str(),
            self.title.as_str(),
            self.submission_date.as_str(),
            self.summary.as_str(),
            self.link.as_str(),
            self.paper_title.as_str(),
            self.journal.as_str(),
            self.impact.as_str(),
            self.doi_or_id.as_str(),
            self.all_references.as_str(),
            self.molecule_type.as_str(),
            self.bioproject_ncbi.as_str(),
            self.bioproject_ebi.as_str(),
            self.sra.as_str(),
            self.all_protocols.as_str(),
        ]
    }

    pub fn cells_mut(&mut self) -> [&mut String; 19] {
        [
            &mut self.accession,
            &mut self.organism,
            &mut self.samples,
            &mut self.experiment_type,
            &mut self.platform,
            &mut self.title,
            &mut self.submission_date,
            &mut self.summary,
            &mut self.link,
            &mut self.paper_title,
            &mut self.journal,
            &mut self.impact,
            &mut self.doi_or_id,
            &mut self.all_references,
            &mut self.molecule_type,
            &mut self.bioproject_ncbi,
            &mut self.bioproject_ebi,
            &mut self.sra,
            &mut self.all_protocols,
        ]
    }
}
