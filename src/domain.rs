use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    Geo,
    ArrayExpress,
}

impl Registry {
    pub fn label(&self) -> &'static str {
        match self {
            Registry::Geo => "GEO",
            Registry::ArrayExpress => "ArrayExpress",
        }
    }

    pub fn browse_url(&self, id: &str) -> String {
        match self {
            Registry::Geo => format!("https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc={id}"),
            Registry::ArrayExpress => {
                format!("https://www.ebi.ac.uk/arrayexpress/experiments/{id}")
            }
        }
    }

    /// File the search phase writes accessions of this registry to.
    pub fn accession_list_name(&self) -> &'static str {
        match self {
            Registry::Geo => "input_GSE.txt",
            Registry::ArrayExpress => "input_ArEx.txt",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Accession {
    registry: Registry,
    id: String,
}

impl Accession {
    pub fn new(registry: Registry, id: impl Into<String>) -> Self {
        Self {
            registry,
            id: id.into(),
        }
    }

    pub fn registry(&self) -> Registry {
        self.registry
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.id.trim().is_empty()
    }

    pub fn browse_url(&self) -> String {
        self.registry.browse_url(&self.id)
    }

    /// Maps a GDS search uid (`200012345`) to its series accession (`GSE12345`).
    pub fn from_gds_uid(uid: &str) -> Result<Self, KiraError> {
        let trimmed = uid.trim();
        let digits = trimmed
            .get(1..)
            .filter(|rest| !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()))
            .ok_or_else(|| KiraError::InvalidAccession(uid.to_string()))?;
        let number: u64 = digits
            .parse()
            .map_err(|_| KiraError::InvalidAccession(uid.to_string()))?;
        Ok(Self::new(Registry::Geo, format!("GSE{number}")))
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl FromStr for Accession {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if let Some(digits) = normalized.strip_prefix("GSE") {
            if !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()) {
                return Ok(Self::new(Registry::Geo, normalized));
            }
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        if is_array_express_id(&normalized) {
            return Ok(Self::new(Registry::ArrayExpress, normalized));
        }
        Err(KiraError::InvalidAccession(value.to_string()))
    }
}

/// `E-MTAB-1234` style: `E-`, a four letter pipeline code, `-`, digits.
fn is_array_express_id(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some(prefix), Some(code), Some(number), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == "E"
        && code.len() == 4
        && code.chars().all(|ch| ch.is_ascii_alphabetic())
        && !number.is_empty()
        && number.chars().all(|ch| ch.is_ascii_digit())
}

/// Parses a newline separated accession list, skipping blanks and `#` comments.
/// Every remaining line yields its own result.
pub fn parse_accession_list(content: &str) -> Vec<Result<Accession, KiraError>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::parse)
        .collect()
}
