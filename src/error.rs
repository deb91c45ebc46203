use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid search term: {0}")]
    InvalidSearchTerm(String),

    #[error("invalid accession: {0}")]
    InvalidAccession(String),

    #[error("conflicting run configuration: {0}")]
    #[diagnostic(help("use at most one of --search-only and --analyze-only, and a batch width of 1 or more"))]
    ConfigConflict(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to load journal impact table: {0}")]
    ImpactTable(String),

    #[error("GEO request failed: {0}")]
    GeoHttp(String),

    #[error("GEO returned status {status}: {message}")]
    GeoStatus { status: u16, message: String },

    #[error("ArrayExpress request failed: {0}")]
    ArrayExpressHttp(String),

    #[error("ArrayExpress returned status {status}: {message}")]
    ArrayExpressStatus { status: u16, message: String },

    #[error("PubMed request failed: {0}")]
    PubmedHttp(String),

    #[error("PubMed returned status {status}: {message}")]
    PubmedStatus { status: u16, message: String },

    #[error("malformed document {accession}: {reason}")]
    MalformedDocument { accession: String, reason: String },

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KiraError {
    pub fn malformed(accession: impl Into<String>, reason: impl Into<String>) -> Self {
        KiraError::MalformedDocument {
            accession: accession.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that belong to a single record and must not stop the run.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            KiraError::GeoHttp(_)
                | KiraError::GeoStatus { .. }
                | KiraError::ArrayExpressHttp(_)
                | KiraError::ArrayExpressStatus { .. }
                | KiraError::MalformedDocument { .. }
                | KiraError::Xml(_)
                | KiraError::InvalidAccession(_)
        )
    }
}

impl From<quick_xml::Error> for KiraError {
    fn from(err: quick_xml::Error) -> Self {
        KiraError::Xml(err.to_string())
    }
}
