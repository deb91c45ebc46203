//! Search phrase compilation.
//!
//! A phrase is free text for both registries, optionally followed by an
//! organism qualifier: `lung AND macrophages | Rattus norvegicus[ORGN]`.
//! GEO takes the organism as an extra boolean clause, ArrayExpress as a
//! separate `species` parameter.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::KiraError;
use crate::http::{QueryEncoding, build_query_url_with};

const GEO_SERIES_FILTER: &str = "gse[ETYP]";

static ORGN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\[orgn\]\s*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    pub phrase: String,
    pub geo: String,
    pub array_express: ArrayExpressQuery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayExpressQuery {
    pub keywords: String,
    pub species: Option<String>,
    pub direct_submissions_only: bool,
}

impl ArrayExpressQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.direct_submissions_only {
            pairs.push(("directsub", "true".to_string()));
        }
        pairs.push(("keywords", self.keywords.clone()));
        if let Some(species) = &self.species {
            pairs.push(("species", species.clone()));
        }
        pairs
    }

    /// Form-encoded search URL; spaces become `+`.
    pub fn url(&self, base: &str) -> String {
        let pairs = self.query_pairs();
        let params = pairs
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect::<Vec<_>>();
        build_query_url_with(base, &params, QueryEncoding::Form)
    }

    /// Human readable form used in the search summary table.
    pub fn display(&self) -> String {
        match &self.species {
            Some(species) => format!("{} | {}", self.keywords, species),
            None => self.keywords.clone(),
        }
    }
}

pub fn compile(phrase: &str) -> Result<CompiledQuery, KiraError> {
    let trimmed = phrase.trim();
    if trimmed.is_empty() {
        return Err(KiraError::InvalidSearchTerm("empty search phrase".to_string()));
    }

    let (keywords, organism) = match trimmed.split_once('|') {
        Some((keywords, organism)) => {
            let organism = ORGN_TAG.replace(organism.trim(), "").trim().to_string();
            if organism.is_empty() {
                return Err(KiraError::InvalidSearchTerm(format!(
                    "organism qualifier is empty in `{trimmed}`"
                )));
            }
            (keywords.trim(), Some(organism))
        }
        None => (trimmed, None),
    };
    let keywords = collapse_whitespace(keywords);
    if keywords.is_empty() {
        return Err(KiraError::InvalidSearchTerm(format!(
            "no keywords before organism qualifier in `{trimmed}`"
        )));
    }

    let geo = match &organism {
        Some(organism) => format!("({keywords}) AND {organism}[ORGN] AND {GEO_SERIES_FILTER}"),
        None => format!("({keywords}) AND {GEO_SERIES_FILTER}"),
    };

    Ok(CompiledQuery {
        phrase: trimmed.to_string(),
        geo,
        array_express: ArrayExpressQuery {
            keywords: format!("({keywords})"),
            species: organism,
            direct_submissions_only: true,
        },
    })
}

/// One phrase per line; blank lines and `#` comments are ignored.
pub fn parse_terms(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_terms(path: &Path) -> Result<Vec<String>, KiraError> {
    let content = fs::read_to_string(path)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
    Ok(parse_terms(&content))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn compile_without_organism() {
        let query = compile("  lung AND macrophages ").unwrap();
        assert_eq!(query.geo, "(lung AND macrophages) AND gse[ETYP]");
        assert_eq!(query.array_express.keywords, "(lung AND macrophages)");
        assert_eq!(query.array_express.species, None);
    }

    #[test]
    fn compile_with_organism() {
        let query = compile("lung AND macrophages | Rattus norvegicus[ORGN]").unwrap();
        assert_eq!(
            query.geo,
            "(lung AND macrophages) AND Rattus norvegicus[ORGN] AND gse[ETYP]"
        );
        assert_eq!(
            query.array_express.species.as_deref(),
            Some("Rattus norvegicus")
        );
    }

    #[test]
    fn organism_tag_is_optional() {
        let query = compile("liver|Mus musculus").unwrap();
        assert_eq!(query.geo, "(liver) AND Mus musculus[ORGN] AND gse[ETYP]");
    }

    #[test]
    fn array_express_url_is_form_encoded() {
        let query = compile("lung  AND   macrophages | Homo sapiens[orgn]").unwrap();
        assert_eq!(
            query
                .array_express
                .url("https://www.ebi.ac.uk/arrayexpress/xml/v3/experiments"),
            "https://www.ebi.ac.uk/arrayexpress/xml/v3/experiments?directsub=true&keywords=%28lung+AND+macrophages%29&species=Homo+sapiens"
        );
        assert_eq!(
            query.array_express.display(),
            "(lung AND macrophages) | Homo sapiens"
        );
    }

    #[test]
    fn empty_phrases_are_rejected() {
        assert_matches!(compile("   "), Err(KiraError::InvalidSearchTerm(_)));
        assert_matches!(compile("| Homo sapiens"), Err(KiraError::InvalidSearchTerm(_)));
        assert_matches!(compile("lung |  [ORGN]"), Err(KiraError::InvalidSearchTerm(_)));
    }

    #[test]
    fn term_files_skip_comments() {
        let terms = parse_terms("# header\nlung\n\n  liver | Mus musculus[ORGN]\n");
        assert_eq!(terms, vec!["lung", "liver | Mus musculus[ORGN]"]);
    }
}
