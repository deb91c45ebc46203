//! Literature index lookups against PubMed E-utilities.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::KiraError;
use crate::http::{blocking_client, build_query_url, ncbi_api_key, send_with_retries};

pub const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Search hits requested per title in a title search.
const HITS_PER_TITLE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub id: String,
    /// Full journal name.
    pub journal: String,
    /// Abbreviated journal name.
    pub source: String,
    pub title: String,
    pub doi: Option<String>,
}

pub trait LiteratureIndex {
    /// Summaries keyed by identifier; identifiers without a record are absent.
    fn summaries(&self, ids: &[String]) -> Result<HashMap<String, ArticleSummary>, KiraError>;

    /// Maps each matched title (as given) to an identifier.
    ///
    /// Implementations may need article titles to confirm a hit; the HTTP
    /// client fetches them with its own esummary request.
    fn search_titles(&self, titles: &[String]) -> Result<HashMap<String, String>, KiraError>;
}

#[derive(Clone)]
pub struct PubmedHttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PubmedHttpClient {
    pub fn new(base_url: &str) -> Result<Self, KiraError> {
        let client = blocking_client(Duration::from_secs(60), KiraError::PubmedHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: ncbi_api_key(),
        })
    }

    fn get_json(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, KiraError> {
        let mut params = params.to_vec();
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        let url = build_query_url(&format!("{}/{endpoint}", self.base_url), &params);
        let response = send_with_retries(|| self.client.get(&url))
            .map_err(|err| KiraError::PubmedHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "PubMed request failed".to_string());
            return Err(KiraError::PubmedStatus { status, message });
        }
        response
            .json()
            .map_err(|err| KiraError::PubmedHttp(err.to_string()))
    }
}

impl LiteratureIndex for PubmedHttpClient {
    fn summaries(&self, ids: &[String]) -> Result<HashMap<String, ArticleSummary>, KiraError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let id_list = ids.join(",");
        debug!(count = ids.len(), "pubmed esummary");
        let payload = self.get_json(
            "esummary.fcgi",
            &[("db", "pubmed"), ("id", id_list.as_str()), ("retmode", "json")],
        )?;
        Ok(parse_summaries(&payload))
    }

    fn search_titles(&self, titles: &[String]) -> Result<HashMap<String, String>, KiraError> {
        if titles.is_empty() {
            return Ok(HashMap::new());
        }
        let term = title_query(titles);
        let retmax = (titles.len() * HITS_PER_TITLE).to_string();
        debug!(count = titles.len(), "pubmed title search");
        let payload = self.get_json(
            "esearch.fcgi",
            &[
                ("db", "pubmed"),
                ("term", term.as_str()),
                ("retmax", retmax.as_str()),
                ("retmode", "json"),
            ],
        )?;
        let hits = parse_search_ids(&payload);
        // Search hits carry no titles; one esummary over the hits confirms matches.
        let found = self.summaries(&hits)?;
        Ok(match_titles(titles, hits.iter().filter_map(|id| found.get(id))))
    }
}

/// `(<t1>[Title]) OR (<t2>[Title])`
pub fn title_query(titles: &[String]) -> String {
    titles
        .iter()
        .map(|title| format!("({}[Title])", title.trim()))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Lowercased, whitespace-collapsed, without the trailing period.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_lowercase()
}

/// First article whose normalized title equals a requested one wins.
pub fn match_titles<'a>(
    titles: &[String],
    articles: impl Iterator<Item = &'a ArticleSummary>,
) -> HashMap<String, String> {
    let mut by_title: HashMap<String, String> = HashMap::new();
    for article in articles {
        by_title
            .entry(normalize_title(&article.title))
            .or_insert_with(|| article.id.clone());
    }
    titles
        .iter()
        .filter_map(|title| {
            by_title
                .get(&normalize_title(title))
                .map(|id| (title.clone(), id.clone()))
        })
        .collect()
}

pub fn parse_search_ids(payload: &Value) -> Vec<String> {
    payload["esearchresult"]["idlist"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_summaries(payload: &Value) -> HashMap<String, ArticleSummary> {
    let mut out = HashMap::new();
    let Some(uids) = payload["result"]["uids"].as_array() else {
        return out;
    };
    for uid in uids.iter().filter_map(Value::as_str) {
        let entry = &payload["result"][uid];
        if entry.get("error").is_some() {
            continue;
        }
        let doi = entry["articleids"].as_array().and_then(|ids| {
            ids.iter()
                .find(|item| item["idtype"].as_str() == Some("doi"))
                .and_then(|item| item["value"].as_str())
                .map(str::to_string)
        });
        let text = |key: &str| entry[key].as_str().unwrap_or_default().trim().to_string();
        out.insert(
            uid.to_string(),
            ArticleSummary {
                id: uid.to_string(),
                journal: text("fulljournalname"),
                source: text("source"),
                title: text("title"),
                doi,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn summaries_take_the_first_doi() {
        let payload = json!({
            "result": {
                "uids": ["1", "2"],
                "1": {
                    "fulljournalname": "Cell",
                    "source": "Cell",
                    "title": "A paper.",
                    "articleids": [
                        {"idtype": "pubmed", "value": "1"},
                        {"idtype": "doi", "value": "10.1/x"}
                    ]
                },
                "2": {"uid": "2", "error": "cannot get document summary"}
            }
        });
        let summaries = parse_summaries(&payload);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries["1"].doi.as_deref(), Some("10.1/x"));
        assert_eq!(summaries["1"].journal, "Cell");
    }

    #[test]
    fn title_matching_ignores_case_and_trailing_period() {
        let article = ArticleSummary {
            id: "42".to_string(),
            journal: "Cell".to_string(),
            source: "Cell".to_string(),
            title: "A Clock in Cells.".to_string(),
            doi: None,
        };
        let titles = vec!["a clock  in cells".to_string(), "Unrelated".to_string()];
        let matched = match_titles(&titles, [&article].into_iter());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched["a clock  in cells"], "42");
    }

    #[test]
    fn title_query_ors_titles() {
        let titles = vec!["One".to_string(), "Two".to_string()];
        assert_eq!(title_query(&titles), "(One[Title]) OR (Two[Title])");
    }
}
