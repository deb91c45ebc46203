use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::document::{SourceDocument, XmlNode};
use crate::domain::{Accession, Registry};
use crate::error::KiraError;
use crate::http::{blocking_client, send_with_retries};
use crate::term::ArrayExpressQuery;

pub const ARRAY_EXPRESS_BASE: &str = "https://www.ebi.ac.uk/arrayexpress/xml/v3";

pub trait ArrayExpressClient: Send + Sync {
    fn search(&self, query: &ArrayExpressQuery) -> Result<Vec<Accession>, KiraError>;
    fn fetch_experiment(&self, accession: &Accession) -> Result<String, KiraError>;
    fn fetch_protocol(&self, id: &str) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct ArrayExpressHttpClient {
    client: Client,
    base_url: String,
}

impl ArrayExpressHttpClient {
    pub fn new(base_url: &str) -> Result<Self, KiraError> {
        let client = blocking_client(Duration::from_secs(60), KiraError::ArrayExpressHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_text(&self, url: &str) -> Result<String, KiraError> {
        let response = send_with_retries(|| self.client.get(url))
            .map_err(|err| KiraError::ArrayExpressHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "ArrayExpress request failed".to_string());
            return Err(KiraError::ArrayExpressStatus { status, message });
        }
        response
            .text()
            .map_err(|err| KiraError::ArrayExpressHttp(err.to_string()))
    }
}

impl ArrayExpressClient for ArrayExpressHttpClient {
    fn search(&self, query: &ArrayExpressQuery) -> Result<Vec<Accession>, KiraError> {
        let url = query.url(&format!("{}/experiments", self.base_url));
        let body = self.get_text(&url)?;
        let accessions = accessions_from_search(&body)?;
        debug!(query = %query.display(), hits = accessions.len(), "ArrayExpress search");
        Ok(accessions)
    }

    fn fetch_experiment(&self, accession: &Accession) -> Result<String, KiraError> {
        self.get_text(&format!("{}/experiments/{}", self.base_url, accession.as_str()))
    }

    fn fetch_protocol(&self, id: &str) -> Result<String, KiraError> {
        self.get_text(&format!("{}/protocols/{}", self.base_url, id.trim()))
    }
}

/// Experiment accessions listed in a search response, first occurrence kept.
pub fn accessions_from_search(xml: &str) -> Result<Vec<Accession>, KiraError> {
    let root = XmlNode::parse(xml)?;
    let mut out: Vec<Accession> = Vec::new();
    for experiment in root.find_all("experiment") {
        let Some(id) = experiment
            .child("accession")
            .map(XmlNode::text)
            .filter(|id| !id.is_empty())
        else {
            continue;
        };
        let accession = Accession::new(Registry::ArrayExpress, id);
        if !out.contains(&accession) {
            out.push(accession);
        }
    }
    Ok(out)
}

/// Protocol ids referenced by an experiment document.
pub fn protocol_ids(root: &XmlNode) -> Vec<String> {
    let Some(experiment) = root.find("experiment") else {
        return Vec::new();
    };
    experiment
        .children_named("protocol")
        .filter_map(|protocol| protocol.find_text("id"))
        .collect()
}

/// Experiment tree plus one attachment per protocol that could be fetched.
pub fn fetch_document<C: ArrayExpressClient + ?Sized>(
    client: &C,
    accession: &Accession,
) -> Result<SourceDocument, KiraError> {
    let xml = client.fetch_experiment(accession)?;
    let mut document = SourceDocument::parse(accession.clone(), &xml)?;
    for id in protocol_ids(&document.root) {
        let parsed = client
            .fetch_protocol(&id)
            .and_then(|text| XmlNode::parse(&text));
        match parsed {
            Ok(protocol) => document.attachments.push(protocol),
            Err(err) => warn!(%accession, protocol = %id, error = %err, "protocol unavailable"),
        }
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_lists_unique_accessions() {
        let xml = r#"<experiments total="3">
            <experiment><accession>E-MTAB-1</accession></experiment>
            <experiment><accession>E-MTAB-2</accession></experiment>
            <experiment><accession>E-MTAB-1</accession></experiment>
        </experiments>"#;
        let ids = accessions_from_search(xml).unwrap();
        assert_eq!(
            ids.iter().map(Accession::as_str).collect::<Vec<_>>(),
            vec!["E-MTAB-1", "E-MTAB-2"]
        );
    }

    #[test]
    fn protocol_ids_come_from_the_experiment() {
        let root = XmlNode::parse(
            "<experiments><experiment><protocol><id>5</id></protocol><protocol><id>6</id></protocol></experiment></experiments>",
        )
        .unwrap();
        assert_eq!(protocol_ids(&root), vec!["5", "6"]);
    }
}
