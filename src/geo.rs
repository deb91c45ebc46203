use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::domain::Accession;
use crate::error::KiraError;
use crate::http::{blocking_client, build_query_url, ncbi_api_key, send_with_retries};

pub const GEO_FTP_BASE: &str = "https://ftp.ncbi.nlm.nih.gov";

pub trait GeoClient: Send + Sync {
    /// Series accessions matching a compiled GEO query, in search order.
    fn search(&self, term: &str, max_results: usize) -> Result<Vec<Accession>, KiraError>;
    /// The MINiML family document of one series.
    fn fetch_family(&self, accession: &Accession) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct GeoHttpClient {
    client: Client,
    eutils_base: String,
    ftp_base: String,
    api_key: Option<String>,
}

impl GeoHttpClient {
    pub fn new(eutils_base: &str, ftp_base: &str) -> Result<Self, KiraError> {
        let client = blocking_client(Duration::from_secs(120), KiraError::GeoHttp)?;
        Ok(Self {
            client,
            eutils_base: eutils_base.trim_end_matches('/').to_string(),
            ftp_base: ftp_base.trim_end_matches('/').to_string(),
            api_key: ncbi_api_key(),
        })
    }

    fn family_url(&self, accession: &Accession) -> String {
        format!(
            "{}/geo/series/{prefix}/{acc}/miniml/{acc}_family.xml.tgz",
            self.ftp_base,
            prefix = geo_series_prefix(accession),
            acc = accession.as_str()
        )
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, KiraError> {
        let response = send_with_retries(|| self.client.get(url))
            .map_err(|err| KiraError::GeoHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "GEO request failed".to_string());
            return Err(KiraError::GeoStatus { status, message });
        }
        Ok(response)
    }
}

impl GeoClient for GeoHttpClient {
    fn search(&self, term: &str, max_results: usize) -> Result<Vec<Accession>, KiraError> {
        let retmax = max_results.to_string();
        let mut params = vec![
            ("db", "gds"),
            ("term", term),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        let url = build_query_url(&format!("{}/esearch.fcgi", self.eutils_base), &params);
        let payload: Value = self
            .get(&url)?
            .json()
            .map_err(|err| KiraError::GeoHttp(err.to_string()))?;
        let accessions = series_from_search(&payload);
        debug!(term, hits = accessions.len(), "GEO search");
        Ok(accessions)
    }

    fn fetch_family(&self, accession: &Accession) -> Result<String, KiraError> {
        let url = self.family_url(accession);
        debug!(%accession, url = %url, "downloading MINiML family");
        let bytes = self
            .get(&url)?
            .bytes()
            .map_err(|err| KiraError::GeoHttp(err.to_string()))?;
        extract_family_xml(bytes.as_ref(), accession)
    }
}

/// Series uids (`2NNNNNNNN`) from an esearch payload; other GDS entries are dropped.
pub fn series_from_search(payload: &Value) -> Vec<Accession> {
    let mut out: Vec<Accession> = Vec::new();
    let Some(ids) = payload["esearchresult"]["idlist"].as_array() else {
        return out;
    };
    for uid in ids.iter().filter_map(Value::as_str) {
        if !uid.starts_with('2') {
            continue;
        }
        match Accession::from_gds_uid(uid) {
            Ok(accession) if !out.contains(&accession) => out.push(accession),
            Ok(_) => {}
            Err(err) => debug!(uid, error = %err, "ignoring GDS uid"),
        }
    }
    out
}

/// Reads `<acc>_family.xml` out of a gzipped tar archive held in memory.
pub fn extract_family_xml(archive: &[u8], accession: &Accession) -> Result<String, KiraError> {
    let wanted = format!("{}_family.xml", accession.as_str());
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|err| KiraError::malformed(accession.as_str(), err.to_string()))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|err| KiraError::malformed(accession.as_str(), err.to_string()))?;
        let matches = entry
            .path()
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy() == wanted))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|err| KiraError::malformed(accession.as_str(), err.to_string()))?;
        return Ok(text);
    }
    Err(KiraError::malformed(
        accession.as_str(),
        format!("archive has no {wanted}"),
    ))
}

/// FTP directory of a series: `GSE12345` lives under `GSE12nnn`.
pub fn geo_series_prefix(accession: &Accession) -> String {
    let digits = accession.as_str().trim_start_matches("GSE");
    if digits.len() <= 3 {
        return "GSEnnn".to_string();
    }
    let head = &digits[..digits.len() - 3];
    format!("GSE{}nnn", head)
}
