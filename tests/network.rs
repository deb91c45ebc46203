use kira_dataset_harvester::geo::{GeoClient, GeoHttpClient, GEO_FTP_BASE};
use kira_dataset_harvester::pubmed::{EUTILS_BASE, LiteratureIndex, PubmedHttpClient};
use kira_dataset_harvester::term::compile;

#[test]
#[ignore]
fn live_geo_search_returns_series() {
    let client = GeoHttpClient::new(EUTILS_BASE, GEO_FTP_BASE).unwrap();
    let query = compile("HeLa | Homo sapiens[ORGN]").unwrap();
    let hits = client.search(&query.geo, 5).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|acc| acc.as_str().starts_with("GSE")));
}

#[test]
#[ignore]
fn live_pubmed_summary_has_a_journal() {
    let client = PubmedHttpClient::new(EUTILS_BASE).unwrap();
    let found = client.summaries(&["31452104".to_string()]).unwrap();
    let summary = &found["31452104"];
    assert!(!summary.journal.is_empty());
}
