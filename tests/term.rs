use assert_matches::assert_matches;

use kira_dataset_harvester::error::KiraError;
use kira_dataset_harvester::term::{compile, parse_terms};

#[test]
fn organism_qualifier_targets_both_registries() {
    let query = compile("lung AND macrophages | Rattus norvegicus[ORGN]").unwrap();
    assert_eq!(
        query.geo,
        "(lung AND macrophages) AND Rattus norvegicus[ORGN] AND gse[ETYP]"
    );
    assert_eq!(query.array_express.keywords, "(lung AND macrophages)");
    assert_eq!(query.array_express.species.as_deref(), Some("Rattus norvegicus"));
    assert!(query.array_express.direct_submissions_only);
}

#[test]
fn plain_phrase_has_no_species() {
    let query = compile("  single   cell  ").unwrap();
    assert_eq!(query.geo, "(single cell) AND gse[ETYP]");
    assert_eq!(query.array_express.species, None);
    assert_eq!(
        query.array_express.url("https://ae.example/experiments"),
        "https://ae.example/experiments?directsub=true&keywords=%28single+cell%29"
    );
}

#[test]
fn empty_parts_are_rejected() {
    assert_matches!(compile("   "), Err(KiraError::InvalidSearchTerm(_)));
    assert_matches!(compile("| Homo sapiens"), Err(KiraError::InvalidSearchTerm(_)));
    assert_matches!(compile("liver |  [ORGN]"), Err(KiraError::InvalidSearchTerm(_)));
}

#[test]
fn terms_file_skips_blanks_and_comments() {
    let terms = parse_terms("# header\nliver\n\n  kidney | Mus musculus[ORGN]  \n");
    assert_eq!(terms, vec!["liver", "kidney | Mus musculus[ORGN]"]);
}
