use std::io::Write;

use assert_matches::assert_matches;

use kira_dataset_harvester::config::{ConfigLoader, Overrides, RunMode};
use kira_dataset_harvester::error::KiraError;

#[test]
fn both_modes_conflict() {
    assert_matches!(
        RunMode::from_flags(true, true),
        Err(KiraError::ConfigConflict(_))
    );
    assert_eq!(RunMode::from_flags(true, false).unwrap(), RunMode::SearchOnly);
    assert!(RunMode::from_flags(false, false).unwrap().analyzes());
}

#[test]
fn explicit_config_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"batch_width": 5, "split": false, "skip_accessions": ["gse42"], "eutils_base_url": "http://localhost:9"}}"#
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(file.path()), Overrides::default()).unwrap();
    assert_eq!(resolved.settings.batch_width, 5);
    assert!(!resolved.settings.split);
    assert!(resolved.skips("GSE42"));
    assert_eq!(resolved.eutils_base_url, "http://localhost:9");
}

#[test]
fn missing_explicit_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(Some(&path), Overrides::default()),
        Err(KiraError::ConfigRead(_))
    );
}

#[test]
fn malformed_config_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert_matches!(
        ConfigLoader::resolve(Some(file.path()), Overrides::default()),
        Err(KiraError::ConfigParse(_))
    );
}
