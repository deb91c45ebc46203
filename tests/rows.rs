use kira_dataset_harvester::aggregate::{Aggregator, to_record, wrap_cell};
use kira_dataset_harvester::domain::{Accession, Registry};
use kira_dataset_harvester::expand::{expand, expand_all};
use kira_dataset_harvester::record::{CanonicalRecord, Dataset};
use kira_dataset_harvester::report::RunReport;
use kira_dataset_harvester::sink::TsvSink;

fn two_by_two() -> Dataset {
    let mut dataset = Dataset::new(Accession::new(Registry::Geo, "GSE7"));
    dataset.organism = "Mus musculus; Homo sapiens".to_string();
    dataset.experiment_type = "RNA-Seq; ChIP-Seq".to_string();
    dataset
}

#[test]
fn two_organisms_and_two_types_give_four_rows() {
    let rows = expand(two_by_two(), true);
    let pairs = rows
        .iter()
        .map(|row| (row.organism.as_str(), row.experiment_type.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        pairs,
        vec![
            ("Mus musculus", "RNA-Seq"),
            ("Mus musculus", "ChIP-Seq"),
            ("Homo sapiens", "RNA-Seq"),
            ("Homo sapiens", "ChIP-Seq"),
        ]
    );
    assert!(rows.iter().all(|row| row.accession.as_str() == "GSE7"));
}

#[test]
fn expanding_twice_changes_nothing() {
    let once = expand_all(vec![two_by_two()], true);
    let twice = expand_all(once.clone(), true);
    assert_eq!(once, twice);
}

#[test]
fn expanded_rows_do_not_share_state() {
    let mut dataset = two_by_two();
    dataset.samples.cell_types.insert("HeLa");
    let mut rows = expand(dataset, true);
    let untouched = rows[1..].to_vec();

    rows[0].organism = "Danio rerio".to_string();
    rows[0].samples.cell_types.insert("K562");

    assert_eq!(rows[1..], untouched[..]);
    assert_eq!(rows[0].samples.cell_types.render(), "HeLa; K562");
    assert!(rows[1..].iter().all(|row| row.samples.cell_types.render() == "HeLa"));
}

#[test]
fn unique_mode_keeps_one_row() {
    let rows = expand(two_by_two(), false);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].organism, "Mus musculus; Homo sapiens");
}

#[test]
fn wrapping_respects_the_limit() {
    let text = "x".repeat(25);
    let wrapped = wrap_cell(&text, 10);
    assert_eq!(wrapped.split('\t').map(str::len).collect::<Vec<_>>(), vec![10, 10, 5]);
    assert_eq!(wrap_cell(&text, 0), text);
    assert_eq!(wrap_cell(&text, 5), text);
}

#[test]
fn long_summary_spans_several_cells() {
    let mut dataset = two_by_two();
    dataset.summary = "a".repeat(30);
    let record = to_record(&dataset, 10);
    assert_eq!(record.summary.matches('\t').count(), 2);
    assert_eq!(record.organism, "Mus musculus; Homo sapiens");
}

#[test]
fn rows_land_in_the_table_in_order() {
    let mut sink = TsvSink::new(Vec::new()).unwrap();
    let mut report = RunReport::new();
    let mut aggregator = Aggregator::new(50_000);
    let rows = expand_all(vec![two_by_two()], true);

    aggregator.push_all(&rows, &mut sink, &mut report).unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines = output.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], CanonicalRecord::HEADER.join("\t"));
    assert!(lines[1].starts_with("GSE7\tMus musculus\t0\tRNA-Seq\t"));
    assert!(lines[4].starts_with("GSE7\tHomo sapiens\t0\tChIP-Seq\t"));
    assert_eq!(aggregator.written(), 4);
    assert!(report.entries().is_empty());
}
