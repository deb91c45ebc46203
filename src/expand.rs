//! Splits multi-organism and multi-type datasets into scalar rows.

use crate::record::Dataset;

/// Organism first, then experiment type: `N x M` independent clones.
/// With `split` off the dataset passes through untouched.
pub fn expand(dataset: Dataset, split: bool) -> Vec<Dataset> {
    if !split {
        return vec![dataset];
    }
    split_field(dataset, organism)
        .into_iter()
        .flat_map(|record| split_field(record, experiment_type))
        .collect()
}

pub fn expand_all(datasets: Vec<Dataset>, split: bool) -> Vec<Dataset> {
    datasets
        .into_iter()
        .flat_map(|dataset| expand(dataset, split))
        .collect()
}

fn organism(dataset: &mut Dataset) -> &mut String {
    &mut dataset.organism
}

fn experiment_type(dataset: &mut Dataset) -> &mut String {
    &mut dataset.experiment_type
}

fn split_field(mut dataset: Dataset, field: fn(&mut Dataset) -> &mut String) -> Vec<Dataset> {
    let parts = field(&mut dataset)
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    match parts.len() {
        0 => vec![dataset],
        1 => {
            if let Some(only) = parts.into_iter().next() {
                *field(&mut dataset) = only;
            }
            vec![dataset]
        }
        _ => parts
            .into_iter()
            .map(|part| {
                let mut clone = dataset.clone();
                *field(&mut clone) = part;
                clone
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(organism: &str, kind: &str) -> Dataset {
        let mut dataset = Dataset::new("GSE1".parse().unwrap());
        dataset.organism = organism.to_string();
        dataset.experiment_type = kind.to_string();
        dataset
    }

    #[test]
    fn organism_by_type_product() {
        let rows = expand(dataset("Mus musculus; Homo sapiens", "RNA-Seq; ChIP-Seq"), true);
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
    }

    #[test]
    fn scalar_records_are_unchanged() {
        let original = dataset("Homo sapiens", "RNA-Seq");
        assert_eq!(expand(original.clone(), true), vec![original]);
    }

    #[test]
    fn pass_through_keeps_joined_values() {
        let original = dataset("Mus musculus; Homo sapiens", "RNA-Seq");
        assert_eq!(expand(original.clone(), false), vec![original]);
    }

    #[test]
    fn empty_parts_are_dropped() {
        let rows = expand(dataset("Homo sapiens;", "RNA-Seq"), true);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].organism, "Homo sapiens");
    }
}
