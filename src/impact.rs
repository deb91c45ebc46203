//! Journal impact lookup table.
//!
//! The table is a two column CSV without header: journal name, impact score.
//! Names are matched case-insensitively. A score of `None`, `Not Available`
//! or any other non-numeric value marks a journal that is known but unscored.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

use crate::error::KiraError;
use crate::record::ImpactScore;

pub const DEFAULT_TABLE_NAME: &str = "journal_impact.csv";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JournalMatch {
    Scored(f64),
    /// Listed in the table without a usable score.
    Unscored,
    /// Not listed under any name variant.
    Unknown,
}

impl JournalMatch {
    pub fn score(&self) -> ImpactScore {
        match self {
            JournalMatch::Scored(value) => ImpactScore::Scored(*value),
            JournalMatch::Unscored | JournalMatch::Unknown => ImpactScore::Unscored,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JournalImpactTable {
    entries: HashMap<String, Option<f64>>,
}

impl JournalImpactTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KiraError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut table = Self::empty();
        for (idx, row) in csv_reader.records().enumerate() {
            let row = row.map_err(|err| KiraError::ImpactTable(format!("row {}: {err}", idx + 1)))?;
            let Some(name) = row.get(0).map(str::trim).filter(|name| !name.is_empty()) else {
                continue;
            };
            let score = row.get(1).map(str::trim).unwrap_or_default();
            table.insert(name, score);
        }
        debug!(journals = table.len(), "loaded journal impact table");
        Ok(table)
    }

    pub fn from_path(path: &Path) -> Result<Self, KiraError> {
        let file = std::fs::File::open(path)
            .map_err(|err| KiraError::ImpactTable(format!("open {}: {err}", path.display())))?;
        Self::from_reader(file)
    }

    /// Adds or replaces one journal; a non-numeric score is stored as unscored.
    pub fn insert(&mut self, name: &str, score: &str) {
        let value = score.parse::<f64>().ok().filter(|value| value.is_finite());
        self.entries.insert(name.trim().to_lowercase(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.trim().to_lowercase())
    }

    fn lookup(&self, name: &str) -> Option<JournalMatch> {
        self.entries
            .get(&name.trim().to_lowercase())
            .map(|value| match value {
                Some(score) => JournalMatch::Scored(*score),
                None => JournalMatch::Unscored,
            })
    }

    /// Tries the full name, the abbreviation, then `and`/`&` spellings of the
    /// full name; the first listed variant decides.
    pub fn score(&self, full_name: &str, abbreviation: Option<&str>) -> JournalMatch {
        let lowered = full_name.trim().to_lowercase();
        let mut candidates = vec![lowered.clone()];
        if let Some(abbreviation) = abbreviation.map(str::trim).filter(|abbr| !abbr.is_empty()) {
            candidates.push(abbreviation.to_lowercase());
        }
        candidates.push(lowered.replace("and", "&"));
        candidates.push(lowered.replace('&', "and"));

        candidates
            .iter()
            .find_map(|candidate| self.lookup(candidate))
            .unwrap_or(JournalMatch::Unknown)
    }
}

/// Resolution order: explicit path, working directory, per-user config dir.
pub fn locate_table(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(DEFAULT_TABLE_NAME);
    if local.exists() {
        return Some(local);
    }
    ProjectDirs::from("", "", "kira-dataset-harvester")
        .map(|dirs| dirs.config_dir().join(DEFAULT_TABLE_NAME))
        .filter(|path| path.exists())
}
