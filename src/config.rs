use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::arrayexpress::ARRAY_EXPRESS_BASE;
use crate::context::{DEFAULT_BATCH_WIDTH, DEFAULT_CELL_WIDTH, PipelineSettings};
use crate::error::KiraError;
use crate::geo::GEO_FTP_BASE;
use crate::pubmed::EUTILS_BASE;

pub const DEFAULT_CONFIG_FILE: &str = "kira-dh.json";
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 1_000_000;

/// On-disk configuration; every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub batch_width: Option<usize>,
    #[serde(default)]
    pub cell_width: Option<usize>,
    #[serde(default)]
    pub split: Option<bool>,
    #[serde(default)]
    pub max_search_results: Option<usize>,
    #[serde(default)]
    pub impact_table: Option<PathBuf>,
    #[serde(default)]
    pub skip_accessions: Vec<String>,
    #[serde(default)]
    pub geo_base_url: Option<String>,
    #[serde(default)]
    pub array_express_base_url: Option<String>,
    #[serde(default)]
    pub eutils_base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Search, then analyze what was found.
    Full,
    SearchOnly,
    /// Analyze accession lists written by an earlier search.
    AnalyzeOnly,
}

impl RunMode {
    pub fn from_flags(search_only: bool, analyze_only: bool) -> Result<Self, KiraError> {
        match (search_only, analyze_only) {
            (true, true) => Err(KiraError::ConfigConflict(
                "search-only and analyze-only were both requested".to_string(),
            )),
            (true, false) => Ok(RunMode::SearchOnly),
            (false, true) => Ok(RunMode::AnalyzeOnly),
            (false, false) => Ok(RunMode::Full),
        }
    }

    pub fn searches(&self) -> bool {
        matches!(self, RunMode::Full | RunMode::SearchOnly)
    }

    pub fn analyzes(&self) -> bool {
        matches!(self, RunMode::Full | RunMode::AnalyzeOnly)
    }
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub batch_width: Option<usize>,
    pub cell_width: Option<usize>,
    /// Keep multi-valued records unsplit.
    pub unique: bool,
    pub verbose: bool,
    pub impact_table: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub settings: PipelineSettings,
    pub max_search_results: usize,
    pub impact_table: Option<PathBuf>,
    pub skip_accessions: BTreeSet<String>,
    pub geo_base_url: String,
    pub array_express_base_url: String,
    pub eutils_base_url: String,
}

impl ResolvedConfig {
    pub fn skips(&self, accession: &str) -> bool {
        self.skip_accessions.contains(&accession.trim().to_uppercase())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must be readable; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Config, KiraError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<ResolvedConfig, KiraError> {
        let config = Self::load(path)?;
        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: Overrides,
    ) -> Result<ResolvedConfig, KiraError> {
        let batch_width = overrides
            .batch_width
            .or(config.batch_width)
            .unwrap_or(DEFAULT_BATCH_WIDTH);
        if batch_width == 0 {
            return Err(KiraError::ConfigConflict(
                "batch width must be at least 1".to_string(),
            ));
        }
        let cell_width = overrides
            .cell_width
            .or(config.cell_width)
            .unwrap_or(DEFAULT_CELL_WIDTH);
        let split = !overrides.unique && config.split.unwrap_or(true);

        Ok(ResolvedConfig {
            settings: PipelineSettings {
                batch_width,
                cell_width,
                split,
                verbose: overrides.verbose,
            },
            max_search_results: config
                .max_search_results
                .unwrap_or(DEFAULT_MAX_SEARCH_RESULTS),
            impact_table: overrides.impact_table.or(config.impact_table),
            skip_accessions: config
                .skip_accessions
                .iter()
                .map(|id| id.trim().to_uppercase())
                .filter(|id| !id.is_empty())
                .collect(),
            geo_base_url: config
                .geo_base_url
                .unwrap_or_else(|| GEO_FTP_BASE.to_string()),
            array_express_base_url: config
                .array_express_base_url
                .unwrap_or_else(|| ARRAY_EXPRESS_BASE.to_string()),
            eutils_base_url: config
                .eutils_base_url
                .unwrap_or_else(|| EUTILS_BASE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_apply_without_file() {
        let resolved =
            ConfigLoader::resolve_config(Config::default(), Overrides::default()).unwrap();
        assert_eq!(resolved.settings.batch_width, 3);
        assert_eq!(resolved.settings.cell_width, 50_000);
        assert!(resolved.settings.split);
        assert!(!resolved.settings.verbose);
        assert_eq!(resolved.eutils_base_url, EUTILS_BASE);
    }

    #[test]
    fn flags_override_file_values() {
        let config = Config {
            batch_width: Some(10),
            cell_width: Some(200),
            ..Config::default()
        };
        let overrides = Overrides {
            batch_width: Some(2),
            unique: true,
            verbose: true,
            ..Overrides::default()
        };
        let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
        assert!(resolved.settings.verbose);
        assert_eq!(resolved.settings.batch_width, 2);
        assert_eq!(resolved.settings.cell_width, 200);
        assert!(!resolved.settings.split);
    }

    #[test]
    fn zero_batch_width_conflicts() {
        let overrides = Overrides {
            batch_width: Some(0),
            ..Overrides::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(Config::default(), overrides),
            Err(KiraError::ConfigConflict(_))
        );
    }

    #[test]
    fn skip_list_is_case_insensitive() {
        let config = Config {
            skip_accessions: vec!["gse1".to_string(), " ".to_string()],
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config, Overrides::default()).unwrap();
        assert!(resolved.skips("GSE1"));
        assert_eq!(resolved.skip_accessions.len(), 1);
    }
}
