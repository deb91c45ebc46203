use serde::Serialize;

use crate::impact::JournalImpactTable;
use crate::report::RunReport;

pub const DEFAULT_BATCH_WIDTH: usize = 3;
pub const DEFAULT_CELL_WIDTH: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSettings {
    /// Accessions fetched and resolved together.
    pub batch_width: usize,
    /// Free-text cell limit in characters; 0 disables wrapping.
    pub cell_width: usize,
    /// Split multi-organism and multi-type records into scalar rows.
    pub split: bool,
    /// Per-dataset progress events and publication choices are reported.
    pub verbose: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_width: DEFAULT_BATCH_WIDTH,
            cell_width: DEFAULT_CELL_WIDTH,
            split: true,
            verbose: false,
        }
    }
}

/// State shared by every stage of one run.
pub struct PipelineContext {
    pub settings: PipelineSettings,
    pub impact: JournalImpactTable,
    pub report: RunReport,
}

impl PipelineContext {
    pub fn new(settings: PipelineSettings, impact: JournalImpactTable, report: RunReport) -> Self {
        Self {
            settings,
            impact,
            report,
        }
    }
}
