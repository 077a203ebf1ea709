use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extract::record::{RecordMap, RecordStatus};
use crate::intake::IntakeUnit;
use crate::segment::ExtractionTask;

/// One run of the pipeline over one batch directory.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: String,
    pub working_dir: PathBuf,
    pub status: String,
    /// Non-fatal problems, in the order the stages hit them.
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            working_dir: working_dir.to_path_buf(),
            status: "Submitted".to_string(),
            errors: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// State threaded through the stages. Each stage fills its own part.
pub struct BatchState {
    pub batch: Batch,

    // Intake result
    pub units: Vec<Arc<IntakeUnit>>,
    pub quarantined: Vec<String>,

    // Segmentation result
    pub tasks: Vec<ExtractionTask>,

    // Extraction result, enriched in place
    pub records: RecordMap,
}

impl BatchState {
    pub fn new(batch: Batch) -> Self {
        Self {
            batch,
            units: Vec::new(),
            quarantined: Vec::new(),
            tasks: Vec::new(),
            records: RecordMap::new(),
        }
    }

    pub fn into_report(self) -> BatchReport {
        let failed = self
            .records
            .values()
            .filter(|r| r.status == RecordStatus::Failed)
            .count();
        BatchReport {
            admitted: self.units.len(),
            quarantined: self.quarantined,
            tasks: self.tasks.len(),
            failed,
            records: self.records,
            batch: self.batch,
        }
    }
}

/// Serializable outcome of a batch, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch: Batch,
    pub admitted: usize,
    pub quarantined: Vec<String>,
    pub tasks: usize,
    pub failed: usize,
    pub records: RecordMap,
}
