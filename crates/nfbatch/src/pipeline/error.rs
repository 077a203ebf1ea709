use thiserror::Error;

use super::progress::Stage;

/// Fatal batch errors. Everything else is a warning on the batch or a
/// Failed record.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Intake failed: {0}")]
    Intake(#[from] crate::intake::IntakeError),

    #[error("No admissible documents in batch directory")]
    NoAdmissibleDocuments,

    #[error("Batch cancelled before the {stage} stage")]
    Cancelled { stage: Stage },

    #[error("Extraction workers failed: {0}")]
    Worker(#[from] crate::error::WorkerError),
}
