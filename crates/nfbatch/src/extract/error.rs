use std::time::Duration;

use thiserror::Error;

use crate::secrets::SecretError;

/// Failure of one call to the structured extraction service.
#[derive(Debug, Error)]
pub enum StructuringError {
    #[error("No endpoint configured for the extraction provider")]
    MissingEndpoint,

    #[error("Extraction service credentials unavailable: {0}")]
    Credentials(#[from] SecretError),

    #[error("Cannot connect to extraction service at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Extraction service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse extraction response: {0}")]
    ResponseParsing(String),
}

/// Why a record ended up Failed. Kept on the record as its failure detail.
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("text extraction failed: {0}")]
    TextExtraction(String),

    #[error("structured extraction failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error("structured extraction timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("extraction worker stopped before finishing: {0}")]
    WorkerLost(String),
}
