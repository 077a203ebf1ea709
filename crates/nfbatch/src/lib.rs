pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod intake;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod secrets;
pub mod segment;
pub mod storage;

pub use config::{load_config, Config, DocumentFormat};
pub use enrich::{Enricher, LookupTable};
pub use error::{ConfigError, ProcessError, StorageError, WorkerError};
pub use extract::{
    ExtractionOrchestrator, HttpStructurer, InvoiceRecord, RecordId, RecordMap, RecordStatus,
    StructuredExtractor, StructuredInvoice,
};
pub use intake::{Guardian, IntakeReport, IntakeUnit};
pub use pipeline::{BatchError, BatchReport, CancelToken, Pipeline, PipelineConfig};
pub use processor::{DocumentText, TextExtractor, TextOutcome};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use segment::{ExtractionTask, Segmenter};
