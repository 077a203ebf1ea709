//! Structured extraction: one [`InvoiceRecord`] per segmented task.

pub mod error;
pub mod http;
pub mod orchestrator;
pub mod pool;
pub mod record;
pub mod schema;
pub mod service;

pub use error::{ExtractionFailure, StructuringError};
pub use http::HttpStructurer;
pub use orchestrator::ExtractionOrchestrator;
pub use record::{InvoiceRecord, RecordId, RecordMap, RecordStatus, ReviewError};
pub use schema::{FieldValue, StructuredInvoice, CANONICAL_FIELDS};
pub use service::StructuredExtractor;
