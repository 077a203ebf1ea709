pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use cancel::CancelToken;
pub use config::PipelineConfig;
pub use context::{Batch, BatchReport, BatchState};
pub use error::BatchError;
pub use progress::{
    LogProgress, NoopProgress, ProgressEvent, ProgressReporter, RecordingProgress, Stage,
};
pub use runner::Pipeline;
