use std::sync::Mutex;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Intake,
    Segment,
    Extract,
    Enrich,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Stage::Intake => "intake",
            Stage::Segment => "segment",
            Stage::Extract => "extract",
            Stage::Enrich => "enrich",
        };
        f.write_str(label)
    }
}

/// Events emitted by the pipeline during a batch.
/// Invoice contents are never part of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Stage {
        stage: Stage,
        message: String,
    },
    RecordFinished {
        id: String,
        display_name: String,
        failed: bool,
        done: usize,
        total: usize,
    },
    Completed {
        records: usize,
        failed: usize,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes every event to the log.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage { stage, message } => {
                tracing::info!(stage = %stage, "{}", message);
            }
            ProgressEvent::RecordFinished {
                id,
                display_name,
                failed,
                done,
                total,
            } => {
                if failed {
                    tracing::warn!(record = %id, "[{}/{}] {} failed", done, total, display_name);
                } else {
                    tracing::info!(record = %id, "[{}/{}] {} extracted", done, total, display_name);
                }
            }
            ProgressEvent::Completed { records, failed } => {
                tracing::info!(records, failed, "Batch finished");
            }
            ProgressEvent::Failed { error } => {
                tracing::error!("Batch failed: {}", error);
            }
        }
    }
}

/// Keeps every event; used by tests to assert on progress.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
