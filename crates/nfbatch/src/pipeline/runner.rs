use std::path::Path;
use std::sync::Arc;

use tracing::{info, info_span, warn};

use crate::config::Config;
use crate::enrich::{Enricher, LookupTable};
use crate::extract::{ExtractionOrchestrator, HttpStructurer, StructuredExtractor, StructuringError};
use crate::intake::Guardian;
use crate::processor::{DocumentText, TextExtractor};
use crate::sanitize;
use crate::segment::Segmenter;

use super::cancel::CancelToken;
use super::config::PipelineConfig;
use super::context::{Batch, BatchReport, BatchState};
use super::error::BatchError;
use super::progress::{ProgressEvent, ProgressReporter, Stage};

pub struct Pipeline {
    config: PipelineConfig,
    guardian: Guardian,
    text: Arc<dyn DocumentText>,
    structurer: Arc<dyn StructuredExtractor>,
    enricher: Enricher,
}

impl Pipeline {
    /// Production constructor: Tesseract-backed text adapter and the HTTP
    /// extraction client.
    pub fn from_config(config: &Config) -> Result<Self, StructuringError> {
        let text = Arc::new(TextExtractor::new(&config.ocr));
        let structurer = Arc::new(HttpStructurer::from_config(&config.extraction)?);
        Ok(Self::with_services(
            PipelineConfig::from_config(config),
            text,
            structurer,
        ))
    }

    /// Constructor with injected collaborators.
    pub fn with_services(
        config: PipelineConfig,
        text: Arc<dyn DocumentText>,
        structurer: Arc<dyn StructuredExtractor>,
    ) -> Self {
        Self {
            config,
            guardian: Guardian::new(),
            text,
            structurer,
            enricher: Enricher::new(),
        }
    }

    /// Runs intake, segmentation, extraction and enrichment over one batch
    /// directory. Only the errors in [`BatchError`] abort the batch.
    pub fn run(
        &self,
        batch_dir: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<BatchReport, BatchError> {
        let batch = Batch::new(batch_dir);
        let _pipeline_span = info_span!("pipeline",
            batch_id = %batch.id,
            directory = %sanitize::redact_path(batch_dir),
        )
        .entered();

        let mut state = BatchState::new(batch);
        let result = self.run_stages(&mut state, progress, cancel);

        match result {
            Ok(()) => {
                let report = state.into_report();
                progress.report(ProgressEvent::Completed {
                    records: report.records.len(),
                    failed: report.failed,
                });
                Ok(report)
            }
            Err(e) => {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run_stages(
        &self,
        state: &mut BatchState,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<(), BatchError> {
        // Stage 1: Intake
        {
            check_cancelled(cancel, Stage::Intake)?;
            progress.report(ProgressEvent::Stage {
                stage: Stage::Intake,
                message: "Validating batch directory...".to_string(),
            });
            self.step_intake(state)?;
        }

        // Stage 2: Segment
        {
            check_cancelled(cancel, Stage::Segment)?;
            progress.report(ProgressEvent::Stage {
                stage: Stage::Segment,
                message: "Detecting invoice boundaries...".to_string(),
            });
            self.step_segment(state);
        }

        // Stage 3: Extract
        {
            check_cancelled(cancel, Stage::Extract)?;
            progress.report(ProgressEvent::Stage {
                stage: Stage::Extract,
                message: format!("Extracting {} invoices...", state.tasks.len()),
            });
            self.step_extract(state, progress, cancel)?;
        }

        // Stage 4: Enrich
        {
            check_cancelled(cancel, Stage::Enrich)?;
            progress.report(ProgressEvent::Stage {
                stage: Stage::Enrich,
                message: "Filling derived fields...".to_string(),
            });
            self.step_enrich(state);
        }

        Ok(())
    }

    fn step_intake(&self, state: &mut BatchState) -> Result<(), BatchError> {
        let report = self.guardian.validate(&state.batch.working_dir)?;

        for warning in report.warnings {
            state.batch.warn(warning);
        }
        state.quarantined = report.quarantined;
        state.units = report.admitted.into_iter().map(Arc::new).collect();

        info!(
            admitted = state.units.len(),
            quarantined = state.quarantined.len(),
            unpacked = report.archives_unpacked,
            "Intake finished"
        );

        if state.units.is_empty() {
            return Err(BatchError::NoAdmissibleDocuments);
        }
        state.batch.set_status("Intake finished");
        Ok(())
    }

    fn step_segment(&self, state: &mut BatchState) {
        let outcome = Segmenter::new(Arc::clone(&self.text)).segment(&state.units);

        for warning in outcome.warnings {
            state.batch.warn(warning);
        }
        state.tasks = outcome.tasks;
        state.batch.set_status("Segmentation finished");
    }

    fn step_extract(
        &self,
        state: &mut BatchState,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<(), BatchError> {
        let orchestrator = ExtractionOrchestrator::new(
            Arc::clone(&self.text),
            Arc::clone(&self.structurer),
            self.config.worker_count,
            self.config.call_timeout,
        );
        state.records = orchestrator.extract_all(&state.tasks, cancel, progress)?;

        for record in state.records.values() {
            if let Some(failure) = &record.failure {
                state
                    .batch
                    .warn(format!("{} ({}): {}", record.id, record.source.display_name, failure));
            }
        }
        state.batch.set_status("Extraction finished");
        Ok(())
    }

    fn step_enrich(&self, state: &mut BatchState) {
        let table = match &self.config.lookup {
            Some(lookup) => match LookupTable::load(lookup) {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!("Lookup table unavailable: {}", e);
                    state
                        .batch
                        .warn(format!("Lookup table unavailable, enrichment ran without it: {}", e));
                    None
                }
            },
            None => None,
        };

        self.enricher.enrich(&mut state.records, table.as_ref());
        state.batch.set_status("Enrichment finished");
    }
}

fn check_cancelled(cancel: &CancelToken, stage: Stage) -> Result<(), BatchError> {
    if cancel.is_cancelled() {
        warn!(stage = %stage, "Batch cancelled");
        Err(BatchError::Cancelled { stage })
    } else {
        Ok(())
    }
}
