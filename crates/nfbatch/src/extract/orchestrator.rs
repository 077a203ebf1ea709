use std::sync::Arc;
use std::time::Duration;

use crate::error::WorkerError;
use crate::extract::pool::{ExtractionJob, WorkerContext, WorkerPool};
use crate::extract::record::{RecordId, RecordMap, RecordStatus};
use crate::extract::service::StructuredExtractor;
use crate::pipeline::{CancelToken, ProgressEvent, ProgressReporter};
use crate::processor::DocumentText;
use crate::segment::ExtractionTask;

/// Runs every task through text extraction and the structured extraction
/// service, one record per task.
pub struct ExtractionOrchestrator {
    context: Arc<WorkerContext>,
    worker_count: usize,
}

impl ExtractionOrchestrator {
    pub fn new(
        text: Arc<dyn DocumentText>,
        structurer: Arc<dyn StructuredExtractor>,
        worker_count: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                text,
                structurer,
                call_timeout,
            }),
            worker_count: worker_count.max(1),
        }
    }

    /// Identifiers follow task order (`NF_001` is the first task) no matter
    /// which worker finishes first. Once `cancel` trips no further task is
    /// dispatched; tasks never dispatched get no record.
    pub fn extract_all(
        &self,
        tasks: &[ExtractionTask],
        cancel: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> Result<RecordMap, WorkerError> {
        let _span = tracing::info_span!("extract", tasks = tasks.len()).entered();
        let mut records = RecordMap::new();
        if tasks.is_empty() {
            return Ok(records);
        }

        let worker_count = self.worker_count.min(tasks.len());
        let pool = WorkerPool::new(Arc::clone(&self.context), worker_count)?;
        let capacity = pool.capacity();

        let mut pending = tasks
            .iter()
            .enumerate()
            .map(|(index, task)| ExtractionJob {
                id: RecordId::new(index as u32 + 1),
                task: task.clone(),
            });
        let mut in_flight = 0usize;

        loop {
            while in_flight < capacity && !cancel.is_cancelled() {
                let Some(job) = pending.next() else { break };
                if let Err(e) = pool.submit(job) {
                    pool.shutdown();
                    pool.wait();
                    return Err(e);
                }
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            let Some(record) = pool.recv_result() else {
                tracing::error!(in_flight, "Extraction workers exited with jobs outstanding");
                break;
            };
            in_flight -= 1;

            progress.report(ProgressEvent::RecordFinished {
                id: record.id.to_string(),
                display_name: record.source.display_name.clone(),
                failed: record.status == RecordStatus::Failed,
                done: records.len() + 1,
                total: tasks.len(),
            });
            records.insert(record.id, record);
        }

        pool.shutdown();
        pool.wait();

        if cancel.is_cancelled() && records.len() < tasks.len() {
            tracing::warn!(
                extracted = records.len(),
                total = tasks.len(),
                "Extraction cancelled"
            );
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentFormat;
    use crate::error::ProcessError;
    use crate::extract::schema::StructuredInvoice;
    use crate::extract::StructuringError;
    use crate::intake::IntakeUnit;
    use crate::pipeline::{NoopProgress, RecordingProgress};
    use crate::processor::{ExtractionMethod, TextOutcome};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the file name as the document text.
    struct NameAsText;

    impl DocumentText for NameAsText {
        fn page_count(&self, _path: &Path) -> Result<u32, ProcessError> {
            Ok(1)
        }

        fn page_text(&self, _path: &Path, _page: u32) -> String {
            String::new()
        }

        fn extract(&self, path: &Path, pages: Option<&[u32]>) -> TextOutcome {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            TextOutcome::Extracted {
                text: format!("{} {:?}", name, pages),
                method: ExtractionMethod::Direct,
            }
        }
    }

    /// Echoes the text into `observacoes_nf`, sleeping longer for earlier
    /// tasks so completion order is reversed. Fails any text containing "falha".
    struct EchoStructurer {
        calls: AtomicUsize,
    }

    impl StructuredExtractor for EchoStructurer {
        fn structure(
            &self,
            raw_text: &str,
            _fields: &[&str],
        ) -> Result<StructuredInvoice, StructuringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = raw_text
                .split('_')
                .next()
                .and_then(|n| n.parse::<u64>().ok())
                .map_or(0, |n| 60u64.saturating_sub(n * 10));
            std::thread::sleep(Duration::from_millis(delay));

            if raw_text.contains("falha") {
                return Err(StructuringError::Api {
                    status: 500,
                    body: "erro interno".to_string(),
                });
            }
            let mut invoice = StructuredInvoice::default();
            invoice.set("observacoes_nf", Some(raw_text.to_string()));
            Ok(invoice)
        }
    }

    fn task(name: &str) -> ExtractionTask {
        ExtractionTask::whole(Arc::new(IntakeUnit {
            original_name: name.to_string(),
            normalized_name: name.to_string(),
            path: PathBuf::from("/lote").join(name),
            format: DocumentFormat::Pdf,
        }))
    }

    fn orchestrator(workers: usize) -> (ExtractionOrchestrator, Arc<EchoStructurer>) {
        let structurer = Arc::new(EchoStructurer {
            calls: AtomicUsize::new(0),
        });
        let orchestrator = ExtractionOrchestrator::new(
            Arc::new(NameAsText),
            structurer.clone(),
            workers,
            Duration::from_secs(10),
        );
        (orchestrator, structurer)
    }

    #[test]
    fn test_ids_follow_task_order_under_concurrency() {
        let tasks: Vec<ExtractionTask> =
            (1..=5).map(|i| task(&format!("{}_nota.pdf", i))).collect();
        let (orchestrator, _) = orchestrator(4);

        let records = orchestrator
            .extract_all(&tasks, &CancelToken::new(), &NoopProgress)
            .unwrap();

        assert_eq!(records.len(), 5);
        for (i, (id, record)) in records.iter().enumerate() {
            assert_eq!(id.to_string(), format!("NF_{:03}", i + 1));
            assert_eq!(record.source.original_name, format!("{}_nota.pdf", i + 1));
            assert!(record
                .data
                .get("observacoes_nf")
                .unwrap()
                .starts_with(&format!("{}_nota.pdf", i + 1)));
        }
    }

    #[test]
    fn test_failure_does_not_halt_batch() {
        let tasks = vec![task("1_a.pdf"), task("2_falha.pdf"), task("3_c.pdf")];
        let (orchestrator, _) = orchestrator(2);

        let records = orchestrator
            .extract_all(&tasks, &CancelToken::new(), &NoopProgress)
            .unwrap();

        let statuses: Vec<RecordStatus> = records.values().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![RecordStatus::Pending, RecordStatus::Failed, RecordStatus::Pending]
        );
        let failed = &records[&RecordId::new(2)];
        assert!(failed.failure.as_deref().unwrap().contains("500"));
        assert_eq!(failed.source.display_name, "2_falha.pdf");
    }

    #[test]
    fn test_many_tasks_with_one_worker() {
        let tasks: Vec<ExtractionTask> = (0..25).map(|i| task(&format!("x{}.pdf", i))).collect();
        let (orchestrator, structurer) = orchestrator(1);
        let progress = RecordingProgress::default();

        let records = orchestrator
            .extract_all(&tasks, &CancelToken::new(), &progress)
            .unwrap();

        assert_eq!(records.len(), 25);
        assert_eq!(structurer.calls.load(Ordering::SeqCst), 25);
        assert_eq!(progress.events().len(), 25);
    }

    #[test]
    fn test_cancelled_before_dispatch() {
        let tasks = vec![task("a.pdf"), task("b.pdf")];
        let (orchestrator, structurer) = orchestrator(2);
        let cancel = CancelToken::new();
        cancel.cancel();

        let records = orchestrator.extract_all(&tasks, &cancel, &NoopProgress).unwrap();

        assert!(records.is_empty());
        assert_eq!(structurer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_page_ranges_reach_text_adapter() {
        let mut split = task("lote.pdf");
        split.pages = Some(vec![3]);
        let (orchestrator, _) = orchestrator(1);

        let records = orchestrator
            .extract_all(&[split], &CancelToken::new(), &NoopProgress)
            .unwrap();

        let record = &records[&RecordId::new(1)];
        assert_eq!(record.data.get("observacoes_nf"), Some("lote.pdf Some([3])"));
        assert_eq!(record.source.display_name, "lote.pdf (pages 3)");
    }
}
