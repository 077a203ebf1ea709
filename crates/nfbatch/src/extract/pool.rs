use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::extract::record::{InvoiceRecord, RecordId};
use crate::extract::schema::{StructuredInvoice, CANONICAL_FIELDS};
use crate::extract::service::StructuredExtractor;
use crate::extract::{ExtractionFailure, StructuringError};
use crate::processor::{DocumentText, TextOutcome};
use crate::segment::ExtractionTask;

/// A task paired with the identifier it was given before dispatch.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub id: RecordId,
    pub task: ExtractionTask,
}

/// Collaborators shared by every worker.
pub struct WorkerContext {
    pub text: Arc<dyn DocumentText>,
    pub structurer: Arc<dyn StructuredExtractor>,
    pub call_timeout: Duration,
}

pub struct WorkerPool {
    job_sender: Sender<ExtractionJob>,
    result_receiver: Receiver<InvoiceRecord>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(context: Arc<WorkerContext>, worker_count: usize) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let capacity = worker_count * 2;
        let (job_sender, job_receiver) = bounded::<ExtractionJob>(capacity);
        let (result_sender, result_receiver) = bounded::<InvoiceRecord>(capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_context = Arc::clone(&context);

            let handle = thread::Builder::new()
                .name(format!("nfbatch-extract-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, result_tx, shutdown_flag, worker_context);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} extraction workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            capacity,
        })
    }

    /// Jobs that can be queued without blocking: the bound of both channels.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn submit(&self, job: ExtractionJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Blocks for the next finished record. `None` once every worker is gone.
    pub fn recv_result(&self) -> Option<InvoiceRecord> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down extraction workers...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All extraction workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<ExtractionJob>,
    result_sender: Sender<InvoiceRecord>,
    shutdown: Arc<AtomicBool>,
    context: Arc<WorkerContext>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing {}: {}", worker_id, job.id, job.task.display_name());

                let id = job.id;
                let task = job.task.clone();
                let record = panic::catch_unwind(AssertUnwindSafe(|| process_job(&context, job)))
                    .unwrap_or_else(|payload| {
                        let failure = ExtractionFailure::WorkerLost(panic_message(payload.as_ref()));
                        InvoiceRecord::failed(id, &task, &failure)
                    });

                if let Err(e) = result_sender.send(record) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn process_job(context: &WorkerContext, job: ExtractionJob) -> InvoiceRecord {
    let ExtractionJob { id, task } = job;

    let text = match context.text.extract(&task.unit.path, task.pages.as_deref()) {
        TextOutcome::Extracted { text, method } => {
            debug!("{}: {} chars via {:?}", id, text.len(), method);
            text
        }
        TextOutcome::Failed(detail) => {
            warn!("{}: text extraction failed: {}", id, detail);
            return InvoiceRecord::failed(id, &task, &ExtractionFailure::TextExtraction(detail));
        }
    };

    match call_with_timeout(&context.structurer, text, context.call_timeout) {
        Ok(data) => InvoiceRecord::pending(id, &task, data),
        Err(failure) => {
            warn!("{} ({}) failed: {}", id, task.display_name(), failure);
            InvoiceRecord::failed(id, &task, &failure)
        }
    }
}

/// Runs one service call on a helper thread and stops waiting after
/// `timeout`. A call that overruns is abandoned, not interrupted.
fn call_with_timeout(
    structurer: &Arc<dyn StructuredExtractor>,
    text: String,
    timeout: Duration,
) -> Result<StructuredInvoice, ExtractionFailure> {
    let (tx, rx) = bounded::<Result<StructuredInvoice, StructuringError>>(1);
    let structurer = Arc::clone(structurer);

    thread::Builder::new()
        .name("nfbatch-structure".to_string())
        .spawn(move || {
            let _ = tx.send(structurer.structure(&text, &CANONICAL_FIELDS));
        })
        .map_err(|e| ExtractionFailure::WorkerLost(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(mut invoice)) => {
            invoice.normalize();
            Ok(invoice)
        }
        Ok(Err(e)) => Err(ExtractionFailure::Structuring(e)),
        Err(RecvTimeoutError::Timeout) => Err(ExtractionFailure::TimedOut(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(ExtractionFailure::WorkerLost(
            "structuring call panicked".to_string(),
        )),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}
