//! Test harness for isolated batch runs.
//!
//! The `TestHarness` struct owns a temporary directory with:
//! - a batch directory that intake works on
//! - a config directory for config and lookup files
//! and runs the pipeline with recognition disabled and a fake extraction service.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use nfbatch::config::{LookupConfig, OcrConfig};
use nfbatch::extract::StructuredExtractor;
use nfbatch::pipeline::{BatchError, BatchReport, CancelToken, NoopProgress, Pipeline, PipelineConfig};
use nfbatch::processor::TextExtractor;

pub struct TestHarness {
    temp_dir: TempDir,
    /// Directory handed to the pipeline.
    pub batch_dir: PathBuf,
    /// Holds config files and lookup tables, outside the batch.
    pub config_dir: PathBuf,
    worker_count: usize,
    call_timeout: Duration,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let batch_dir = temp_dir.path().join("lote");
        let config_dir = temp_dir.path().join("config");

        std::fs::create_dir_all(&batch_dir).expect("Failed to create batch dir");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            batch_dir,
            config_dir,
            worker_count: 2,
            call_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a file into the batch directory.
    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.batch_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Write a lookup table into the config directory.
    pub fn write_lookup(&self, filename: &str, csv: &str) -> PathBuf {
        let path = self.config_dir.join(filename);
        std::fs::write(&path, csv).expect("Failed to write lookup table");
        path
    }

    pub fn write_config(&self, filename: &str, json: &str) -> PathBuf {
        let path = self.config_dir.join(filename);
        std::fs::write(&path, json).expect("Failed to write config file");
        path
    }

    pub fn pipeline_config(&self, lookup: Option<&Path>) -> PipelineConfig {
        PipelineConfig {
            worker_count: self.worker_count,
            call_timeout: self.call_timeout,
            lookup: lookup.map(|p| LookupConfig::new(p.to_string_lossy())),
        }
    }

    /// Pipeline with the real text adapter (recognition off) and the given
    /// extraction service.
    pub fn pipeline(
        &self,
        structurer: Arc<dyn StructuredExtractor>,
        lookup: Option<&Path>,
    ) -> Pipeline {
        let config = self.pipeline_config(lookup);
        let text = Arc::new(TextExtractor::new(&OcrConfig {
            enabled: false,
            ..OcrConfig::default()
        }));
        Pipeline::with_services(config, text, structurer)
    }

    pub fn run(
        &self,
        structurer: Arc<dyn StructuredExtractor>,
        lookup: Option<&Path>,
    ) -> Result<BatchReport, BatchError> {
        self.pipeline(structurer, lookup)
            .run(&self.batch_dir, &NoopProgress, &CancelToken::new())
    }

    /// File names at the top of the batch directory, sorted.
    pub fn batch_files(&self) -> Vec<String> {
        list_names(&self.batch_dir)
    }

    /// File names in the quarantine directory, sorted.
    pub fn quarantined_files(&self) -> Vec<String> {
        list_names(&self.batch_dir.join(nfbatch::storage::QUARANTINE_DIR))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
