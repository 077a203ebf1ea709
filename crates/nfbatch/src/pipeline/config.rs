use std::time::Duration;

use crate::config::{Config, LookupConfig};

/// The subset of [`Config`] the pipeline reads.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub worker_count: usize,
    pub call_timeout: Duration,
    pub lookup: Option<LookupConfig>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_count: config.worker_count.max(1),
            call_timeout: Duration::from_secs(config.extraction.timeout_secs),
            lookup: config.lookup.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
