//! Batch intake ("Guardian").
//!
//! Unpacks archives found at the top of a batch directory, admits files whose
//! extension is on the allow-list under a normalized `nota_original_NNN.ext`
//! name, and moves everything else into the quarantine subdirectory.

pub mod archive;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::DocumentFormat;
use crate::error::StorageError;
use crate::sanitize::redact_path;
use crate::storage::filesystem::ensure_directory;
use crate::storage::BatchStorage;

pub use archive::{ArchiveError, ArchiveKind};

pub const NORMALIZED_PREFIX: &str = "nota_original_";

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Batch directory '{0}' does not exist or is not a directory")]
    MissingDirectory(PathBuf),

    #[error("Failed to read batch directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to prepare batch directory: {0}")]
    Storage(#[from] StorageError),
}

/// One admitted source file. Immutable once intake is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeUnit {
    pub original_name: String,
    pub normalized_name: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntakeReport {
    pub admitted: Vec<IntakeUnit>,
    pub quarantined: Vec<String>,
    pub warnings: Vec<String>,
    pub archives_unpacked: usize,
    pub files_renamed: usize,
    pub files_quarantined: usize,
}

pub fn normalized_name(sequence: usize, extension: &str) -> String {
    format!("{}{:03}.{}", NORMALIZED_PREFIX, sequence, extension.to_lowercase())
}

struct Candidate {
    original_name: String,
    current: PathBuf,
    target_name: String,
    format: DocumentFormat,
}

#[derive(Debug, Default, Clone)]
pub struct Guardian;

impl Guardian {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, batch_dir: &Path) -> Result<IntakeReport, IntakeError> {
        let root = std::fs::canonicalize(batch_dir)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| IntakeError::MissingDirectory(batch_dir.to_path_buf()))?;

        let _span = tracing::info_span!("intake", batch = %redact_path(&root)).entered();

        let storage = BatchStorage::new(&root);
        ensure_directory(&storage.quarantine_dir())?;

        let mut report = IntakeReport::default();
        self.unpack_archives(&storage, &mut report)?;

        let mut candidates = Vec::new();
        for path in list_files(&root)? {
            let name = file_name(&path);
            match DocumentFormat::from_path(&path) {
                Some(format) => {
                    let extension = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or_default();
                    candidates.push(Candidate {
                        original_name: name,
                        current: path.clone(),
                        target_name: normalized_name(candidates.len() + 1, extension),
                        format,
                    });
                }
                None => match storage.quarantine(&path) {
                    Ok(_) => {
                        tracing::info!(file = %name, "Quarantined file with unsupported type");
                        report.quarantined.push(name);
                        report.files_quarantined += 1;
                    }
                    Err(e) => {
                        tracing::warn!(file = %name, "Failed to quarantine: {}", e);
                        report.warnings.push(format!("Failed to quarantine '{}': {}", name, e));
                    }
                },
            }
        }

        self.rename_admitted(&storage, candidates, &mut report);

        tracing::info!(
            admitted = report.admitted.len(),
            quarantined = report.files_quarantined,
            archives = report.archives_unpacked,
            renamed = report.files_renamed,
            "Intake finished"
        );

        Ok(report)
    }

    /// Unpacks top-level archives until a full pass unpacks nothing. An archive
    /// that fails once is not retried and stays in place.
    fn unpack_archives(
        &self,
        storage: &BatchStorage,
        report: &mut IntakeReport,
    ) -> Result<(), IntakeError> {
        let mut failed: HashSet<PathBuf> = HashSet::new();

        loop {
            let mut unpacked_any = false;

            for path in list_files(storage.root())? {
                let Some(kind) = ArchiveKind::from_path(&path) else {
                    continue;
                };
                if failed.contains(&path) {
                    continue;
                }

                let name = file_name(&path);
                match archive::extract_flat(&path, kind, storage) {
                    Ok(extracted) => {
                        tracing::info!(archive = %name, files = extracted.len(), "Unpacked archive");
                        report.archives_unpacked += 1;
                        unpacked_any = true;

                        if let Err(e) = std::fs::remove_file(&path) {
                            tracing::warn!(archive = %name, "Failed to remove unpacked archive: {}", e);
                            report
                                .warnings
                                .push(format!("Failed to remove archive '{}': {}", name, e));
                            failed.insert(path);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(archive = %name, "Failed to unpack archive: {}", e);
                        report
                            .warnings
                            .push(format!("Failed to unpack archive '{}': {}", name, e));
                        failed.insert(path);
                    }
                }
            }

            if !unpacked_any {
                return Ok(());
            }
        }
    }

    /// Two-phase rename: every file that is not already at its target moves to
    /// a temporary name first, so no target is ever overwritten.
    fn rename_admitted(
        &self,
        storage: &BatchStorage,
        candidates: Vec<Candidate>,
        report: &mut IntakeReport,
    ) {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let mut staged = Vec::with_capacity(candidates.len());

        for (index, mut candidate) in candidates.into_iter().enumerate() {
            if file_name(&candidate.current) == candidate.target_name {
                staged.push((candidate, false));
                continue;
            }

            let temp_name = format!(".intake-{}-{:04}.tmp", run_id, index);
            match storage.rename(&candidate.current, &temp_name) {
                Ok(temp_path) => {
                    candidate.current = temp_path;
                    staged.push((candidate, true));
                }
                Err(e) => {
                    tracing::warn!(file = %candidate.original_name, "Failed to stage rename: {}", e);
                    report.warnings.push(format!(
                        "Failed to rename '{}': {}",
                        candidate.original_name, e
                    ));
                }
            }
        }

        for (candidate, needs_rename) in staged {
            let path = if needs_rename {
                match storage.rename(&candidate.current, &candidate.target_name) {
                    Ok(path) => {
                        report.files_renamed += 1;
                        path
                    }
                    Err(e) => {
                        tracing::warn!(file = %candidate.original_name, "Failed to rename: {}", e);
                        report.warnings.push(format!(
                            "Failed to rename '{}': {}",
                            candidate.original_name, e
                        ));
                        continue;
                    }
                }
            } else {
                candidate.current
            };

            tracing::debug!(
                original = %candidate.original_name,
                normalized = %candidate.target_name,
                "Admitted file"
            );
            report.admitted.push(IntakeUnit {
                original_name: candidate.original_name,
                normalized_name: candidate.target_name,
                path,
                format: candidate.format,
            });
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Regular files directly inside `dir`, in file-name order.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, IntakeError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| IntakeError::ReadDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
