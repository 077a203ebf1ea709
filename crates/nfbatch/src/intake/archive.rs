use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

use crate::error::StorageError;
use crate::storage::BatchStorage;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive: {0}")]
    OpenFailed(#[source] std::io::Error),

    #[error("Failed to read archive entry '{name}': {source}")]
    ReadEntry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to write extracted file: {0}")]
    Storage(#[from] StorageError),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            _ => None,
        }
    }
}

/// Extracts every file of the archive directly into the batch root, dropping
/// the directory structure. Returns the written paths.
///
/// Entries are read fully before anything is written, so a corrupt archive
/// leaves the batch directory as it was.
pub fn extract_flat(
    archive_path: &Path,
    kind: ArchiveKind,
    storage: &BatchStorage,
) -> Result<Vec<PathBuf>, ArchiveError> {
    match kind {
        ArchiveKind::Zip => {
            let entries = read_zip_entries(archive_path)?;
            let mut written = Vec::with_capacity(entries.len());
            for (name, content) in entries {
                written.push(storage.write_unique(&name, &content)?);
            }
            Ok(written)
        }
        ArchiveKind::Rar => Err(ArchiveError::UnsupportedFormat(
            "rar archives cannot be unpacked".to_string(),
        )),
    }
}

fn read_zip_entries(archive_path: &Path) -> Result<Vec<(String, Vec<u8>)>, ArchiveError> {
    let file = File::open(archive_path).map_err(ArchiveError::OpenFailed)?;
    let mut archive = ZipArchive::new(file)?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let raw_name = entry.name().to_string();

        if entry.is_dir() || raw_name.starts_with("__MACOSX") {
            continue;
        }

        // enclosed_name rejects absolute paths and `..` components
        let Some(filename) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        else {
            tracing::warn!(entry = %raw_name, "Skipping archive entry with unsafe path");
            continue;
        };

        if filename.starts_with('.') {
            continue;
        }

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| ArchiveError::ReadEntry {
                name: raw_name.clone(),
                source: e,
            })?;
        entries.push((filename, content));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_archive_kind_from_path() {
        assert_eq!(ArchiveKind::from_path(Path::new("lote.ZIP")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_path(Path::new("lote.rar")), Some(ArchiveKind::Rar));
        assert_eq!(ArchiveKind::from_path(Path::new("lote.7z")), None);
        assert_eq!(ArchiveKind::from_path(Path::new("zip")), None);
    }

    #[test]
    fn test_extract_flattens_and_skips_metadata() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("lote.zip");
        write_zip(
            &archive,
            &[
                ("marco/", b""),
                ("marco/nota1.pdf", b"%PDF-1"),
                ("marco/abril/nota2.png", b"png"),
                ("__MACOSX/marco/._nota1.pdf", b"junk"),
                ("marco/.DS_Store", b"junk"),
            ],
        );

        let storage = BatchStorage::new(dir.path());
        let mut written = extract_flat(&archive, ArchiveKind::Zip, &storage).unwrap();
        written.sort();

        assert_eq!(
            written,
            vec![dir.path().join("nota1.pdf"), dir.path().join("nota2.png")]
        );
        assert_eq!(std::fs::read(dir.path().join("nota1.pdf")).unwrap(), b"%PDF-1");
        assert!(!dir.path().join("marco").exists());
        assert!(archive.exists());
    }

    #[test]
    fn test_extract_name_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("nota.pdf"), b"existing").unwrap();
        let archive = dir.path().join("lote.zip");
        write_zip(&archive, &[("a/nota.pdf", b"first"), ("b/nota.pdf", b"second")]);

        let storage = BatchStorage::new(dir.path());
        extract_flat(&archive, ArchiveKind::Zip, &storage).unwrap();

        assert_eq!(std::fs::read(dir.path().join("nota.pdf")).unwrap(), b"existing");
        assert_eq!(std::fs::read(dir.path().join("nota_2.pdf")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join("nota_3.pdf")).unwrap(), b"second");
    }

    #[test]
    fn test_corrupt_zip_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("quebrado.zip");
        std::fs::write(&archive, b"PK\x03\x04 this is not really a zip").unwrap();

        let storage = BatchStorage::new(dir.path());
        let result = extract_flat(&archive, ArchiveKind::Zip, &storage);

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rar_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("lote.rar");
        std::fs::write(&archive, b"Rar!").unwrap();

        let result = extract_flat(&archive, ArchiveKind::Rar, &BatchStorage::new(dir.path()));
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat(_))));
    }
}
