use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Subdirectory of a batch directory that holds rejected originals.
pub const QUARANTINE_DIR: &str = "quarentena";

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to copy + delete for cross-device moves.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Splits `name.ext` into `("name", Some(".ext"))`. Leading dots are not extensions.
fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    }
}

fn numbered_name(filename: &str, counter: u32) -> String {
    if counter == 1 {
        return filename.to_string();
    }
    match split_extension(filename) {
        (base, Some(ext)) => format!("{}_{}{}", base, counter, ext),
        (base, None) => format!("{}_{}", base, counter),
    }
}

/// File operations on one batch directory. The directory is owned by a single
/// batch for its whole lifetime.
pub struct BatchStorage {
    root: PathBuf,
}

impl BatchStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join(QUARANTINE_DIR)
    }

    /// Writes `content` under `filename` in the batch root, appending `_2`,
    /// `_3`, ... when the name is taken. Creation is exclusive (`create_new`),
    /// so an existing file is never overwritten.
    pub fn write_unique(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        use std::io::Write;

        for counter in 1..=MAX_NAME_ATTEMPTS {
            let try_path = self.root.join(numbered_name(filename, counter));

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::NameExhausted {
            directory: self.root.clone(),
            name: filename.to_string(),
        })
    }

    /// Moves `source` into the quarantine directory, keeping its file name
    /// unless that name is already taken there.
    pub fn quarantine(&self, source: &Path) -> Result<PathBuf, StorageError> {
        let quarantine_dir = self.quarantine_dir();
        ensure_directory(&quarantine_dir)?;

        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("documento");
        let target = resolve_conflict(&quarantine_dir, filename)?;

        move_file(source, &target)?;
        Ok(target)
    }

    /// Renames a file inside the batch root. Fails when the target name is
    /// already taken, broken symlinks included.
    pub fn rename(&self, source: &Path, filename: &str) -> Result<PathBuf, StorageError> {
        let target = self.root.join(filename);
        if std::fs::symlink_metadata(&target).is_ok() {
            return Err(StorageError::TargetExists { path: target });
        }
        move_file(source, &target)?;
        Ok(target)
    }
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Returns the first free `name`, `name_2`, ... path in `directory`.
/// `symlink_metadata` is used so broken symlinks count as taken.
fn resolve_conflict(directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
    for counter in 1..=MAX_NAME_ATTEMPTS {
        let candidate = directory.join(numbered_name(filename, counter));
        if std::fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    Err(StorageError::NameExhausted {
        directory: directory.to_path_buf(),
        name: filename.to_string(),
    })
}
