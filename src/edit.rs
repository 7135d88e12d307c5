use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The write primitive: a whole-file rewrite verified against the content it
/// was computed from.
///
/// Every patch run reads a file once, transforms it in memory and then hands
/// the result to a `FileEdit`. The edit refuses to write if the file changed
/// on disk in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileEdit does nothing until apply() is called"]
pub struct FileEdit {
    /// Path of the file to rewrite
    pub file: PathBuf,
    /// Content the edit was computed from
    pub expected_before: String,
    /// Full replacement content
    pub new_text: String,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("{} changed on disk since it was read", .file.display())]
    Conflict { file: PathBuf },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    /// File was rewritten
    Applied { file: PathBuf, bytes_written: usize },
    /// File already holds `new_text`
    AlreadyApplied { file: PathBuf },
}

impl FileEdit {
    pub fn new(
        file: impl Into<PathBuf>,
        expected_before: impl Into<String>,
        new_text: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            expected_before: expected_before.into(),
            new_text: new_text.into(),
        }
    }

    /// True if the edit would not change anything.
    pub fn is_noop(&self) -> bool {
        self.expected_before == self.new_text
    }

    /// Check the current on-disk bytes against what the edit expects.
    fn verify(&self, current: &[u8]) -> Result<Option<EditResult>, EditError> {
        if current == self.new_text.as_bytes() {
            return Ok(Some(EditResult::AlreadyApplied {
                file: self.file.clone(),
            }));
        }

        if current != self.expected_before.as_bytes() {
            return Err(EditError::Conflict {
                file: self.file.clone(),
            });
        }

        Ok(None)
    }

    /// Apply this edit atomically.
    ///
    /// Uses tempfile + fsync + rename, so the target is either fully
    /// rewritten or left untouched.
    pub fn apply(&self) -> Result<EditResult, EditError> {
        let current = fs::read(&self.file)?;

        if let Some(result) = self.verify(&current)? {
            return Ok(result);
        }

        atomic_write(&self.file, self.new_text.as_bytes())?;

        Ok(EditResult::Applied {
            file: self.file.clone(),
            bytes_written: self.new_text.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The tempfile lives in the target's directory so the rename stays on one
/// filesystem. Permissions of an existing target are carried over. A symlink
/// is resolved first, so the file it points to is rewritten and the link
/// stays a link.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let path = resolved.as_path();

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(EditError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            )))
        }
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
