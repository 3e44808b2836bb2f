//! Durable buffering of uploaded files.
//!
//! Every upload is written to the upload directory before it is parsed. The
//! stored name is what components record as their `source_file`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// An upload that has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// The unique name the file was stored under.
    pub stored_name: String,
    /// Full path to the stored file.
    pub path: PathBuf,
}

/// Writes uploads into a single directory under unique names.
#[derive(Debug, Clone)]
pub struct UploadStore {
    directory: PathBuf,
}

impl UploadStore {
    /// Opens the upload directory, creating it if necessary.
    pub fn new(directory: impl Into<PathBuf>) -> EngineResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| EngineError::UploadStorage {
            path: directory.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { directory })
    }

    /// The directory uploads are written to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Stores `bytes` under a name derived from `original_name`.
    ///
    /// If the name is already taken a short random suffix is inserted before
    /// the extension.
    pub fn save(&self, original_name: &str, bytes: &[u8]) -> EngineResult<StoredUpload> {
        let base = sanitize_file_name(original_name);
        let mut candidate = base.clone();

        loop {
            let path = self.directory.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)
                        .and_then(|_| file.sync_all())
                        .map_err(|e| storage_error(&path, e))?;
                    debug!(stored_name = %candidate, bytes = bytes.len(), "Stored upload");
                    return Ok(StoredUpload {
                        stored_name: candidate,
                        path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&base);
                }
                Err(e) => return Err(storage_error(&path, e)),
            }
        }
    }

    /// Removes a stored upload that is no longer referenced.
    pub fn discard(&self, upload: &StoredUpload) -> EngineResult<()> {
        fs::remove_file(&upload.path).map_err(|e| storage_error(&upload.path, e))?;
        debug!(stored_name = %upload.stored_name, "Discarded upload");
        Ok(())
    }
}

fn storage_error(path: &Path, error: std::io::Error) -> EngineError {
    EngineError::UploadStorage {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

/// Reduces a client-supplied name to a safe single path component.
fn sanitize_file_name(original_name: &str) -> String {
    let last_component = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = last_component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn with_suffix(name: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    let suffix = &token[..7];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{name}_{suffix}"),
    }
}
