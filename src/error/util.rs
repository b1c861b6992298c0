//! Utility functions for error handling
//!
//! This module provides utility functions to make error handling more convenient.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(PipelineError::io_at(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("expected a file for: {purpose}"),
            ),
        ));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                "Permission denied - check file permissions".to_string()
            }
            _ => format!("Failed to open file for: {purpose}"),
        };
        PipelineError::io_at(path, io::Error::new(e.kind(), format!("{context}: {e}")))
    })
}

/// Check that a dataset directory exists and is readable
///
/// A missing directory is fatal for the category it belongs to, so the error
/// names the category rather than the operation.
pub fn validate_directory(path: &Path, category: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(PipelineError::MissingDirectory {
            category: category.to_string(),
            path: path.to_path_buf(),
        });
    }

    fs::read_dir(path)
        .map(|_| ())
        .map_err(|e| PipelineError::io_at(path, e))
}

/// Size of a file in bytes, or zero if it cannot be read
#[must_use]
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_directory_missing() {
        let err = validate_directory(Path::new("/definitely/not/here"), "enrolment").unwrap_err();
        assert!(matches!(err, PipelineError::MissingDirectory { .. }));
        assert!(err.to_string().contains("enrolment"));
    }

    #[test]
    fn test_safe_open_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = safe_open_file(dir.path(), "reading csv").unwrap_err();
        assert!(err.to_string().contains("reading csv"));
    }
}
