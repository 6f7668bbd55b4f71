use crate::error::{CasePilotError, Result};
use std::path::{Path, PathBuf};

/// Maximum document size accepted for upload (50MB)
pub const MAX_DOCUMENT_SIZE: u64 = 50 * 1024 * 1024;

pub const MIN_PROJECT_NAME_LEN: usize = 2;

/// Validate a document chosen for upload.
///
/// Returns the canonical path, the file name and the size in bytes. The
/// backend decides how to read the content (.docx, .doc, or plain text), so
/// the extension is not checked here.
pub fn validate_document(path: &Path) -> Result<(PathBuf, String, u64)> {
    let canonical = path.canonicalize().map_err(|e| {
        CasePilotError::Validation(format!(
            "Failed to resolve path '{}': {}",
            path.display(),
            e
        ))
    })?;

    let metadata = std::fs::metadata(&canonical)?;
    if !metadata.is_file() {
        return Err(CasePilotError::Validation(format!(
            "Not a file: {}",
            canonical.display()
        )));
    }

    let size = metadata.len();
    if size == 0 {
        return Err(CasePilotError::Validation(format!(
            "File is empty: {}",
            canonical.display()
        )));
    }
    if size > MAX_DOCUMENT_SIZE {
        return Err(CasePilotError::Validation(format!(
            "File size ({} bytes) exceeds maximum allowed size ({} bytes)",
            size, MAX_DOCUMENT_SIZE
        )));
    }

    let file_name = canonical
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CasePilotError::Validation("Invalid file name".to_string()))?
        .to_string();

    Ok((canonical, file_name, size))
}

/// A defect report needs a description before anything is sent.
pub fn validate_bug_description(description: &str) -> Result<String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(CasePilotError::Validation(
            "Please describe the bug before submitting.".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_project_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_PROJECT_NAME_LEN {
        return Err(CasePilotError::Validation(format!(
            "Project name must be at least {} characters.",
            MIN_PROJECT_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_validate_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("requirements.docx");
        fs::write(&path, b"requirements text").unwrap();

        let (canonical, name, size) = validate_document(&path).unwrap();
        assert!(canonical.is_absolute());
        assert_eq!(name, "requirements.docx");
        assert_eq!(size, 9);
    }

    #[test]
    fn test_validate_document_rejects_bad_inputs() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            validate_document(&missing),
            Err(CasePilotError::Validation(_))
        ));

        assert!(matches!(
            validate_document(dir.path()),
            Err(CasePilotError::Validation(_))
        ));

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(
            validate_document(&empty),
            Err(CasePilotError::Validation(_))
        ));
    }

    #[test]
    fn test_bug_description() {
        assert!(validate_bug_description("").is_err());
        assert!(validate_bug_description("   \n").is_err());
        assert_eq!(
            validate_bug_description("  Button does nothing ").unwrap(),
            "Button does nothing"
        );
    }

    #[test]
    fn test_project_name() {
        assert!(validate_project_name("x").is_err());
        assert!(validate_project_name(" a ").is_err());
        assert_eq!(validate_project_name(" QA ").unwrap(), "QA");
        // Character count, not bytes
        assert_eq!(validate_project_name("Ят").unwrap(), "Ят");
    }
}
