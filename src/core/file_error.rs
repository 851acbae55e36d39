//! Structured file system error handling for agsync
//!
//! This module captures context at the operation site (what was being done,
//! to which path, and why) rather than parsing error messages afterwards.

use std::path::PathBuf;
use thiserror::Error;

/// Kind of file system operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    ReadDir,
    CreateDir,
    Remove,
    Link,
    Metadata,
    Canonicalize,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::ReadDir => write!(f, "reading directory"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Remove => write!(f, "removing"),
            FileOperation::Link => write!(f, "creating symlink"),
            FileOperation::Metadata => write!(f, "getting metadata of"),
            FileOperation::Canonicalize => write!(f, "resolving path"),
        }
    }
}

/// Error from a file system call, annotated with operation, path and purpose.
#[derive(Error, Debug)]
#[error("Failed {operation} '{}' while {purpose}", file_path.display())]
pub struct FileOperationError {
    pub operation: FileOperation,
    pub file_path: PathBuf,
    pub purpose: String,
    #[source]
    pub source: std::io::Error,
}

impl FileOperationError {
    /// Longer message with a hint tailored to the I/O error kind.
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        match self.source.kind() {
            std::io::ErrorKind::NotFound => {
                message.push_str("\n\nThe path does not exist.");
            }
            std::io::ErrorKind::PermissionDenied => {
                message.push_str(&format!(
                    "\n\nPermission denied. Check file/directory permissions for: {}",
                    self.file_path.display()
                ));
            }
            std::io::ErrorKind::InvalidData => {
                message.push_str("\n\nThe file contains invalid data or encoding.");
            }
            _ => {
                message.push_str(&format!("\n\nError details: {}", self.source));
            }
        }
        message
    }
}

/// Extension trait attaching [`FileOperationError`] context to I/O results.
pub trait FileResultExt<T> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for Result<T, std::io::Error> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|source| FileOperationError {
            operation,
            file_path: file_path.into(),
            purpose: purpose.into(),
            source,
        })
    }
}
