//! Error handling for agsync
//!
//! This module provides the error taxonomy and user-friendly error reporting for
//! agsync. The error system is designed around two core principles:
//! 1. **Strongly-typed errors** for precise error handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`AgsyncError`] - Enumerated error types for all failure cases
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! # Propagation Policy
//!
//! - [`AgsyncError::Validation`] and [`AgsyncError::PathSecurityViolation`] are
//!   recovered locally: the offending item or archive entry is skipped and the
//!   batch continues.
//! - [`AgsyncError::AlreadyExists`] and [`AgsyncError::SchemaVersionMismatch`]
//!   are surfaced to the caller to decide.
//! - [`AgsyncError::Network`] is retried internally and only surfaced once the
//!   attempt cap is exhausted.
//!
//! # Examples
//!
//! ```rust,no_run
//! use agsync_cli::core::{AgsyncError, ErrorContext, user_friendly_error};
//!
//! let error = AgsyncError::NotFound {
//!     what: "resource 'frontend-react-patterns'".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for agsync operations
///
/// Every variant carries plain data (no boxed sources) so errors can be cloned
/// into per-target outcome reports and audit records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgsyncError {
    /// Item failed validation and will not be installed anywhere
    #[error("Resource '{name}' failed validation: {}", reasons.join("; "))]
    Validation {
        /// Resolved name of the item (may be empty when the name itself is invalid)
        name: String,
        /// Each blocking validation error
        reasons: Vec<String>,
    },

    /// Install target already exists and `force` was not requested
    #[error("Install target already exists: {path}")]
    AlreadyExists {
        /// The colliding install path
        path: String,
    },

    /// Something the caller explicitly asked for does not exist
    #[error("Not found: {what}")]
    NotFound {
        /// Human-readable description of the missing thing
        what: String,
    },

    /// An archive entry or listing path escaped its root
    #[error("Path security violation for '{entry}': {reason}")]
    PathSecurityViolation {
        /// The offending entry, relative to its root
        entry: String,
        /// Why the entry was rejected
        reason: String,
    },

    /// State file was written by an incompatible schema version
    #[error("State file {path} has schema version {found}, expected {expected}")]
    SchemaVersionMismatch {
        /// Path of the refused state file
        path: String,
        /// Schema version this build understands
        expected: u32,
        /// Schema version found in the file (`"missing"` when absent)
        found: String,
    },

    /// Network fetch failed after exhausting retries
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// What was being fetched (e.g. "archive download")
        operation: String,
        /// Final failure reason
        reason: String,
    },

    /// Link-mode install requested but the staged source is gone
    #[error("Cannot link {target}: staged source {source_path} does not exist")]
    LinkSourceMissing {
        /// Staged path that was expected to exist
        source_path: String,
        /// Install path that would have pointed at it
        target: String,
    },

    /// Consumer id is not declared in the target layout
    #[error("Unknown consumer '{consumer}'")]
    UnknownConsumer {
        /// The unrecognized consumer id
        consumer: String,
    },

    /// Consumer does not declare a directory for the requested kind
    #[error("Consumer '{consumer}' does not support resource kind '{kind}'")]
    UnsupportedKind {
        /// Consumer id
        consumer: String,
        /// Requested resource kind
        kind: String,
    },

    /// Consumer declares the kind but not for the requested scope
    #[error("Consumer '{consumer}' has no {scope} directory for resource kind '{kind}'")]
    UnsupportedScope {
        /// Consumer id
        consumer: String,
        /// Requested resource kind
        kind: String,
        /// Requested scope
        scope: String,
    },

    /// No handler registered for the requested kind
    #[error("No handler registered for resource kind '{kind}'")]
    UnknownKind {
        /// Requested resource kind
        kind: String,
    },

    /// Origin string could not be used
    #[error("Invalid origin '{origin}': {reason}")]
    InvalidOrigin {
        /// Raw origin string
        origin: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// File system error
    #[error("File system error: {operation} ({path})")]
    FileSystem {
        /// Operation that failed
        operation: String,
        /// Path involved
        path: String,
    },

    /// Generic error with a message
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl AgsyncError {
    /// Short machine-friendly label for the error category.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation {
                ..
            } => "validation",
            Self::AlreadyExists {
                ..
            } => "already-exists",
            Self::NotFound {
                ..
            } => "not-found",
            Self::PathSecurityViolation {
                ..
            } => "path-security-violation",
            Self::SchemaVersionMismatch {
                ..
            } => "schema-version-mismatch",
            Self::Network {
                ..
            } => "network",
            Self::LinkSourceMissing {
                ..
            } => "link-source-missing",
            Self::UnknownConsumer {
                ..
            }
            | Self::UnsupportedKind {
                ..
            }
            | Self::UnsupportedScope {
                ..
            } => "layout",
            Self::UnknownKind {
                ..
            } => "unknown-kind",
            Self::InvalidOrigin {
                ..
            } => "invalid-origin",
            Self::Config {
                ..
            } => "config",
            Self::FileSystem {
                ..
            } => "filesystem",
            Self::Other {
                ..
            } => "other",
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show:
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context about the error in yellow (optional)
/// 3. **Suggestion**: Actionable steps to resolve the issue in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: AgsyncError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: AgsyncError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining why the error happened.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`AgsyncError`] anywhere in the chain, common [`std::io::Error`]
/// kinds, and TOML configuration errors; everything else is rendered with its
/// full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(agsync_error) = error.chain().find_map(|e| e.downcast_ref::<AgsyncError>()) {
        let mut ctx = create_error_context(agsync_error.clone());
        // Keep the outer context (which item / target failed) visible
        let outer = error.to_string();
        if outer != agsync_error.to_string() && ctx.details.is_none() {
            ctx.details = Some(outer);
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(AgsyncError::FileSystem {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check file ownership and permissions of the target directories")
                .with_details(io_error.to_string());
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(AgsyncError::FileSystem {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details(io_error.to_string());
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(AgsyncError::Config {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in ~/.agsync/config.toml (or $AGSYNC_CONFIG)");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(AgsyncError::Other {
        message,
    })
}

/// Map each [`AgsyncError`] variant to tailored suggestions.
fn create_error_context(error: AgsyncError) -> ErrorContext {
    match &error {
        AgsyncError::Validation { .. } => ErrorContext::new(error)
            .with_suggestion("Fix the resource's frontmatter (name/description) or check that the origin contains the expected marker files"),

        AgsyncError::AlreadyExists { .. } => ErrorContext::new(error)
            .with_suggestion("Re-run with --force to replace the existing install"),

        AgsyncError::NotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'agsync list' to see what is installed"),

        AgsyncError::SchemaVersionMismatch { .. } => ErrorContext::new(error)
            .with_suggestion("This state file was written by a different agsync release; upgrade agsync or move the file aside")
            .with_details("agsync never migrates state files automatically"),

        AgsyncError::Network { .. } => ErrorContext::new(error)
            .with_suggestion("Check your connection and the origin URL; retries were already attempted"),

        AgsyncError::LinkSourceMissing { .. } => ErrorContext::new(error)
            .with_suggestion("Re-acquire the origin or install in copy mode (omit --link)"),

        AgsyncError::UnknownConsumer { .. } => ErrorContext::new(error)
            .with_suggestion("Use one of: claude-code, cursor, codex, opencode, copilot, or declare it under [consumers] in the config"),

        AgsyncError::UnsupportedKind { .. } | AgsyncError::UnsupportedScope { .. } => ErrorContext::new(error)
            .with_suggestion("Pick a consumer that supports this kind, or declare the directory under [consumers] in the config"),

        AgsyncError::InvalidOrigin { .. } => ErrorContext::new(error)
            .with_suggestion("Use ./path, owner/name, a https:// archive URL, or registry:<package>"),

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_validation_message_joins_reasons() {
        let err = AgsyncError::Validation {
            name: "x".to_string(),
            reasons: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Resource 'x' failed validation: a; b");
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_user_friendly_error_finds_typed_error_in_chain() {
        let err = anyhow::Error::from(AgsyncError::AlreadyExists {
            path: ".claude/skills/demo".to_string(),
        })
        .context("installing 'demo' for claude-code");

        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, AgsyncError::AlreadyExists { .. }));
        assert!(ctx.suggestion.unwrap().contains("--force"));
        assert_eq!(ctx.details.as_deref(), Some("installing 'demo' for claude-code"));
    }

    #[test]
    fn test_user_friendly_error_generic_includes_chain() {
        let result: Result<(), std::fmt::Error> = Err(std::fmt::Error);
        let err = result.context("outer").unwrap_err();
        let ctx = user_friendly_error(err);
        let text = ctx.to_string();
        assert!(text.contains("outer"));
        assert!(text.contains("Caused by"));
    }
}
