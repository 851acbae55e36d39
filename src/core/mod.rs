//! Core types and functionality for agsync
//!
//! This module forms the foundation of agsync's type system:
//! - [`error`] - the error taxonomy ([`AgsyncError`]) and CLI-facing [`ErrorContext`]
//! - [`file_error`] - structured file-operation errors
//! - [`resource`] - resource kinds, install targets, and discovered items
//!
//! All core types are thread-safe: [`ResourceKind`] and [`Scope`] are `Copy`,
//! and [`AgsyncError`] is `Clone` so it can be copied into per-target reports.

pub mod error;
pub mod file_error;
pub mod resource;

pub use error::{AgsyncError, ErrorContext, user_friendly_error};
pub use file_error::{FileOperation, FileOperationError, FileResultExt};
pub use resource::{
    DiscoveredItem, InstallMode, InstallTarget, StagedFile, KindMetadata, ResourceKind, Scope,
};
