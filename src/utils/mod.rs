//! Cross-platform utilities for agsync
//!
//! - [`fs`] - atomic writes, directory creation, path normalization
//! - [`security`] - system directory blacklist and staging containment checks

pub mod fs;
pub mod security;

pub use fs::{atomic_write, ensure_dir, normalize_path, remove_path};
