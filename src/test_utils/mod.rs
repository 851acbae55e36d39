//! Test utilities for agsync
//!
//! Helpers shared by unit and integration tests: an isolated project/home/cache
//! layout, resource marker fixtures, and tarball builders for archive origins.
//!
//! # Example
//!
//! ```rust,no_run
//! use agsync_cli::test_utils::{MarkdownFixture, SourceTreeFixture, TestEnvironment};
//!
//! let env = TestEnvironment::new().unwrap();
//! SourceTreeFixture::new()
//!     .with_file(MarkdownFixture::skill("pdf", "Read PDFs").at("skills/pdf"))
//!     .write_to(env.sources_path())
//!     .unwrap();
//! ```

pub mod environment;
pub mod fixtures;

pub use environment::TestEnvironment;
pub use fixtures::{MarkdownFixture, SourceTreeFixture, raw_tarball};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=agsync_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
