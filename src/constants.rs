//! Global constants used throughout the agsync codebase.
//!
//! This module contains retry parameters, size limits, schema identifiers and
//! other values that are used across multiple modules. Defining them centrally
//! makes magic numbers more discoverable.

use std::time::Duration;

/// Schema version written to and expected from the state file.
///
/// A state file carrying any other value is refused on load; there is no
/// automatic migration.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Directory (relative to the project root or the home directory) holding agsync data.
pub const AGSYNC_DIR: &str = ".agsync";

/// File name of the persisted state file inside [`AGSYNC_DIR`].
pub const STATE_FILE_NAME: &str = "state.json";

/// Default number of history snapshots kept per installed resource.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Default number of attempts for a network fetch (first try included).
pub const DEFAULT_FETCH_ATTEMPTS: usize = 3;

/// Starting delay for network retry backoff (250ms).
///
/// This is the initial delay used in exponential backoff calculations,
/// which doubles on each retry attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 250;

/// Maximum backoff delay for network retries (4s).
pub const MAX_BACKOFF_DELAY_MS: u64 = 4_000;

/// Per-request timeout for archive downloads and registry lookups.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted size of a downloaded archive (100 MiB).
pub const MAX_ARCHIVE_BYTES: u64 = 100 * 1024 * 1024;

/// Maximum number of files collected from a single origin.
pub const MAX_ACQUIRED_FILES: usize = 10_000;

/// Maximum length of an install name after sanitization.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum YAML frontmatter size in bytes (defense-in-depth against DoS)
pub const MAX_FRONTMATTER_SIZE_BYTES: usize = 64 * 1024;

/// Default npm-compatible registry used for registry origins.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Directory and file names never collected from local origins.
pub const DEFAULT_IGNORED_NAMES: &[&str] = &[
    ".git",
    "node_modules",
    ".DS_Store",
    "target",
    "__pycache__",
    ".venv",
    ".idea",
    ".vscode",
];

/// Glob-style name patterns never collected from local origins.
pub const DEFAULT_IGNORED_PATTERNS: &[&str] = &["*.log", "*.tmp", "*.swp", ".env*"];

/// Path segments treated as containers rather than categories during naming.
pub const CONTAINER_SEGMENTS: &[&str] =
    &["skills", "agents", "commands", "resources", "src", ".claude", ".github"];

/// Maximum total size of files unpacked from one archive (512 MiB).
pub const MAX_UNPACKED_BYTES: u64 = 512 * 1024 * 1024;

/// Base URL for GitHub repository tarballs.
pub const GITHUB_ARCHIVE_URL: &str = "https://codeload.github.com";

/// Base URL for GitLab repositories.
pub const GITLAB_URL: &str = "https://gitlab.com";

/// Subdirectory of the cache directory holding persistent staging trees.
pub const STAGING_DIR_NAME: &str = "staging";

/// Marker file of an agent item.
pub const AGENT_MARKER: &str = "AGENT.md";

/// Marker file of a command item.
pub const COMMAND_MARKER: &str = "COMMAND.md";

/// File stem of a skill marker.
pub const SKILL_MARKER_STEM: &str = "SKILL";

/// Extensions accepted for a skill marker, in lookup order.
pub const SKILL_MARKER_EXTENSIONS: &[&str] = &["md", "markdown", "mdx"];

/// Maximum number of files in one skill.
pub const MAX_SKILL_FILES: usize = 1000;

/// Maximum total size of one skill.
pub const MAX_SKILL_SIZE_BYTES: u64 = 100 * 1024 * 1024;
