//! agsync - resource synchronizer for coding assistants
//!
//! agsync installs versioned resources (skills, agents and commands) from
//! heterogeneous origins into the directory layout each consuming tool reads,
//! and keeps a durable, rollback-capable record of what was installed where.
//!
//! # Architecture Overview
//!
//! ```text
//! origin string
//!   -> source::classify         typed OriginDescriptor
//!   -> acquire::Acquirer        staged files (archive download + safe extraction, or local walk)
//!   -> handlers::*::discover    DiscoveredItems with collision-resistant names (naming)
//!   -> handlers::*::install     per-consumer targets (consumers)
//!   -> state::StateStore        .agsync/state.json with history and rollback
//! ```
//!
//! Every step that touches the filesystem reports to an [`audit::AuditTrail`],
//! which redacts paths before handing records to a sink.
//!
//! # Core Modules
//!
//! - [`source`] - origin classification (remote archive, URL archive, local path, registry)
//! - [`acquire`] - download with bounded retry, defensive extraction, local indexing
//! - [`naming`] - install-name strategies and the name sanitizer
//! - [`handlers`] - the per-kind lifecycle contract and the built-in kinds
//! - [`consumers`] - per-tool target directory layouts
//! - [`state`] - the versioned state store
//! - [`audit`] - audit records, sinks and path redaction
//! - [`sync`] - the orchestrating [`sync::SyncService`]
//!
//! ## Supporting Modules
//! - [`cli`] - command-line interface
//! - [`config`] - global configuration (`~/.agsync/config.toml`)
//! - [`core`] - error taxonomy and shared resource types
//! - [`markdown`] - frontmatter and heading metadata extraction
//! - [`utils`] - filesystem and path-safety helpers
//!
//! # Origins
//!
//! ```text
//! ./skills                          local directory
//! ~/work/agents                     local directory
//! acme/skills                       GitHub repository, default branch
//! acme/skills@v1.2.0                GitHub repository at a ref
//! https://github.com/acme/skills/tree/main/packs/web
//! https://gitlab.com/acme/skills
//! https://example.com/bundle.tar.gz
//! registry:@acme/skills@1.0.0       npm-compatible registry package
//! ```
//!
//! # Limitations
//!
//! The state file has no cross-process lock. Running two agsync processes
//! against the same project at once is unsupported; the last save wins.
//! Fetches and extractions cannot be cancelled other than by terminating the
//! process.

pub mod acquire;
pub mod audit;
pub mod cli;
pub mod config;
pub mod constants;
pub mod consumers;
pub mod core;
pub mod handlers;
pub mod markdown;
pub mod naming;
pub mod source;
pub mod state;
pub mod sync;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
