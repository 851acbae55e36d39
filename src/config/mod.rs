//! Configuration for agsync.
//!
//! Two layers, each owned by a different file:
//!
//! 1. **Global configuration** (`~/.agsync/config.toml`, see [`GlobalConfig`]):
//!    network endpoints and retry policy, cache location, audit sink,
//!    extra ignore patterns for local origins, and custom consumers. Never
//!    committed anywhere; the CLI accepts `--config` / `AGSYNC_CONFIG` to
//!    point elsewhere.
//! 2. **Project settings** (the `config` block of `.agsync/state.json`, see
//!    [`crate::state::StateConfig`]): preferred consumers, default scope,
//!    history limit and update strategy. Edited through `agsync config`.

mod global;

pub use global::{AuditConfig, AuditSinkKind, GlobalConfig};
