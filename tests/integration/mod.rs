//! Integration test suite for agsync
//!
//! End-to-end tests against the library API and the `agsync` binary. Remote
//! origins are served by a local `wiremock` server; nothing touches the real
//! network or the user's home directory.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **add_flow**: local origins, multiple consumers, link mode, naming, audit redaction
//! - **archive**: forge tarballs, subpaths, hostile archive entries
//! - **network**: retry on transient failures, no retry on client errors, registry lookup
//! - **state**: persistence across service instances, history, rollback, schema guard
//! - **list**: disk scans, dangling links, state/disk divergence
//! - **cli**: the `agsync` binary

mod add_flow;
mod archive;
mod cli;
mod list;
mod network;
mod state;
