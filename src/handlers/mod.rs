//! Per-kind resource lifecycle.
//!
//! Every resource kind, built-in or third-party, implements [`ResourceHandler`]:
//!
//! ```text
//! Undiscovered -> Discovered -> Validated -> Installed (per target) -> Removed
//!                      \
//!                       -> Invalid (never installed)
//! ```
//!
//! The built-in kinds share almost all of their logic through [`common`]:
//!
//! - [`single_file::SingleFileHandler`] serves `agent` (`AGENT.md`) and
//!   `command` (`COMMAND.md`); items install as `<dir>/<name>.md`.
//! - [`skill::SkillHandler`] serves `skill` (`SKILL.md`, `.markdown`, `.mdx`);
//!   items install as `<dir>/<name>/` with every owned file.
//!
//! The orchestrator only ever talks to handlers through the trait, looked up
//! by kind in a [`HandlerRegistry`]. How a third-party handler gets into the
//! registry is up to the embedding application.

pub mod common;
pub mod single_file;
pub mod skill;

pub use common::{
    HandlerContext, InstallLayout, InstallOptions, ListError, ListReport, ListedResource,
    TargetOutcome, TargetStatus, ValidationReport,
};
pub use single_file::SingleFileHandler;
pub use skill::SkillHandler;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::acquire::Acquisition;
use crate::core::{AgsyncError, DiscoveredItem, InstallTarget, Scope};
use crate::naming::NamingStrategy;

/// Static description of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerMetadata {
    pub kind: String,
    pub display_name: String,
    pub is_built_in: bool,
}

/// Lifecycle contract shared by every resource kind.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn metadata(&self) -> HandlerMetadata;

    /// Find every item of this kind in an acquisition and resolve its install name.
    async fn discover(
        &self,
        acquisition: &Acquisition,
        naming: NamingStrategy,
    ) -> Result<Vec<DiscoveredItem>>;

    /// Check an item before install. Never fails; problems are reported in the result.
    fn validate(&self, item: &DiscoveredItem) -> ValidationReport;

    /// Install `item` to each target. Outcomes are reported per target, in order.
    async fn install(
        &self,
        item: &DiscoveredItem,
        targets: &[InstallTarget],
        options: InstallOptions,
    ) -> Vec<TargetOutcome>;

    /// Remove the installed item `name` from each target. Missing targets are warnings.
    async fn remove(&self, name: &str, targets: &[InstallTarget]) -> Vec<TargetOutcome>;

    /// Scan every consumer directory of `scope` for installed items.
    async fn list(&self, scope: Scope) -> ListReport;
}

/// Handlers keyed by kind.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn ResourceHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").field("kinds", &self.handlers.keys()).finish()
    }
}

impl HandlerRegistry {
    /// Registry with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the three built-in handlers.
    #[must_use]
    pub fn with_builtins(ctx: &HandlerContext) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SkillHandler::new(ctx.clone())));
        registry.register(Arc::new(SingleFileHandler::agent(ctx.clone())));
        registry.register(Arc::new(SingleFileHandler::command(ctx.clone())));
        registry
    }

    /// Register `handler` under its kind, returning any handler it replaced.
    pub fn register(&mut self, handler: Arc<dyn ResourceHandler>) -> Option<Arc<dyn ResourceHandler>> {
        let kind = handler.metadata().kind;
        self.handlers.insert(kind, handler)
    }

    pub fn unregister(&mut self, kind: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.remove(kind)
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn ResourceHandler>, AgsyncError> {
        self.handlers.get(kind).cloned().ok_or_else(|| AgsyncError::UnknownKind {
            kind: kind.to_string(),
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn ResourceHandler>> {
        self.handlers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
