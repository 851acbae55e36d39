//! Handler for skills: directories marked by `SKILL.md` and installed whole.
//!
//! A skill owns every staged file beneath its directory except files owned by
//! a nested skill. Size and file-count limits are checked at validation time,
//! before anything is written.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use super::common::{
    self, HandlerContext, InstallLayout, InstallOptions, KindSpec, ListReport, TargetOutcome,
    ValidationReport,
};
use super::{HandlerMetadata, ResourceHandler};
use crate::acquire::Acquisition;
use crate::constants::{MAX_SKILL_FILES, MAX_SKILL_SIZE_BYTES, SKILL_MARKER_EXTENSIONS, SKILL_MARKER_STEM};
use crate::core::{DiscoveredItem, InstallTarget, KindMetadata, ResourceKind, Scope};
use crate::markdown::ResourceMetadata;
use crate::naming::NamingStrategy;

/// `SKILL.md`, `SKILL.markdown` or `SKILL.mdx`.
fn is_skill_marker(file_name: &str) -> bool {
    let path = Path::new(file_name);
    path.file_stem().is_some_and(|s| s == SKILL_MARKER_STEM)
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SKILL_MARKER_EXTENSIONS.contains(&e))
}

fn skill_details(meta: &ResourceMetadata, file_count: usize, total_size: u64) -> KindMetadata {
    KindMetadata::Skill {
        file_count,
        total_size,
        allowed_tools: meta.allowed_tools.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct SkillHandler {
    spec: KindSpec,
    ctx: HandlerContext,
}

impl SkillHandler {
    #[must_use]
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            spec: KindSpec {
                kind: ResourceKind::Skill,
                layout: InstallLayout::Directory,
                is_marker: is_skill_marker,
                details: skill_details,
            },
            ctx,
        }
    }
}

#[async_trait]
impl ResourceHandler for SkillHandler {
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            kind: ResourceKind::Skill.to_string(),
            display_name: ResourceKind::Skill.display_name().to_string(),
            is_built_in: true,
        }
    }

    async fn discover(
        &self,
        acquisition: &Acquisition,
        naming: NamingStrategy,
    ) -> Result<Vec<DiscoveredItem>> {
        Ok(common::discover_items(acquisition, &self.spec, naming))
    }

    fn validate(&self, item: &DiscoveredItem) -> ValidationReport {
        let (mut errors, warnings) = common::base_findings(item);

        if item.files.len() > MAX_SKILL_FILES {
            errors.push(format!(
                "{} files exceed the limit of {MAX_SKILL_FILES}",
                item.files.len()
            ));
        }
        let total: u64 = item.files.iter().map(|f| f.content.len() as u64).sum();
        if total > MAX_SKILL_SIZE_BYTES {
            errors.push(format!(
                "total size {:.2} MB exceeds the limit of {} MB",
                total as f64 / (1024.0 * 1024.0),
                MAX_SKILL_SIZE_BYTES / (1024 * 1024)
            ));
        }
        ValidationReport::from_findings(errors, warnings)
    }

    async fn install(
        &self,
        item: &DiscoveredItem,
        targets: &[InstallTarget],
        options: InstallOptions,
    ) -> Vec<TargetOutcome> {
        common::install_item(&self.ctx, &self.spec, item, targets, options).await
    }

    async fn remove(&self, name: &str, targets: &[InstallTarget]) -> Vec<TargetOutcome> {
        common::remove_item(&self.ctx, &self.spec, name, targets).await
    }

    async fn list(&self, scope: Scope) -> ListReport {
        common::list_installed(&self.ctx, &self.spec, scope).await
    }
}
