//! Audit trail for every mutating operation.
//!
//! Components receive an [`AuditTrail`] at construction and report what they
//! did through it. The trail stamps each event with a timestamp and actor id,
//! redacts paths relative to known roots, and hands the resulting
//! [`AuditRecord`] to an [`AuditSink`].
//!
//! Sinks are fire-and-forget: a failing sink is logged at `warn` and never
//! fails the operation being described.
//!
//! # Examples
//!
//! ```rust
//! use agsync_cli::audit::{AuditAction, AuditEvent, AuditTrail, MemorySink, PathRedactor};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::default());
//! let redactor = PathRedactor::new(Some(PathBuf::from("/work/app")), None, None);
//! let trail = AuditTrail::new(sink.clone(), redactor).with_actor("ci");
//!
//! trail.emit(
//!     AuditEvent::new(AuditAction::Install, "react-patterns", "skill")
//!         .target("/work/app/.claude/skills/react-patterns"),
//! );
//!
//! let records = sink.records();
//! assert_eq!(records[0].target_path.as_deref(), Some("<project>/.claude/skills/react-patterns"));
//! ```

mod redact;
mod sinks;

pub use redact::PathRedactor;
pub use sinks::{AuditSink, JsonLinesSink, MemorySink, NoopSink, TracingSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    Acquire,
    Extract,
    Install,
    Remove,
    Rollback,
    StateUpdate,
    SecurityViolation,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Acquire => "acquire",
            AuditAction::Extract => "extract",
            AuditAction::Install => "install",
            AuditAction::Remove => "remove",
            AuditAction::Rollback => "rollback",
            AuditAction::StateUpdate => "state-update",
            AuditAction::SecurityViolation => "security-violation",
        };
        f.write_str(s)
    }
}

/// How it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Warning,
}

/// Emitted record. Paths in `target_path`, `details` and `error` are already redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub action: AuditAction,
    pub resource_name: String,
    pub resource_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Unredacted event as reported by a component.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub resource_name: String,
    pub resource_kind: String,
    pub target_path: Option<PathBuf>,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
    pub error: Option<String>,
}

impl AuditEvent {
    /// A successful event with no target.
    pub fn new(action: AuditAction, resource_name: impl Into<String>, resource_kind: impl Into<String>) -> Self {
        Self {
            action,
            resource_name: resource_name.into(),
            resource_kind: resource_kind.into(),
            target_path: None,
            outcome: AuditOutcome::Success,
            details: None,
            error: None,
        }
    }

    pub fn target(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark the event failed with `error`.
    pub fn failed(mut self, error: impl Display) -> Self {
        self.outcome = AuditOutcome::Failure;
        self.error = Some(error.to_string());
        self
    }

    /// Mark the event as a recovered problem.
    pub fn warning(mut self, message: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Warning;
        self.details = Some(message.into());
        self
    }
}

/// Cheap-to-clone handle passed to every component that mutates state.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    redactor: Arc<PathRedactor>,
    actor_id: String,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("sink", &self.sink.name())
            .field("actor_id", &self.actor_id)
            .finish()
    }
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>, redactor: PathRedactor) -> Self {
        Self {
            sink,
            redactor: Arc::new(redactor),
            actor_id: default_actor_id(),
        }
    }

    /// Trail that drops every record.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSink), PathRedactor::default())
    }

    #[must_use]
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    /// Redact and forward `event`. Never fails.
    pub fn emit(&self, event: AuditEvent) {
        let record = AuditRecord {
            timestamp: Utc::now(),
            actor_id: self.actor_id.clone(),
            action: event.action,
            resource_name: self.redactor.redact_text(&event.resource_name),
            resource_kind: event.resource_kind,
            target_path: event.target_path.as_deref().map(|p| self.redactor.redact_path(p)),
            outcome: event.outcome,
            details: event.details.as_deref().map(|d| self.redactor.redact_text(d)),
            error: event.error.as_deref().map(|e| self.redactor.redact_text(e)),
        };

        if let Err(e) = self.sink.emit(&record) {
            warn!("Audit sink '{}' failed to record {} event: {e:#}", self.sink.name(), record.action);
        }
    }
}

/// `$AGSYNC_ACTOR`, else the login name, else `unknown`.
#[must_use]
pub fn default_actor_id() -> String {
    ["AGSYNC_ACTOR", "USER", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}
