use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{AuditOutcome, AuditRecord};
use crate::utils::fs::ensure_dir;

/// Write-only destination for audit records.
///
/// Implementations must be cheap; they run inline with the operation they
/// describe.
pub trait AuditSink: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &'static str;

    fn emit(&self, record: &AuditRecord) -> Result<()>;
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AuditSink for NoopSink {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn emit(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// Forwards records to `tracing` under the `agsync::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn emit(&self, record: &AuditRecord) -> Result<()> {
        let target = record.target_path.as_deref().unwrap_or("-");
        match record.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "agsync::audit",
                action = %record.action,
                actor = %record.actor_id,
                kind = %record.resource_kind,
                resource = %record.resource_name,
                path = %target,
                details = ?record.details,
                "audit"
            ),
            AuditOutcome::Warning | AuditOutcome::Failure => tracing::warn!(
                target: "agsync::audit",
                action = %record.action,
                actor = %record.actor_id,
                kind = %record.resource_kind,
                resource = %record.resource_name,
                path = %target,
                outcome = ?record.outcome,
                details = ?record.details,
                error = ?record.error,
                "audit"
            ),
        }
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesSink {
    /// Open (lazily) an append-only log at `path`; parent directories are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonLinesSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn emit(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("audit log lock poisoned"))?;
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Keeps records in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn emit(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use tempfile::TempDir;

    fn record(name: &str) -> AuditRecord {
        AuditRecord {
            timestamp: chrono::Utc::now(),
            actor_id: "t".to_string(),
            action: AuditAction::Install,
            resource_name: name.to_string(),
            resource_kind: "skill".to_string(),
            target_path: Some("<project>/.claude/skills/x".to_string()),
            outcome: AuditOutcome::Success,
            details: None,
            error: None,
        }
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let temp = TempDir::new().unwrap();
        let sink = JsonLinesSink::new(temp.path().join("logs/audit.jsonl"));
        sink.emit(&record("a")).unwrap();
        sink.emit(&record("b")).unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.resource_name, "b");
    }

    #[test]
    fn test_tracing_and_noop_sinks_accept_records() {
        assert!(TracingSink.emit(&record("a")).is_ok());
        assert!(NoopSink.emit(&record("a")).is_ok());
    }
}
