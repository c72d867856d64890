// meshrestore/src/audit.rs
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// One audit record. Restore runs pre-authentication, so `actor_id` and
/// `source_address` are `None` for everything this tool writes, but the shape
/// matches the dashboard's audit table so entries can be ingested verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub actor_id: Option<i64>,
    pub action: String,
    pub resource: String,
    pub details: String,
    pub source_address: Option<String>,
}

impl AuditEntry {
    pub fn system(action: &str, resource: &str, details: String) -> Self {
        AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            actor_id: None,
            action: action.to_string(),
            resource: resource.to_string(),
            details,
            source_address: None,
        }
    }
}

/// Sink for audit records. The orchestrator treats every `record` failure as
/// best-effort: logged, never allowed to override the restore result.
pub trait AuditLog {
    fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Production sink: JSON lines appended to a well-known file the dashboard
/// tails into its audit table on startup.
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: PathBuf) -> Self {
        FileAuditLog { path }
    }
}

impl AuditLog for FileAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create audit log directory {}", parent.display())
            })?;
        }
        let line = serde_json::to_string(&entry).context("Failed to serialize audit entry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log {}", self.path.display()))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to append to audit log {}", self.path.display()))?;
        Ok(())
    }
}
