// meshrestore/src/restore/logic.rs
use serde::Serialize;

use super::{RestoreAdapter, gate};
use crate::audit::{AuditEntry, AuditLog};
use crate::backup::{get_backup_metadata, validate_backup};
use crate::config::{DatabaseConfig, RestoreGateState};
use crate::errors::RestoreError;

/// Outcome of one `restore_from_backup` call. Either a complete success or a
/// clean failure; never partially filled. Serializable so the audit entry can
/// carry it verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub success: bool,
    pub message: String,
    pub tables_restored: u64,
    pub rows_restored: u64,
    pub migration_required: bool,
    pub errors: Vec<String>,
}

impl RestoreResult {
    fn failure(message: String) -> Self {
        RestoreResult {
            success: false,
            errors: vec![message.clone()],
            message,
            tables_restored: 0,
            rows_restored: 0,
            migration_required: false,
        }
    }
}

/// Restores the named snapshot into the configured backend.
///
/// Precondition (startup barrier): the caller must not have started any other
/// consumer of the database — no listener, poller or mesh link — until this
/// returns. The phases run sequentially and short-circuit on the first
/// failure; every failure comes back as data in the `RestoreResult`, never as
/// an error, so the bootstrap sequence can decide whether to halt.
pub async fn restore_from_backup(
    database: &DatabaseConfig,
    gate_state: &RestoreGateState,
    audit: &dyn AuditLog,
    dirname: &str,
    current_schema_version: u32,
) -> RestoreResult {
    println!("🔄 Restoring from backup '{}'...", dirname);

    let result = match run_phases(database, gate_state, dirname, current_schema_version).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("❌ Restore from '{}' failed: {}", dirname, e);
            RestoreResult::failure(e.to_string())
        }
    };

    // Audit is best-effort either way; a failing sink must not override the
    // primary result.
    let details = serde_json::to_string(&result)
        .unwrap_or_else(|e| format!("{{\"serialization_error\":\"{}\"}}", e));
    if let Err(e) = audit.record(AuditEntry::system("system.restore", dirname, details)) {
        eprintln!("⚠️ Failed to write audit entry for restore: {:#}", e);
    }

    // The marker guards against replaying this restore on the next boot. The
    // data is already committed, so a write failure degrades to a warning.
    if result.success {
        if let Err(e) = gate::write_marker(&gate_state.marker_path, dirname) {
            eprintln!(
                "⚠️ Restore succeeded but the restore marker could not be written: {:#}. The next boot with the same trigger will run this restore again.",
                e
            );
        }
    }

    result
}

async fn run_phases(
    database: &DatabaseConfig,
    gate_state: &RestoreGateState,
    dirname: &str,
    current_schema_version: u32,
) -> crate::errors::Result<RestoreResult> {
    // Phase 1: structural validation.
    let report = validate_backup(&gate_state.backup_root, dirname);
    for warning in &report.warnings {
        println!("⚠️ {}", warning);
    }
    if !report.valid {
        return Err(RestoreError::Validation(report.errors.join("; ")));
    }

    // Phase 2: descriptor, compatibility, migration need.
    let metadata = get_backup_metadata(&gate_state.backup_root, dirname).ok_or_else(|| {
        RestoreError::Metadata(format!("descriptor for '{}' is missing or unparsable", dirname))
    })?;
    if metadata.schema_version > current_schema_version {
        return Err(RestoreError::Compatibility(format!(
            "backup schema version {} is newer than this installation's schema version {}; versions are incompatible",
            metadata.schema_version, current_schema_version
        )));
    }
    let migration_required = metadata.schema_version < current_schema_version;
    println!(
        "📦 Backup '{}': app {}, schema version {}, {} table(s)",
        dirname,
        metadata.app_version,
        metadata.schema_version,
        metadata.tables.len()
    );

    // Phase 3: one adapter, one transaction.
    let snapshot_dir = gate_state.backup_root.join(dirname);
    let adapter = RestoreAdapter::from_config(database);
    let stats = adapter.restore(&snapshot_dir, &metadata.tables).await?;

    // Phase 4: this engine never runs DDL; the ordinary migration runner
    // upgrades the restored data when the database service next initializes.
    if migration_required {
        println!(
            "ℹ️ Restored data is at schema version {}; the migration runner will bring it to version {} on the next database initialization.",
            metadata.schema_version, current_schema_version
        );
    }

    println!(
        "✅ Restored {} table(s), {} row(s) from '{}'",
        stats.tables_restored, stats.rows_restored, dirname
    );
    Ok(RestoreResult {
        success: true,
        message: format!(
            "Restored {} table(s) ({} row(s)) from backup '{}'",
            stats.tables_restored, stats.rows_restored, dirname
        ),
        tables_restored: stats.tables_restored,
        rows_restored: stats.rows_restored,
        migration_required,
        errors: Vec::new(),
    })
}
