// meshrestore/src/restore/gate.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::backup::{self, METADATA_FILE, validate_backup};
use crate::config::RestoreGateState;

/// What this boot should do about restoring, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// No restore trigger is set.
    NotRequested,
    /// The trigger names the snapshot the marker says was already restored.
    AlreadyApplied(String),
    /// Restore this snapshot.
    Proceed(String),
}

/// Answer from the side-effect-free deep check.
#[derive(Debug, Clone)]
pub struct GateCheck {
    pub can: bool,
    pub reason: Option<String>,
}

impl GateCheck {
    fn ok() -> Self {
        GateCheck {
            can: true,
            reason: None,
        }
    }

    fn refuse(reason: String) -> Self {
        GateCheck {
            can: false,
            reason: Some(reason),
        }
    }
}

/// Reads the restore marker: the dirname of the most recently completed
/// restore, or `None` if no restore has ever completed.
pub fn read_marker(marker_path: &Path) -> Option<String> {
    fs::read_to_string(marker_path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Overwrites the restore marker after a successful restore. A single value,
/// not a log; each success replaces the previous one.
pub fn write_marker(marker_path: &Path, dirname: &str) -> Result<()> {
    if let Some(parent) = marker_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create marker directory {}", parent.display()))?;
    }
    fs::write(marker_path, format!("{}\n", dirname))
        .with_context(|| format!("Failed to write restore marker {}", marker_path.display()))
}

/// Decides whether a restore should run this boot.
///
/// `NotRequested` when the trigger is unset; `AlreadyApplied` when the
/// requested snapshot is the one the marker says was already restored
/// (idempotent re-run protection for containers that restart with the
/// trigger still set). Returns a fatal error when a restore was requested
/// but the snapshot directory or its descriptor does not exist: this runs
/// before any service is listening, so failing loudly is the correct
/// contract.
pub fn should_restore(state: &RestoreGateState) -> Result<GateDecision> {
    let Some(dirname) = &state.requested else {
        return Ok(GateDecision::NotRequested);
    };

    if let Some(applied) = read_marker(&state.marker_path) {
        if applied == *dirname {
            println!(
                "⚠️ Restore of '{}' was already applied; skipping. Delete {} (or request a different backup) to force a re-restore.",
                dirname,
                state.marker_path.display()
            );
            return Ok(GateDecision::AlreadyApplied(dirname.clone()));
        }
    }

    let snapshot_dir = state.backup_root.join(dirname);
    if !snapshot_dir.is_dir() {
        anyhow::bail!(
            "Restore requested from '{}' but backup directory {} does not exist",
            dirname,
            snapshot_dir.display()
        );
    }
    if !snapshot_dir.join(METADATA_FILE).is_file() {
        anyhow::bail!(
            "Restore requested from '{}' but descriptor {} is missing",
            dirname,
            snapshot_dir.join(METADATA_FILE).display()
        );
    }

    Ok(GateDecision::Proceed(dirname.clone()))
}

/// Non-throwing deep check: directory existence, structural validation, and
/// the schema-version compatibility rule. A backup written by a newer schema
/// than this build knows about cannot be safely interpreted and is refused.
pub fn can_restore(
    state: &RestoreGateState,
    dirname: &str,
    current_schema_version: u32,
) -> GateCheck {
    let snapshot_dir = state.backup_root.join(dirname);
    if !snapshot_dir.is_dir() {
        return GateCheck::refuse(format!(
            "Backup directory does not exist: {}",
            snapshot_dir.display()
        ));
    }

    let report = validate_backup(&state.backup_root, dirname);
    if !report.valid {
        return GateCheck::refuse(report.errors.join("; "));
    }

    // validate_backup passing guarantees the descriptor parses.
    let Some(metadata) = backup::get_backup_metadata(&state.backup_root, dirname) else {
        return GateCheck::refuse("Backup descriptor is missing or unparsable".to_string());
    };

    if metadata.schema_version > current_schema_version {
        return GateCheck::refuse(format!(
            "Backup schema version {} is newer than this installation's schema version {}; versions are incompatible. Upgrade the application before restoring this backup.",
            metadata.schema_version, current_schema_version
        ));
    }

    GateCheck::ok()
}
