// meshrestore/src/backup/metadata.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::METADATA_FILE;

/// Descriptor written by the backup service into each snapshot directory.
///
/// `schema_version` is the migration number the producing installation had
/// applied when the snapshot was taken; `tables` lists the per-table data
/// files in the order they should be restored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub schema_version: u32,
    pub app_version: String,
    pub tables: Vec<String>,
}

/// Reads and parses a snapshot's descriptor.
///
/// Returns `None` on a missing or unparsable descriptor rather than erroring,
/// so the orchestrator can turn that into a clean failure result instead of
/// crashing bootstrap.
pub fn get_backup_metadata(backup_root: &Path, dirname: &str) -> Option<BackupMetadata> {
    let metadata_path = backup_root.join(dirname).join(METADATA_FILE);
    let content = match fs::read_to_string(&metadata_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!(
                "⚠️ Could not read backup descriptor {}: {}",
                metadata_path.display(),
                e
            );
            return None;
        }
    };
    match serde_json::from_str::<BackupMetadata>(&content) {
        Ok(meta) => Some(meta),
        Err(e) => {
            eprintln!(
                "⚠️ Could not parse backup descriptor {}: {}",
                metadata_path.display(),
                e
            );
            None
        }
    }
}
