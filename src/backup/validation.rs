// meshrestore/src/backup/validation.rs
use std::path::Path;

use super::{METADATA_FILE, get_backup_metadata, table_data_file};

/// Outcome of a structural integrity check over one snapshot directory.
/// Warnings never fail validation; a backup may legitimately omit data files
/// for empty or deprecated tables.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Checks that a snapshot directory exists, its descriptor parses, and each
/// listed table has a data file. Never fails itself; everything is reported
/// through the returned `ValidationReport` so callers can log precisely.
pub fn validate_backup(backup_root: &Path, dirname: &str) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let snapshot_dir = backup_root.join(dirname);
    if !snapshot_dir.is_dir() {
        errors.push(format!(
            "Backup directory does not exist: {}",
            snapshot_dir.display()
        ));
        return ValidationReport {
            valid: false,
            errors,
            warnings,
        };
    }

    let Some(metadata) = get_backup_metadata(backup_root, dirname) else {
        errors.push(format!(
            "Backup descriptor {} is missing or unparsable",
            snapshot_dir.join(METADATA_FILE).display()
        ));
        return ValidationReport {
            valid: false,
            errors,
            warnings,
        };
    };

    for table in &metadata.tables {
        let data_file = snapshot_dir.join(table_data_file(table));
        if !data_file.is_file() {
            warnings.push(format!(
                "No data file for table '{}' ({} not found); table will be skipped",
                table,
                data_file.display()
            ));
        }
    }

    ValidationReport {
        valid: true,
        errors,
        warnings,
    }
}
