// meshrestore/src/backup/mod.rs
pub(crate) mod metadata;
pub(crate) mod validation;

pub use metadata::{BackupMetadata, get_backup_metadata};
pub use validation::{ValidationReport, validate_backup};

/// Name of the descriptor file every snapshot directory carries.
pub const METADATA_FILE: &str = "metadata.json";

/// Per-table data files are `<table>.json` inside the snapshot directory.
pub fn table_data_file(table: &str) -> String {
    format!("{}.json", table)
}
