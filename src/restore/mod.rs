// meshrestore/src/restore/mod.rs
pub(crate) mod gate;
mod logic;
pub(crate) mod mysql;
pub(crate) mod postgres;
pub(crate) mod sqlite;

use serde_json::{Map, Value};
use std::path::Path;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::errors::Result;

pub use logic::{RestoreResult, restore_from_backup};

/// Counters an adapter reports back after its transaction commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStats {
    pub rows_restored: u64,
    pub tables_restored: u64,
}

/// One adapter per storage engine, selected from configuration. All three
/// share the same contract: restore the given tables from the snapshot
/// directory inside a single transaction, or leave the database untouched.
pub enum RestoreAdapter {
    Sqlite(sqlite::SqliteRestore),
    Postgres(postgres::PostgresRestore),
    MySql(mysql::MySqlRestore),
}

impl RestoreAdapter {
    pub fn from_config(database: &DatabaseConfig) -> Self {
        match database.backend {
            DatabaseBackend::Sqlite => {
                RestoreAdapter::Sqlite(sqlite::SqliteRestore::new(database.url.clone().into()))
            }
            DatabaseBackend::Postgres => {
                RestoreAdapter::Postgres(postgres::PostgresRestore::new(database.url.clone()))
            }
            DatabaseBackend::MySql => {
                RestoreAdapter::MySql(mysql::MySqlRestore::new(database.url.clone()))
            }
        }
    }

    /// Restores `tables`, in order, from `backup_path`. One transaction per
    /// call; any table-level error aborts the whole thing.
    pub async fn restore(&self, backup_path: &Path, tables: &[String]) -> Result<LoadStats> {
        match self {
            // The embedded engine is synchronous; this runs once, pre-traffic,
            // so blocking the runtime here is acceptable.
            RestoreAdapter::Sqlite(adapter) => adapter.restore(backup_path, tables),
            RestoreAdapter::Postgres(adapter) => adapter.restore(backup_path, tables).await,
            RestoreAdapter::MySql(adapter) => adapter.restore(backup_path, tables).await,
        }
    }
}

/// Loads one table's data file: a JSON array of row objects.
pub(crate) fn read_table_rows(data_file: &Path) -> Result<Vec<Map<String, Value>>> {
    let content = std::fs::read_to_string(data_file)?;
    let rows: Vec<Map<String, Value>> = serde_json::from_str(&content)?;
    Ok(rows)
}

/// What a networked adapter should do with one metadata-listed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TableAction {
    Load,
    /// Tolerated: backups may omit empty or deprecated tables.
    SkipMissingDataFile,
    /// Tolerated: schema drift, the snapshot references a table this
    /// installation does not have.
    SkipAbsentFromSchema,
}

/// Skip-or-load decision for the networked adapters; the embedded adapter
/// only applies the data-file half, its engine has no drifted installs to
/// probe.
pub(crate) fn networked_table_action(data_file: &Path, live_table_exists: bool) -> TableAction {
    if !data_file.is_file() {
        TableAction::SkipMissingDataFile
    } else if !live_table_exists {
        TableAction::SkipAbsentFromSchema
    } else {
        TableAction::Load
    }
}
