// meshrestore/src/restore/mysql.rs
use serde_json::{Map, Value};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, MySqlPool, Transaction};
use std::path::Path;

use super::{LoadStats, TableAction, networked_table_action, read_table_rows};
use crate::backup::table_data_file;
use crate::errors::Result;

const INSERT_BATCH_ROWS: usize = 500;

/// Tables reload in metadata order, so stale child rows still reference
/// parent rows at DELETE time and reloaded children may precede their
/// parents. InnoDB checks FKs immediately, so they are switched off for the
/// session, matching the embedded adapter's foreign_keys pragma. The session
/// ends when the dedicated pool closes.
const TX_PROLOGUE: &str = "SET FOREIGN_KEY_CHECKS = 0";

/// Restore adapter for MySQL/MariaDB. Same shape as the PostgreSQL adapter:
/// one pooled connection, one transaction, sequential statements, pool closed
/// whatever happens. Only the dialect differs.
pub struct MySqlRestore {
    url: String,
}

impl MySqlRestore {
    pub fn new(url: String) -> Self {
        MySqlRestore { url }
    }

    pub async fn restore(&self, backup_path: &Path, tables: &[String]) -> Result<LoadStats> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect(&self.url)
            .await?;
        let outcome = restore_all(&pool, backup_path, tables).await;
        pool.close().await;
        outcome
    }
}

async fn restore_all(pool: &MySqlPool, backup_path: &Path, tables: &[String]) -> Result<LoadStats> {
    let mut tx = pool.begin().await?;
    sqlx::query(TX_PROLOGUE).execute(&mut *tx).await?;
    let mut stats = LoadStats::default();

    for table in tables {
        let data_file = backup_path.join(table_data_file(table));
        match networked_table_action(&data_file, table_exists(&mut tx, table).await?) {
            TableAction::SkipMissingDataFile => {
                println!(
                    "⚠️ No data file for table '{}' in backup; skipping.",
                    table
                );
                continue;
            }
            TableAction::SkipAbsentFromSchema => {
                println!(
                    "⚠️ Table '{}' is listed in the backup but absent from the live schema; skipping.",
                    table
                );
                continue;
            }
            TableAction::Load => {}
        }

        let rows = read_table_rows(&data_file)?;

        sqlx::query(&format!("DELETE FROM {}", quote_ident(table)))
            .execute(&mut *tx)
            .await?;

        if let Some(first) = rows.first() {
            let columns: Vec<String> = first.keys().cloned().collect();
            for chunk in rows.chunks(INSERT_BATCH_ROWS) {
                let sql = build_insert(table, &columns, chunk);
                sqlx::query(&sql).execute(&mut *tx).await?;
                stats.rows_restored += chunk.len() as u64;
            }
        }

        stats.tables_restored += 1;
        println!("✓ Restored table '{}' ({} rows)", table, rows.len());
    }

    tx.commit().await?;
    Ok(stats)
}

async fn table_exists(tx: &mut Transaction<'_, MySql>, table: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_name = ?",
    )
    .bind(table)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub(crate) fn build_insert(table: &str, columns: &[String], rows: &[Map<String, Value>]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let tuples = rows
        .iter()
        .map(|row| {
            let values = columns
                .iter()
                .map(|c| sql_literal(row.get(c)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", values)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        column_list,
        tuples
    )
}

pub(crate) fn sql_literal(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::Bool(true)) => "1".to_string(),
        Some(Value::Bool(false)) => "0".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => quote_string(s),
        Some(other) => quote_string(&other.to_string()),
    }
}

// MySQL treats backslash as an escape character unless NO_BACKSLASH_ESCAPES
// is set, so both backslashes and quotes need escaping.
fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}
