// meshrestore/src/restore/postgres.rs
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::path::Path;

use super::{LoadStats, TableAction, networked_table_action, read_table_rows};
use crate::backup::table_data_file;
use crate::errors::Result;

/// Rows per INSERT statement. Keeps statements bounded without a round-trip
/// per row.
const INSERT_BATCH_ROWS: usize = 500;

/// Tables reload in metadata order, so stale child rows still reference
/// parent rows at DELETE time and reloaded children may precede their
/// parents. FK triggers are switched off for the session the same way the
/// embedded adapter's foreign_keys pragma does; SET LOCAL scopes it to this
/// transaction. Requires the restore role to carry superuser (or pg15+
/// parameter) rights, which the dashboard's provisioning grants — the same
/// requirement pg_restore --disable-triggers has.
const TX_PROLOGUE: &str = "SET LOCAL session_replication_role = 'replica'";

/// Restore adapter for PostgreSQL. Acquires a single pooled connection for
/// the whole call, runs every delete and insert sequentially inside one
/// transaction, and closes the pool on both the success and error paths.
pub struct PostgresRestore {
    url: String,
}

impl PostgresRestore {
    pub fn new(url: String) -> Self {
        PostgresRestore { url }
    }

    pub async fn restore(&self, backup_path: &Path, tables: &[String]) -> Result<LoadStats> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.url)
            .await?;
        let outcome = restore_all(&pool, backup_path, tables).await;
        // Guaranteed cleanup: never leak connections across bootstrap attempts.
        pool.close().await;
        outcome
    }
}

async fn restore_all(pool: &PgPool, backup_path: &Path, tables: &[String]) -> Result<LoadStats> {
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

    // An error above drops `tx`, which rolls the transaction back.
    tx.commit().await?;
    Ok(stats)
}

async fn table_exists(tx: &mut Transaction<'_, Postgres>, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name = $1)",
    )
    .bind(table)
    .fetch_one(&mut **tx)
    .await?;
    Ok(exists)
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders one multi-row INSERT. Values are rendered as SQL literals; the
/// column list comes from the first row of the data file, so the statement
/// adapts to whatever shape the snapshot was written with.
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
        Some(Value::Bool(true)) => "TRUE".to_string(),
        Some(Value::Bool(false)) => "FALSE".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => quote_string(s),
        Some(other) => quote_string(&other.to_string()),
    }
}

// standard_conforming_strings is on by default, so doubling single quotes is
// the only escaping needed.
fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
