// meshrestore/src/restore/sqlite.rs
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{LoadStats, read_table_rows};
use crate::backup::table_data_file;
use crate::errors::Result;

/// Restore adapter for the embedded engine. Everything runs synchronously on
/// one connection inside one `rusqlite` transaction scope.
pub struct SqliteRestore {
    db_path: PathBuf,
}

impl SqliteRestore {
    pub fn new(db_path: PathBuf) -> Self {
        SqliteRestore { db_path }
    }

    pub fn restore(&self, backup_path: &Path, tables: &[String]) -> Result<LoadStats> {
        let mut conn = Connection::open(&self.db_path)?;
        // Tables reload in metadata order, so FK enforcement must be off for
        // the whole load; the networked adapters make the same arrangement
        // with their session switches. Must be set outside the transaction.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;

        let tx = conn.transaction()?;
        let mut stats = LoadStats::default();

        for table in tables {
            let data_file = backup_path.join(table_data_file(table));
            if !data_file.is_file() {
                println!(
                    "⚠️ No data file for table '{}' in backup; skipping.",
                    table
                );
                continue;
            }

            let rows = read_table_rows(&data_file)?;

            // Destructive replace: wipe the table before loading the snapshot.
            tx.execute(&format!("DELETE FROM {}", quote_ident(table)), [])?;

            if let Some(first) = rows.first() {
                let columns: Vec<String> = first.keys().cloned().collect();
                let placeholders = (1..=columns.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_ident(table),
                    columns
                        .iter()
                        .map(|c| quote_ident(c))
                        .collect::<Vec<_>>()
                        .join(", "),
                    placeholders
                );
                let mut stmt = tx.prepare(&sql)?;
                for row in &rows {
                    let params: Vec<SqlValue> =
                        columns.iter().map(|c| to_sql_value(row.get(c))).collect();
                    stmt.execute(rusqlite::params_from_iter(params))?;
                    stats.rows_restored += 1;
                }
            }

            stats.tables_restored += 1;
            println!("✓ Restored table '{}' ({} rows)", table, rows.len());
        }

        tx.commit()?;
        Ok(stats)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Maps a JSON value onto a SQLite storage class. Nested arrays/objects are
/// stored as their serialized JSON text, matching how the dashboard persists
/// them in the first place.
fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(*b as i64),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed_database(path: &Path) -> anyhow::Result<()> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE nodes (id INTEGER PRIMARY KEY, name TEXT, last_seen INTEGER);
             CREATE TABLE messages (id INTEGER PRIMARY KEY, node_id INTEGER, body TEXT);
             INSERT INTO nodes VALUES (100, 'stale-node', 0);
             INSERT INTO messages VALUES (900, 100, 'stale message');",
        )?;
        Ok(())
    }

    fn write_snapshot_files(dir: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join("nodes.json"),
            r#"[
                {"id": 1, "name": "alpha", "last_seen": 1724000000},
                {"id": 2, "name": "bravo", "last_seen": 1724000100},
                {"id": 3, "name": "charlie", "last_seen": null}
            ]"#,
        )?;
        fs::write(
            dir.join("messages.json"),
            r#"[
                {"id": 10, "node_id": 1, "body": "hello"},
                {"id": 11, "node_id": 1, "body": "it's alive"},
                {"id": 12, "node_id": 2, "body": "ack"},
                {"id": 13, "node_id": 2, "body": "ping"},
                {"id": 14, "node_id": 3, "body": "pong"}
            ]"#,
        )?;
        Ok(())
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_restore_replaces_existing_rows() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let db_path = tmp.path().join("mesh.db");
        seed_database(&db_path)?;
        let snapshot = tmp.path().join("snap");
        write_snapshot_files(&snapshot)?;

        let adapter = SqliteRestore::new(db_path.clone());
        let stats = adapter.restore(
            &snapshot,
            &["nodes".to_string(), "messages".to_string()],
        )?;
        assert_eq!(stats.tables_restored, 2);
        assert_eq!(stats.rows_restored, 8);

        let conn = Connection::open(&db_path)?;
        assert_eq!(count(&conn, "nodes"), 3);
        assert_eq!(count(&conn, "messages"), 5);
        // Pre-restore rows are gone, snapshot rows are in.
        let stale: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE name = 'stale-node'",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(stale, 0);
        let body: String = conn.query_row(
            "SELECT body FROM messages WHERE id = 11",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(body, "it's alive");
        Ok(())
    }

    #[test]
    fn test_missing_data_file_is_skipped() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let db_path = tmp.path().join("mesh.db");
        seed_database(&db_path)?;
        let snapshot = tmp.path().join("snap");
        fs::create_dir_all(&snapshot)?;
        fs::write(snapshot.join("nodes.json"), r#"[{"id": 1, "name": "a", "last_seen": 1}]"#)?;

        let adapter = SqliteRestore::new(db_path.clone());
        let stats = adapter.restore(
            &snapshot,
            &["nodes".to_string(), "messages".to_string()],
        )?;
        assert_eq!(stats.tables_restored, 1);
        assert_eq!(stats.rows_restored, 1);

        // The skipped table keeps its pre-restore contents.
        let conn = Connection::open(&db_path)?;
        assert_eq!(count(&conn, "messages"), 1);
        Ok(())
    }

    #[test]
    fn test_empty_data_file_empties_the_table() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let db_path = tmp.path().join("mesh.db");
        seed_database(&db_path)?;
        let snapshot = tmp.path().join("snap");
        fs::create_dir_all(&snapshot)?;
        fs::write(snapshot.join("messages.json"), "[]")?;

        let adapter = SqliteRestore::new(db_path.clone());
        let stats = adapter.restore(&snapshot, &["messages".to_string()])?;
        assert_eq!(stats.tables_restored, 1);
        assert_eq!(stats.rows_restored, 0);

        let conn = Connection::open(&db_path)?;
        assert_eq!(count(&conn, "messages"), 0);
        Ok(())
    }

    #[test]
    fn test_bad_row_rolls_back_every_table() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let db_path = tmp.path().join("mesh.db");
        seed_database(&db_path)?;
        let snapshot = tmp.path().join("snap");
        write_snapshot_files(&snapshot)?;
        // A column the live schema does not have makes the INSERT fail.
        fs::write(
            snapshot.join("messages.json"),
            r#"[{"id": 10, "node_id": 1, "body": "ok", "no_such_column": 1}]"#,
        )?;

        let adapter = SqliteRestore::new(db_path.clone());
        let result = adapter.restore(
            &snapshot,
            &["nodes".to_string(), "messages".to_string()],
        );
        assert!(result.is_err());

        // Cross-table atomicity: nodes had already been loaded inside the
        // same transaction and must be back to its pre-restore contents.
        let conn = Connection::open(&db_path)?;
        assert_eq!(count(&conn, "nodes"), 1);
        let name: String =
            conn.query_row("SELECT name FROM nodes WHERE id = 100", [], |r| r.get(0))?;
        assert_eq!(name, "stale-node");
        assert_eq!(count(&conn, "messages"), 1);
        Ok(())
    }

    #[test]
    fn test_restore_succeeds_across_foreign_key_constraints() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let db_path = tmp.path().join("mesh.db");
        // Parent-first metadata order means nodes rows are deleted while
        // messages rows still reference them; enforcement is off for the
        // duration of the load, so this must succeed.
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE nodes (id INTEGER PRIMARY KEY, name TEXT, last_seen INTEGER);
             CREATE TABLE messages (id INTEGER PRIMARY KEY,
                                    node_id INTEGER REFERENCES nodes(id),
                                    body TEXT);
             INSERT INTO nodes VALUES (100, 'stale-node', 0);
             INSERT INTO messages VALUES (900, 100, 'stale message');",
        )?;
        drop(conn);
        let snapshot = tmp.path().join("snap");
        write_snapshot_files(&snapshot)?;

        let adapter = SqliteRestore::new(db_path.clone());
        let stats = adapter.restore(
            &snapshot,
            &["nodes".to_string(), "messages".to_string()],
        )?;
        assert_eq!(stats.tables_restored, 2);
        assert_eq!(stats.rows_restored, 8);

        let conn = Connection::open(&db_path)?;
        assert_eq!(count(&conn, "nodes"), 3);
        assert_eq!(count(&conn, "messages"), 5);
        Ok(())
    }

    #[test]
    fn test_quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("nodes"), "\"nodes\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
