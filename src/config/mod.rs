// meshrestore/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Latest migration number applied by the dashboard's schema-migration runner.
/// Must be bumped in lockstep with that runner's migration list; backups with
/// a higher schema_version than this cannot be interpreted by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 12;

const DEFAULT_BACKUP_DIR: &str = "data/backups";
const DEFAULT_MARKER_PATH: &str = "data/.last-restore";
const DEFAULT_AUDIT_LOG_PATH: &str = "data/audit.log";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub database_url: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub restore_marker_path: Option<PathBuf>,
    pub audit_log_path: Option<PathBuf>,
    pub restore_from_backup: Option<String>,
}

/// Storage engine the dashboard is configured to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    MySql,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Connection URL for the networked engines; file path for SQLite.
    pub url: String,
}

/// Ambient restore-trigger state, loaded once at startup and threaded through
/// the gate as a value rather than read ad hoc from the process environment.
#[derive(Debug, Clone)]
pub struct RestoreGateState {
    /// Dirname of the snapshot an operator asked to restore, if any.
    pub requested: Option<String>,
    pub backup_root: PathBuf,
    pub marker_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub gate: RestoreGateState,
    pub audit_log_path: PathBuf,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw: RawJsonConfig = serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        // Container deployments usually set only the env vars, so they win.
        Self::from_raw_with_env(
            raw,
            env::var("DATABASE_URL").ok(),
            env::var("RESTORE_FROM_BACKUP").ok(),
        )
    }

    fn from_raw_with_env(
        raw: RawJsonConfig,
        database_url_env: Option<String>,
        restore_trigger_env: Option<String>,
    ) -> Result<Self> {
        let database_url = database_url_env
            .filter(|s| !s.trim().is_empty())
            .or(raw.database_url)
            .context("database_url must be set in config.json (or DATABASE_URL in the environment)")?;

        let requested = restore_trigger_env
            .or(raw.restore_from_backup)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(AppConfig {
            database: parse_database_config(&database_url)?,
            gate: RestoreGateState {
                requested,
                backup_root: raw
                    .backup_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
                marker_path: raw
                    .restore_marker_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKER_PATH)),
            },
            audit_log_path: raw
                .audit_log_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_LOG_PATH)),
        })
    }
}

/// Selects the storage backend from the connection URL scheme. A plain path
/// (no scheme) is treated as a SQLite database file.
pub fn parse_database_config(database_url: &str) -> Result<DatabaseConfig> {
    let parsed = match Url::parse(database_url) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Ok(DatabaseConfig {
                backend: DatabaseBackend::Sqlite,
                url: database_url.to_string(),
            });
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Invalid database_url: {}", database_url));
        }
    };

    match parsed.scheme() {
        "sqlite" => {
            // sqlite://relative/path or sqlite:///absolute/path
            let path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            if path.is_empty() {
                anyhow::bail!("sqlite database_url has no file path: {}", database_url);
            }
            Ok(DatabaseConfig {
                backend: DatabaseBackend::Sqlite,
                url: path.to_string(),
            })
        }
        "postgres" | "postgresql" => Ok(DatabaseConfig {
            backend: DatabaseBackend::Postgres,
            url: database_url.to_string(),
        }),
        "mysql" | "mariadb" => Ok(DatabaseConfig {
            backend: DatabaseBackend::MySql,
            url: database_url.to_string(),
        }),
        other => anyhow::bail!(
            "Unsupported database_url scheme '{}'. Expected sqlite, postgres or mysql.",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sqlite_url() -> anyhow::Result<()> {
        let cfg = parse_database_config("sqlite://data/meshmon.db")?;
        assert_eq!(cfg.backend, DatabaseBackend::Sqlite);
        assert_eq!(cfg.url, "data/meshmon.db");
        Ok(())
    }

    #[test]
    fn test_parse_plain_path_is_sqlite() -> anyhow::Result<()> {
        let cfg = parse_database_config("data/meshmon.db")?;
        assert_eq!(cfg.backend, DatabaseBackend::Sqlite);
        assert_eq!(cfg.url, "data/meshmon.db");
        Ok(())
    }

    #[test]
    fn test_parse_postgres_url() -> anyhow::Result<()> {
        let cfg = parse_database_config("postgresql://mesh:secret@db:5432/meshmon")?;
        assert_eq!(cfg.backend, DatabaseBackend::Postgres);
        assert_eq!(cfg.url, "postgresql://mesh:secret@db:5432/meshmon");
        Ok(())
    }

    #[test]
    fn test_parse_mysql_url() -> anyhow::Result<()> {
        let cfg = parse_database_config("mysql://mesh:secret@db:3306/meshmon")?;
        assert_eq!(cfg.backend, DatabaseBackend::MySql);
        Ok(())
    }

    #[test]
    fn test_parse_unsupported_scheme() {
        let result = parse_database_config("mongodb://db:27017/meshmon");
        assert!(result.is_err());
    }

    // Tests pass the env lookups in explicitly so ambient DATABASE_URL /
    // RESTORE_FROM_BACKUP values cannot change the outcome.

    #[test]
    fn test_from_raw_defaults() -> anyhow::Result<()> {
        let raw = RawJsonConfig {
            database_url: Some("sqlite://data/meshmon.db".to_string()),
            backup_dir: None,
            restore_marker_path: None,
            audit_log_path: None,
            restore_from_backup: None,
        };
        let cfg = AppConfig::from_raw_with_env(raw, None, None)?;
        assert_eq!(cfg.gate.backup_root, PathBuf::from("data/backups"));
        assert_eq!(cfg.gate.marker_path, PathBuf::from("data/.last-restore"));
        assert_eq!(cfg.gate.requested, None);
        Ok(())
    }

    #[test]
    fn test_from_raw_blank_trigger_is_unset() -> anyhow::Result<()> {
        let raw = RawJsonConfig {
            database_url: Some("sqlite://data/meshmon.db".to_string()),
            backup_dir: None,
            restore_marker_path: None,
            audit_log_path: None,
            restore_from_backup: Some("   ".to_string()),
        };
        let cfg = AppConfig::from_raw_with_env(raw, None, None)?;
        assert_eq!(cfg.gate.requested, None);
        Ok(())
    }

    #[test]
    fn test_env_overrides_win_over_json() -> anyhow::Result<()> {
        let raw = RawJsonConfig {
            database_url: Some("sqlite://data/meshmon.db".to_string()),
            backup_dir: None,
            restore_marker_path: None,
            audit_log_path: None,
            restore_from_backup: Some("from-json".to_string()),
        };
        let cfg = AppConfig::from_raw_with_env(
            raw,
            Some("postgresql://mesh@db/meshmon".to_string()),
            Some("from-env".to_string()),
        )?;
        assert_eq!(cfg.database.backend, DatabaseBackend::Postgres);
        assert_eq!(cfg.gate.requested, Some("from-env".to_string()));
        Ok(())
    }
}
