//! Mesh dashboard bootstrap restore step.
//!
//! Runs once at container start, before the dashboard's web server, pollers
//! or mesh link come up, and reinstates a JSON snapshot of the application
//! database when one has been requested. The surrounding bootstrap must not
//! start any other consumer of the database until this process has exited;
//! that startup barrier is a contract, not something this code can enforce.

// meshrestore/src/main.rs
mod audit;
mod backup;
mod config;
mod errors;
mod restore;

use anyhow::{Context, Result};
use audit::FileAuditLog;
use config::{AppConfig, CURRENT_SCHEMA_VERSION, RawJsonConfig};
use dotenv::dotenv;
use restore::gate::{self, GateDecision};
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    dotenv().ok();

    // config.json next to the executable; containers that configure purely
    // through the environment may not ship one at all.
    let config_path = PathBuf::from("config.json");
    let config = if config_path.is_file() {
        AppConfig::load_from_json(&config_path).with_context(|| {
            format!(
                "Failed to load application configuration from {}",
                config_path.display()
            )
        })?
    } else {
        AppConfig::from_raw(RawJsonConfig::default())
            .context("Failed to load application configuration from the environment")?
    };

    let dirname = match gate::should_restore(&config.gate)? {
        GateDecision::NotRequested => {
            println!("No restore requested; continuing normal startup.");
            return Ok(());
        }
        // The gate already logged the skip and the force-re-restore guidance.
        GateDecision::AlreadyApplied(_) => return Ok(()),
        GateDecision::Proceed(dirname) => dirname,
    };

    let check = gate::can_restore(&config.gate, &dirname, CURRENT_SCHEMA_VERSION);
    if !check.can {
        anyhow::bail!(
            "Cannot restore from '{}': {}",
            dirname,
            check.reason.unwrap_or_else(|| "unknown reason".to_string())
        );
    }

    let audit_log = FileAuditLog::new(config.audit_log_path.clone());
    let result = restore::restore_from_backup(
        &config.database,
        &config.gate,
        &audit_log,
        &dirname,
        CURRENT_SCHEMA_VERSION,
    )
    .await;

    if !result.success {
        anyhow::bail!("Restore from '{}' failed: {}", dirname, result.message);
    }

    println!("✅ {}", result.message);
    Ok(())
}
