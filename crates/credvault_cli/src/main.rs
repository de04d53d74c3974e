//! Vault maintenance CLI.
//!
//! # Responsibility
//! - `ping` (default): verify `credvault_core` linkage and print the version.
//! - `purge`: permanently remove soft-deleted rows from the configured vault.
//!
//! Settings come from `CREDVAULT_*` environment variables.

use credvault_core::config::ENV_DB_PATH;
use credvault_core::{
    init_from_config, open_db, purge_deleted, CoreConfig, LifecycleContext, LoggingError,
};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = CoreConfig::from_env();
    match init_from_config(&config) {
        Ok(()) | Err(LoggingError::MissingDirectory) => {}
        Err(err) => eprintln!("credvault: logging disabled: {err}"),
    }

    let command = std::env::args().nth(1).unwrap_or_else(|| "ping".to_string());
    match command.as_str() {
        "ping" => {
            println!("credvault_core ping={}", credvault_core::ping());
            println!("credvault_core version={}", credvault_core::core_version());
            ExitCode::SUCCESS
        }
        "purge" => match purge(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                error!("event=cli_purge module=cli status=error error={message}");
                eprintln!("credvault: purge failed: {message}");
                ExitCode::FAILURE
            }
        },
        other => {
            eprintln!("credvault: unknown command `{other}`; expected ping|purge");
            ExitCode::from(2)
        }
    }
}

fn purge(config: &CoreConfig) -> Result<(), String> {
    let path = config
        .db_path
        .as_deref()
        .ok_or_else(|| format!("no vault configured; set {ENV_DB_PATH}"))?;
    let conn = open_db(path).map_err(|err| err.to_string())?;

    let report = purge_deleted(&conn, &config.identity(), LifecycleContext::default())
        .map_err(|err| err.to_string())?;
    println!(
        "purged passwords={} revisions={} relations={} total={}",
        report.passwords,
        report.revisions,
        report.relations,
        report.total()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::purge;
    use credvault_core::CoreConfig;

    #[test]
    fn purge_without_vault_path_fails() {
        let err = purge(&CoreConfig::default()).expect_err("no vault");
        assert!(err.contains("CREDVAULT_DB_PATH"));
    }

    #[test]
    fn purge_on_fresh_vault_removes_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = CoreConfig {
            db_path: Some(dir.path().join("vault.sqlite3")),
            ..CoreConfig::default()
        };
        purge(&config).expect("purge fresh vault");
    }
}
