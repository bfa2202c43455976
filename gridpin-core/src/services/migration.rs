//! Embedded schema migrations
//!
//! The user store and the event log each keep a `sys_migrations` table
//! naming the scripts already applied. The runner owns that table, then
//! applies the remaining scripts in list order. A script and its tracking
//! row commit together, so a failed script leaves no trace.

use std::collections::HashSet;

use anyhow::{Context, Result};
use duckdb::Connection;

const TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS sys_migrations (
    migration_name VARCHAR PRIMARY KEY,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// Outcome of one migration run
#[derive(Debug, Default)]
pub struct MigrationResult {
    /// Scripts applied by this run, in order
    pub applied: Vec<String>,
    /// Scripts that were already recorded
    pub already_applied: usize,
}

/// Applies `(name, sql)` scripts to a DuckDB connection
pub struct MigrationService;

impl MigrationService {
    /// Apply every script in `migrations` the connection has not recorded yet
    pub fn run(conn: &Connection, migrations: &[(&str, &str)]) -> Result<MigrationResult> {
        conn.execute_batch(TRACKING_TABLE)
            .context("Failed to create sys_migrations")?;
        let recorded = Self::recorded(conn)?;

        let mut result = MigrationResult::default();
        for (name, sql) in migrations {
            if recorded.contains(*name) {
                result.already_applied += 1;
                continue;
            }
            Self::apply(conn, name, sql)?;
            result.applied.push(name.to_string());
        }
        Ok(result)
    }

    fn recorded(conn: &Connection) -> Result<HashSet<String>> {
        let mut stmt = conn.prepare("SELECT migration_name FROM sys_migrations")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    fn apply(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        let outcome = conn.execute_batch(sql).and_then(|_| {
            conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])
        });

        match outcome {
            Ok(_) => {
                conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(anyhow::Error::new(e).context(format!("Migration {} failed", name)))
            }
        }
    }
}
