//! Event log schema for `logs.duckdb`

pub const LOG_MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema.sql",
    include_str!("001_initial_schema.sql"),
)];
