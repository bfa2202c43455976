//! User store schema, embedded with `include_str!`
//!
//! Applied in list order by [`crate::services::MigrationService`]. Append
//! new scripts as `NNN_description.sql`; never edit one that has shipped.

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema.sql",
    include_str!("001_initial_schema.sql"),
)];
