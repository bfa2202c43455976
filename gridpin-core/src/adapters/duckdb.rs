//! DuckDB user store implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use uuid::Uuid;

use crate::domain::result::{Error, Result as DomainResult};
use crate::migrations::MIGRATIONS;
use crate::domain::{DuressPin, Pattern, TransactionKind, TransactionRecord, User};
use crate::ports::UserRepository;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Raw users row before domain validation
struct UserRow {
    id: String,
    name: String,
    pattern: String,
    duress_pin: String,
    balance: i64,
    created_at: String,
}

/// Raw user_transactions row before domain validation
struct TransactionRow {
    id: String,
    kind: String,
    amount: i64,
    description: String,
    created_at: String,
    under_duress: bool,
}

/// DuckDB user store
pub struct DuckDbUserRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbUserRepository {
    /// Open (or create) a user store file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which occur when another process (e.g. a second CLI invocation) holds
    /// the database.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[gridpin] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs it
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)
            .with_context(|| format!("Failed to open user store at {}", db_path.display()))?;
        Ok(conn)
    }

    /// Path of the backing file, if any
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Apply any user store migrations not yet recorded
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::run(&conn, MIGRATIONS)
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    // === User operations ===

    fn name_exists_on(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE name = ?",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a user row. Returns false when the name is taken.
    pub fn create_user(&self, user: &User) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if Self::name_exists_on(&tx, &user.name)? {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO users (user_id, name, pattern, duress_pin, balance, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                user.id.to_string(),
                &user.name,
                serde_json::to_string(&user.pattern)?,
                user.duress_pin.as_str(),
                user.balance,
                user.created_at.to_rfc3339(),
            ],
        )?;

        for (seq, record) in user.transaction_history.iter().enumerate() {
            Self::insert_record(&tx, user.id, seq as i64 + 1, record)?;
        }

        tx.commit()?;
        Ok(true)
    }

    pub fn find_user(&self, column: UserKey<'_>) -> Result<Option<User>> {
        let conn = self.lock()?;
        let (sql, value) = match column {
            UserKey::Id(id) => (
                "SELECT user_id, name, pattern, duress_pin, balance, created_at
                 FROM users WHERE user_id = ?",
                id.to_string(),
            ),
            UserKey::Name(name) => (
                "SELECT user_id, name, pattern, duress_pin, balance, created_at
                 FROM users WHERE name = ?",
                name.to_string(),
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query_map([value], Self::map_user_row)?;
        let row = match rows.next() {
            Some(row) => row?,
            None => return Ok(None),
        };
        drop(rows);

        let history = Self::load_history(&conn, &row.id)?;
        Ok(Some(Self::build_user(row, history)?))
    }

    pub fn get_users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, name, pattern, duress_pin, balance, created_at
             FROM users ORDER BY created_at, name",
        )?;
        let rows = stmt
            .query_map([], Self::map_user_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let history = Self::load_history(&conn, &row.id)?;
            users.push(Self::build_user(row, history)?);
        }
        Ok(users)
    }

    /// Update the balance and append one record atomically
    pub fn post(&self, user_id: Uuid, new_balance: i64, record: &TransactionRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = user_id.to_string();

        let updated = tx.execute(
            "UPDATE users SET balance = ? WHERE user_id = ?",
            params![new_balance, &id],
        )?;
        if updated == 0 {
            return Err(anyhow!("user {} not found", user_id));
        }

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM user_transactions WHERE user_id = ?",
            [&id],
            |row| row.get(0),
        )?;
        Self::insert_record(&tx, user_id, next_seq, record)?;

        tx.commit()?;
        Ok(())
    }

    /// Number of stored ledger records across all users
    pub fn get_transaction_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM user_transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    fn insert_record(
        conn: &Connection,
        user_id: Uuid,
        seq: i64,
        record: &TransactionRecord,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO user_transactions
                (transaction_id, user_id, kind, amount, description, created_at, seq, under_duress)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id.to_string(),
                user_id.to_string(),
                record.kind.as_str(),
                record.amount,
                &record.description,
                record.timestamp.to_rfc3339(),
                seq,
                record.under_duress,
            ],
        )?;
        Ok(())
    }

    fn load_history(conn: &Connection, user_id: &str) -> Result<Vec<TransactionRecord>> {
        let mut stmt = conn.prepare(
            "SELECT transaction_id, kind, amount, description, created_at, under_duress
             FROM user_transactions WHERE user_id = ? ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok(TransactionRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    amount: row.get(2)?,
                    description: row.get(3)?,
                    created_at: row.get(4)?,
                    under_duress: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| -> Result<TransactionRecord> {
                Ok(TransactionRecord {
                    id: Uuid::parse_str(&row.id)?,
                    kind: TransactionKind::parse(&row.kind)
                        .ok_or_else(|| anyhow!("unknown transaction kind '{}'", row.kind))?,
                    amount: row.amount,
                    description: row.description,
                    timestamp: parse_timestamp(&row.created_at)?,
                    under_duress: row.under_duress,
                })
            })
            .collect()
    }

    fn map_user_row(row: &duckdb::Row) -> duckdb::Result<UserRow> {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
            pattern: row.get(2)?,
            duress_pin: row.get(3)?,
            balance: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn build_user(row: UserRow, transaction_history: Vec<TransactionRecord>) -> Result<User> {
        let pattern: Pattern = serde_json::from_str(&row.pattern)
            .with_context(|| format!("stored pattern for '{}' is corrupt", row.name))?;
        let duress_pin = DuressPin::parse(&row.duress_pin)
            .map_err(|e| anyhow!("stored duress PIN for '{}' is invalid: {}", row.name, e))?;

        Ok(User {
            id: Uuid::parse_str(&row.id)?,
            name: row.name,
            pattern,
            duress_pin,
            balance: row.balance,
            transaction_history,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Lookup key for [`DuckDbUserRepository::find_user`]
#[derive(Debug, Clone, Copy)]
pub enum UserKey<'a> {
    Id(Uuid),
    Name(&'a str),
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp '{}'", s))?
        .with_timezone(&Utc))
}

fn storage_error(e: anyhow::Error) -> Error {
    Error::database(format!("{:#}", e))
}

impl UserRepository for DuckDbUserRepository {
    fn insert_user(&self, user: &User) -> DomainResult<()> {
        if self.create_user(user).map_err(storage_error)? {
            Ok(())
        } else {
            Err(Error::AlreadyExists)
        }
    }

    fn get_user_by_name(&self, name: &str) -> DomainResult<Option<User>> {
        self.find_user(UserKey::Name(name)).map_err(storage_error)
    }

    fn get_user_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        self.find_user(UserKey::Id(id)).map_err(storage_error)
    }

    fn list_users(&self) -> DomainResult<Vec<User>> {
        self.get_users().map_err(storage_error)
    }

    fn apply_posting(
        &self,
        user_id: Uuid,
        new_balance: i64,
        record: &TransactionRecord,
    ) -> DomainResult<()> {
        self.post(user_id, new_balance, record).map_err(storage_error)
    }
}
