//! Repository port - the key-value user store

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{TransactionRecord, User};

/// User store abstraction
///
/// Implementations (adapters) provide the actual persistence. Lookups
/// return `Ok(None)` for unknown users; the services decide whether that
/// is an error.
pub trait UserRepository: Send + Sync {
    /// Insert a newly registered user. Fails with `AlreadyExists` on a name clash.
    fn insert_user(&self, user: &User) -> Result<()>;

    /// Get a user, with full history, by unique name
    fn get_user_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Get a user, with full history, by id
    fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// All registered users, oldest first
    fn list_users(&self) -> Result<Vec<User>>;

    /// Persist a ledger posting: set the new balance and append the record.
    ///
    /// Both changes commit together or not at all.
    fn apply_posting(&self, user_id: Uuid, new_balance: i64, record: &TransactionRecord)
        -> Result<()>;
}
