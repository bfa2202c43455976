//! In-memory user store

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{TransactionRecord, User};
use crate::ports::UserRepository;

/// `HashMap`-backed user store, used by tests and throwaway sessions
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> Error {
        Error::database("user store lock poisoned")
    }
}

impl UserRepository for InMemoryUserRepository {
    fn insert_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        if users.values().any(|u| u.name == user.name) {
            return Err(Error::AlreadyExists);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.values().find(|u| u.name == name).cloned())
    }

    fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.get(&id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(all)
    }

    fn apply_posting(&self, user_id: Uuid, new_balance: i64, record: &TransactionRecord) -> Result<()> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| Error::not_found("User not found."))?;
        user.balance = new_balance;
        user.transaction_history.push(record.clone());
        Ok(())
    }
}
