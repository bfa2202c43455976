//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pattern::Pattern;
use super::pin::DuressPin;
use super::transaction::{StatementLine, TransactionRecord};

/// Opening balance for every new card
pub const DEFAULT_BALANCE: i64 = 50_000;

/// A registered card holder
///
/// The ledger fields (`balance`, `transaction_history`) are only ever
/// changed by the ledger service. Duress sessions never touch `balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub pattern: Pattern,
    pub duress_pin: DuressPin,
    pub balance: i64,
    pub transaction_history: Vec<TransactionRecord>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, pattern: Pattern, duress_pin: DuressPin) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pattern,
            duress_pin,
            balance: DEFAULT_BALANCE,
            transaction_history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// View safe to hand to the caller: no pattern, no duress PIN
    pub fn masked(&self) -> MaskedUser {
        MaskedUser {
            id: self.id,
            name: self.name.clone(),
            balance: self.balance,
            transaction_history: self
                .transaction_history
                .iter()
                .map(TransactionRecord::statement_line)
                .collect(),
        }
    }
}

/// Public projection of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedUser {
    pub id: Uuid,
    pub name: String,
    pub balance: i64,
    pub transaction_history: Vec<StatementLine>,
}
