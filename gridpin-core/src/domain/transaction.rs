//! Transaction domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Description used for every deposit
pub const DEPOSIT_DESCRIPTION: &str = "ATM Deposit";

/// Description used for every withdrawal, duress or not
pub const WITHDRAWAL_DESCRIPTION: &str = "ATM Withdrawal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Debit,
    Credit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Debit => "debit",
            TransactionKind::Credit => "credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(TransactionKind::Debit),
            "credit" => Some(TransactionKind::Credit),
            _ => None,
        }
    }
}

/// A ledger entry as stored
///
/// `under_duress` is audit data. It must never reach whoever is operating
/// the session; use [`StatementLine`] for anything caller-facing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub under_duress: bool,
}

impl TransactionRecord {
    pub fn credit(amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Credit,
            amount,
            description: DEPOSIT_DESCRIPTION.to_string(),
            timestamp: Utc::now(),
            under_duress: false,
        }
    }

    pub fn debit(amount: i64, under_duress: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Debit,
            amount,
            description: WITHDRAWAL_DESCRIPTION.to_string(),
            timestamp: Utc::now(),
            under_duress,
        }
    }

    pub fn statement_line(&self) -> StatementLine {
        StatementLine {
            kind: self.kind,
            amount: self.amount,
            description: self.description.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Caller-facing view of a ledger entry, without audit fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}
