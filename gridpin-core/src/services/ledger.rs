//! Ledger service - balance mutations with per-user serialization
//!
//! Every posting is a read-check-write against the store. Two postings for
//! the same user never interleave: each user id maps to its own mutex,
//! held from the balance read until the repository has committed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{TransactionRecord, User};
use crate::ports::UserRepository;
use crate::services::logging::{LogEvent, LoggingService};

/// Largest single withdrawal allowed under duress
pub const DURESS_LIMIT: i64 = 1_000;

/// Outcome of a committed posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub new_balance: i64,
    pub record: TransactionRecord,
}

/// Account ledger
pub struct LedgerService {
    repository: Arc<dyn UserRepository>,
    logger: Option<Arc<LoggingService>>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LedgerService {
    pub fn new(repository: Arc<dyn UserRepository>, logger: Option<Arc<LoggingService>>) -> Self {
        Self {
            repository,
            logger,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current stored state of a user
    pub fn user(&self, user_id: Uuid) -> Result<User> {
        self.repository
            .get_user_by_id(user_id)?
            .ok_or_else(|| Error::not_found("User not found."))
    }

    /// Deposit. No upper bound.
    pub fn credit(&self, user_id: Uuid, amount: i64) -> Result<Posting> {
        validate_amount(amount)?;
        self.post(user_id, |user| {
            let new_balance = user
                .balance
                .checked_add(amount)
                .ok_or_else(|| Error::validation("Invalid amount."))?;
            Ok((new_balance, TransactionRecord::credit(amount)))
        })
    }

    /// Withdrawal. Under duress the ceiling is checked before funds, so an
    /// oversized duress withdrawal fails the same way whatever the balance.
    pub fn debit(&self, user_id: Uuid, amount: i64, is_duress: bool) -> Result<Posting> {
        validate_amount(amount)?;
        if is_duress && amount > DURESS_LIMIT {
            if let Some(logger) = &self.logger {
                let _ = logger.log(
                    LogEvent::new("duress_limit_blocked")
                        .with_user(user_id)
                        .with_error_details(format!("limit {}", DURESS_LIMIT)),
                );
            }
            return Err(Error::DuressLimitExceeded { limit: DURESS_LIMIT });
        }

        let posting = self.post(user_id, |user| {
            if amount > user.balance {
                return Err(Error::InsufficientFunds);
            }
            Ok((user.balance - amount, TransactionRecord::debit(amount, is_duress)))
        })?;

        if is_duress {
            if let Some(logger) = &self.logger {
                let _ = logger.log(LogEvent::new("duress_alert").with_user(user_id));
            }
        }

        Ok(posting)
    }

    fn post<F>(&self, user_id: Uuid, decide: F) -> Result<Posting>
    where
        F: FnOnce(&User) -> Result<(i64, TransactionRecord)>,
    {
        let lock = self.lock_for(user_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::database("ledger lock poisoned"))?;

        let user = self.user(user_id)?;
        let (new_balance, record) = decide(&user)?;
        self.repository.apply_posting(user_id, new_balance, &record)?;

        Ok(Posting { new_balance, record })
    }

    fn lock_for(&self, user_id: Uuid) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::database("ledger lock table poisoned"))?;
        Ok(locks.entry(user_id).or_default().clone())
    }
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::validation("Invalid amount."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUserRepository;
    use crate::domain::{DuressPin, Pattern, TransactionKind};
    use crate::services::logging::EntryPoint;
    use proptest::prelude::*;

    fn setup() -> (LedgerService, Arc<InMemoryUserRepository>, Uuid) {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = User::new(
            "Alice",
            Pattern::parse(&["0,0", "1,1", "2,2", "3,3"]).unwrap(),
            DuressPin::parse("9876").unwrap(),
        );
        repo.insert_user(&user).unwrap();
        (LedgerService::new(repo.clone(), None), repo, user.id)
    }

    #[test]
    fn test_real_debit() {
        let (ledger, _, id) = setup();
        let posting = ledger.debit(id, 20_000, false).unwrap();
        assert_eq!(posting.new_balance, 30_000);
        assert_eq!(posting.record.kind, TransactionKind::Debit);
        assert!(!posting.record.under_duress);
        assert_eq!(ledger.user(id).unwrap().balance, 30_000);
    }

    #[test]
    fn test_insufficient_funds_leaves_state_untouched() {
        let (ledger, _, id) = setup();
        assert!(matches!(ledger.debit(id, 50_001, false), Err(Error::InsufficientFunds)));
        let user = ledger.user(id).unwrap();
        assert_eq!(user.balance, 50_000);
        assert!(user.transaction_history.is_empty());
    }

    #[test]
    fn test_duress_ceiling_checked_before_funds() {
        let (ledger, _, id) = setup();
        ledger.debit(id, 49_900, false).unwrap();
        // Only 100 left, but the ceiling error wins
        assert!(matches!(
            ledger.debit(id, 1_500, true),
            Err(Error::DuressLimitExceeded { limit: 1_000 })
        ));
        assert!(matches!(ledger.debit(id, 500, true), Err(Error::InsufficientFunds)));
    }

    #[test]
    fn test_duress_debit_is_tagged_and_alerted() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = User::new(
            "Alice",
            Pattern::parse(&["0,0", "1,1", "2,2", "3,3"]).unwrap(),
            DuressPin::parse("9876").unwrap(),
        );
        repo.insert_user(&user).unwrap();
        let logger = Arc::new(LoggingService::in_memory(EntryPoint::Cli, "test").unwrap());
        let ledger = LedgerService::new(repo, Some(logger.clone()));

        let posting = ledger.debit(user.id, 500, true).unwrap();
        assert!(posting.record.under_duress);
        assert_eq!(posting.new_balance, 49_500);

        let alerts = logger.get_by_event("duress_alert", 10).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].user_id, Some(user.id.to_string()));

        // Over the ceiling: nothing posted, the limit goes to the audit log only
        assert!(ledger.debit(user.id, 1_500, true).is_err());
        let blocked = logger.get_by_event("duress_limit_blocked", 10).unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].error_details.as_deref(), Some("limit 1000"));
        assert!(blocked[0].error_message.is_none());
        assert_eq!(ledger.user(user.id).unwrap().balance, 49_500);
    }

    #[test]
    fn test_invalid_amounts() {
        let (ledger, _, id) = setup();
        assert!(matches!(ledger.credit(id, 0), Err(Error::Validation(_))));
        assert!(matches!(ledger.debit(id, -5, false), Err(Error::Validation(_))));
        assert!(matches!(ledger.credit(id, i64::MAX), Err(Error::Validation(_))));
        assert!(ledger.user(id).unwrap().transaction_history.is_empty());
    }

    #[test]
    fn test_unknown_user() {
        let (ledger, _, _) = setup();
        assert!(matches!(ledger.credit(Uuid::new_v4(), 10), Err(Error::NotFound(_))));
    }

    proptest! {
        #[test]
        fn prop_overdraw_always_rejected(excess in 1i64..1_000_000) {
            let (ledger, _, id) = setup();
            let result = ledger.debit(id, 50_000 + excess, false);
            prop_assert!(matches!(result, Err(Error::InsufficientFunds)));
            prop_assert_eq!(ledger.user(id).unwrap().balance, 50_000);
        }

        #[test]
        fn prop_duress_over_limit_always_rejected(amount in 1_001i64..10_000_000) {
            let (ledger, _, id) = setup();
            let result = ledger.debit(id, amount, true);
            prop_assert!(
                matches!(result, Err(Error::DuressLimitExceeded { .. })),
                "expected DuressLimitExceeded"
            );
        }

        #[test]
        fn prop_credit_then_debit_round_trips(amount in 1i64..1_000_000) {
            let (ledger, _, id) = setup();
            ledger.credit(id, amount).unwrap();
            ledger.debit(id, amount, false).unwrap();
            let user = ledger.user(id).unwrap();
            prop_assert_eq!(user.balance, 50_000);
            prop_assert_eq!(user.transaction_history.len(), 2);
        }
    }
}
