//! Concurrent ledger access tests
//!
//! Many threads withdraw from the same account at once. Per-user
//! serialization in the ledger must keep the balance from ever going
//! negative and must not lose any committed posting.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

use gridpin_core::adapters::duckdb::DuckDbUserRepository;
use gridpin_core::adapters::memory::InMemoryUserRepository;
use gridpin_core::domain::{DuressPin, Pattern, User};
use gridpin_core::ports::UserRepository;
use gridpin_core::services::LedgerService;
use gridpin_core::Error;

/// Number of concurrent threads
const THREAD_COUNT: usize = 8;

/// Withdrawals attempted per thread
const ITERATIONS_PER_THREAD: usize = 10;

fn create_user(name: &str) -> User {
    User::new(
        name,
        Pattern::parse(&["0,0", "1,1", "2,2", "3,3"]).unwrap(),
        DuressPin::parse("9876").unwrap(),
    )
}

/// Hammer one account and check nothing was overdrawn or lost
fn run_withdrawal_race(repo: Arc<dyn UserRepository>, amount: i64) {
    let user = create_user("Alice");
    repo.insert_user(&user).unwrap();
    let ledger = Arc::new(LedgerService::new(repo.clone(), None));

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));
    let refused_count = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for _ in 0..THREAD_COUNT {
        let ledger = Arc::clone(&ledger);
        let barrier = Arc::clone(&barrier);
        let success_count = Arc::clone(&success_count);
        let refused_count = Arc::clone(&refused_count);
        let user_id = user.id;

        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..ITERATIONS_PER_THREAD {
                match ledger.debit(user_id, amount, false) {
                    Ok(posting) => {
                        assert!(posting.new_balance >= 0);
                        success_count.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(Error::InsufficientFunds) => {
                        refused_count.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => panic!("unexpected ledger error: {}", e),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let successes = success_count.load(Ordering::SeqCst);
    let refused = refused_count.load(Ordering::SeqCst);
    let expected_successes = (50_000 / amount) as usize;

    println!(
        "amount={} successes={} refused={}",
        amount, successes, refused
    );

    let stored = repo.get_user_by_id(user.id).unwrap().unwrap();
    assert_eq!(successes + refused, THREAD_COUNT * ITERATIONS_PER_THREAD);
    assert_eq!(successes, expected_successes);
    assert_eq!(stored.balance, 50_000 - amount * successes as i64);
    assert_eq!(stored.transaction_history.len(), successes);
    assert!(stored.balance >= 0);
}

#[test]
fn test_concurrent_withdrawals_in_memory() {
    // 80 attempts of 1,000 against 50,000: exactly 50 may succeed
    run_withdrawal_race(Arc::new(InMemoryUserRepository::new()), 1_000);
}

#[test]
fn test_concurrent_withdrawals_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    let repo = DuckDbUserRepository::new(&temp_dir.path().join("race.duckdb")).unwrap();
    repo.ensure_schema().unwrap();

    run_withdrawal_race(Arc::new(repo), 3_000);
}

#[test]
fn test_different_users_do_not_block_each_other() {
    let repo: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
    let ledger = Arc::new(LedgerService::new(repo.clone(), None));

    let users: Vec<User> = (0..THREAD_COUNT).map(|i| create_user(&format!("user{}", i))).collect();
    for user in &users {
        repo.insert_user(user).unwrap();
    }

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let user_id = user.id;
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ITERATIONS_PER_THREAD {
                    ledger.credit(user_id, 100).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    for user in &users {
        let stored = repo.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.balance, 50_000 + 100 * ITERATIONS_PER_THREAD as i64);
    }
}
