//! Integration tests for gridpin-core services
//!
//! These tests run the enrollment, login and ledger flows end to end
//! against real DuckDB files. Only the advice/speech backend is faked.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;
use tempfile::TempDir;

use gridpin_core::adapters::duckdb::DuckDbUserRepository;
use gridpin_core::domain::{
    classify, derive_pin, Coordinate, Grid, Pattern, PinVerdict, TransactionKind, GRID_SIZE,
};
use gridpin_core::ports::UserRepository;
use gridpin_core::services::{
    EnrollmentService, EntryPoint, LedgerService, LoggingService, SessionController,
    SessionOptions,
};
use gridpin_core::{AtmContext, Error};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbUserRepository> {
    let db_path = temp_dir.path().join("test.duckdb");
    let repo = DuckDbUserRepository::new(&db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    Arc::new(repo)
}

struct Services {
    repo: Arc<DuckDbUserRepository>,
    enrollment: Arc<EnrollmentService>,
    ledger: Arc<LedgerService>,
    sessions: SessionController,
    logger: Arc<LoggingService>,
}

fn create_services(temp_dir: &TempDir) -> Services {
    let db = create_test_repo(temp_dir);
    let repo: Arc<dyn UserRepository> = db.clone();
    let logger = Arc::new(LoggingService::new(temp_dir.path(), EntryPoint::Cli, "test").unwrap());
    let enrollment = Arc::new(EnrollmentService::new(repo.clone(), Some(logger.clone())));
    let ledger = Arc::new(LedgerService::new(repo.clone(), Some(logger.clone())));
    let sessions = SessionController::new(
        repo,
        enrollment.clone(),
        ledger.clone(),
        Some(logger.clone()),
        SessionOptions {
            rng_seed: Some(42),
            ..SessionOptions::default()
        },
    );
    Services {
        repo: db,
        enrollment,
        ledger,
        sessions,
        logger,
    }
}

const ALICE_CELLS: [&str; 4] = ["0,0", "1,1", "2,2", "3,3"];

// ============================================================================
// Scenario: Alice's grid
// ============================================================================

#[test]
fn test_alice_pin_derivation_and_classification() {
    let mut rows = [[0u8; GRID_SIZE]; GRID_SIZE];
    rows[0][0] = 4;
    rows[1][1] = 7;
    rows[2][2] = 1;
    rows[3][3] = 9;
    let grid = Grid::from_rows(rows).unwrap();
    let pattern = Pattern::parse(&ALICE_CELLS).unwrap();

    let dynamic = derive_pin(pattern.cells(), &grid).unwrap();
    assert_eq!(dynamic, "4719");

    assert_eq!(classify("4719", &dynamic, "9876"), PinVerdict::Real);
    assert_eq!(classify("9876", &dynamic, "9876"), PinVerdict::Duress);
    assert_eq!(classify("0000", &dynamic, "9876"), PinVerdict::Invalid);
}

#[test]
fn test_out_of_range_coordinate_rejected() {
    let grid = Grid::from_rows([[5u8; GRID_SIZE]; GRID_SIZE]).unwrap();
    let off_grid = [Coordinate { row: 0, col: 0 }, Coordinate { row: 9, col: 0 }];
    assert!(matches!(derive_pin(&off_grid, &grid), Err(Error::InvalidCoordinate(_))));
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_weak_duress_pin_rejected_before_persistence() {
    let temp_dir = TempDir::new().unwrap();
    let s = create_services(&temp_dir);

    let err = s.enrollment.register_raw("Alice", &ALICE_CELLS, "1234").unwrap_err();
    assert!(matches!(err, Error::WeakDuressPin));

    assert!(s.repo.list_users().unwrap().is_empty());
}

#[test]
fn test_registration_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let id = {
        let s = create_services(&temp_dir);
        s.enrollment.register_raw("Alice", &ALICE_CELLS, "9876").unwrap().id
    };

    let repo = create_test_repo(&temp_dir);
    let alice = repo.get_user_by_name("Alice").unwrap().unwrap();
    assert_eq!(alice.id, id);
    assert_eq!(alice.balance, 50_000);
    assert_eq!(alice.pattern, Pattern::parse(&ALICE_CELLS).unwrap());
    assert_eq!(alice.duress_pin.as_str(), "9876");
}

// ============================================================================
// Ledger
// ============================================================================

#[test]
fn test_ledger_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let s = create_services(&temp_dir);
    let alice = s.enrollment.register_raw("Alice", &ALICE_CELLS, "9876").unwrap();

    assert_eq!(s.ledger.debit(alice.id, 20_000, false).unwrap().new_balance, 30_000);
    assert!(matches!(
        s.ledger.debit(alice.id, 1_500, true),
        Err(Error::DuressLimitExceeded { limit: 1_000 })
    ));
    let posting = s.ledger.debit(alice.id, 500, true).unwrap();
    assert!(posting.record.under_duress);

    // Duress debits hit the real ledger and raise an alert
    let stored = s.repo.get_user_by_id(alice.id).unwrap().unwrap();
    assert_eq!(stored.balance, 29_500);
    assert_eq!(stored.transaction_history.len(), 2);
    assert!(stored.transaction_history[1].under_duress);
    assert_eq!(s.logger.get_by_event("duress_alert", 10).unwrap().len(), 1);
}

#[test]
fn test_failed_debit_leaves_ledger_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let s = create_services(&temp_dir);
    let alice = s.enrollment.register_raw("Alice", &ALICE_CELLS, "9876").unwrap();

    assert!(matches!(s.ledger.debit(alice.id, 50_001, false), Err(Error::InsufficientFunds)));

    let stored = s.ledger.user(alice.id).unwrap();
    assert_eq!(stored.balance, 50_000);
    assert!(stored.transaction_history.is_empty());
}

#[test]
fn test_credit_debit_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let s = create_services(&temp_dir);
    let alice = s.enrollment.register_raw("Alice", &ALICE_CELLS, "9876").unwrap();

    s.ledger.credit(alice.id, 7_777).unwrap();
    s.ledger.debit(alice.id, 7_777, false).unwrap();

    let stored = s.ledger.user(alice.id).unwrap();
    assert_eq!(stored.balance, 50_000);
    let kinds: Vec<_> = stored.transaction_history.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TransactionKind::Credit, TransactionKind::Debit]);
}

// ============================================================================
// Full session
// ============================================================================

#[test]
fn test_session_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let s = create_services(&temp_dir);
    let c = &s.sessions;

    let sid = c.open().unwrap();
    c.begin_enrollment(sid, "Alice").unwrap();
    for cell in ALICE_CELLS {
        c.toggle_cell(sid, cell.parse().unwrap()).unwrap();
    }
    c.complete_enrollment(sid, "9876").unwrap();

    let challenge = c.login(sid, "Alice").unwrap();
    assert!(challenge.dynamic_pin.is_none());
    let pin = Pattern::parse(&ALICE_CELLS).unwrap().derive_pin(&challenge.grid).unwrap();

    let auth = c.authenticate(sid, &pin).unwrap();
    assert_eq!(auth.verdict, PinVerdict::Real);

    let receipt = c.withdraw(sid, 20_000).unwrap();
    assert_eq!(receipt.balance, 30_000);
    let view = c.account_view(sid).unwrap();
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.history[0].description, "ATM Withdrawal");
    c.logout(sid).unwrap();
}

#[test]
fn test_context_opens_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("gridpin");

    {
        let ctx = AtmContext::new(&data_dir, EntryPoint::Cli).unwrap();
        ctx.enrollment.register_raw("Alice", &ALICE_CELLS, "9876").unwrap();
    }

    assert!(data_dir.join("gridpin.duckdb").exists());
    assert!(data_dir.join("logs.duckdb").exists());

    let ctx = AtmContext::new(&data_dir, EntryPoint::Cli).unwrap();
    assert_eq!(ctx.repository.list_users().unwrap().len(), 1);
    assert_eq!(ctx.logger.get_by_event("user_registered", 10).unwrap().len(), 1);
}
