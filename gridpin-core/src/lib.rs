//! GridPin Core - duress-aware ATM authentication and ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Grid, pattern, PIN, ledger and decoy entities
//! - **ports**: Trait definitions for external dependencies (UserRepository, AdviceProvider)
//! - **services**: Enrollment, ledger, session state machine, advice and speech
//! - **adapters**: Concrete implementations (DuckDB, in-memory, Gemini)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbUserRepository;
use adapters::gemini::GeminiClient;
use config::Config;
use ports::UserRepository;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorCategory, OperationResult};
pub use domain::{Coordinate, Grid, MaskedUser, PinVerdict, StatementLine, User};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Name of the user store inside the data directory
pub const DB_FILENAME: &str = "gridpin.duckdb";

/// Main context for GridPin operations
///
/// Holds the user store, configuration, event log and every service,
/// wired together the same way for each front end.
pub struct AtmContext {
    pub config: Config,
    pub repository: Arc<DuckDbUserRepository>,
    pub logger: Arc<LoggingService>,
    pub enrollment: Arc<EnrollmentService>,
    pub ledger: Arc<LedgerService>,
    pub sessions: SessionController,
    pub advisor: AdvisorService,
    pub speech: SpeechService,
}

impl AtmContext {
    /// Open the data directory: settings, user store and event log
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;

        let repository = Arc::new(DuckDbUserRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        let logger = Arc::new(LoggingService::new(
            data_dir,
            entry_point,
            env!("CARGO_PKG_VERSION"),
        )?);

        let store: Arc<dyn UserRepository> = repository.clone();
        let enrollment = Arc::new(EnrollmentService::new(Arc::clone(&store), Some(Arc::clone(&logger))));
        let ledger = Arc::new(LedgerService::new(Arc::clone(&store), Some(Arc::clone(&logger))));
        let sessions = SessionController::new(
            Arc::clone(&store),
            Arc::clone(&enrollment),
            Arc::clone(&ledger),
            Some(Arc::clone(&logger)),
            SessionOptions::from(&config),
        );

        let gemini = Arc::new(GeminiClient::new(&config.advisor)?);
        let advisor = AdvisorService::new(gemini.clone(), Some(Arc::clone(&logger)));
        let speech = SpeechService::new(gemini, Some(Arc::clone(&logger)));

        Ok(Self {
            config,
            repository,
            logger,
            enrollment,
            ledger,
            sessions,
            advisor,
            speech,
        })
    }
}
