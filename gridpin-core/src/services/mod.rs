//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod advisor;
mod enrollment;
pub mod ledger;
pub mod logging;
pub mod migration;
pub mod session;
mod speech;

pub use advisor::AdvisorService;
pub use enrollment::EnrollmentService;
pub use ledger::{LedgerService, Posting, DURESS_LIMIT};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use session::{
    AccountView, Authentication, KeypadStatus, LoginChallenge, Receipt, SelectionStatus,
    SessionController, SessionId, SessionOptions, SessionPhase,
};
pub use speech::SpeechService;
