//! Enrollment service - card holder registration

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{DuressPin, Pattern, User};
use crate::ports::UserRepository;
use crate::services::logging::{LogEvent, LoggingService};

/// Registers new card holders
pub struct EnrollmentService {
    repository: Arc<dyn UserRepository>,
    logger: Option<Arc<LoggingService>>,
}

impl EnrollmentService {
    pub fn new(repository: Arc<dyn UserRepository>, logger: Option<Arc<LoggingService>>) -> Self {
        Self { repository, logger }
    }

    /// Register a user from already-validated parts
    ///
    /// Fails with `AlreadyExists` if the name is taken. Nothing is written
    /// on failure. A pattern that repeats a cell is accepted but reported.
    pub fn register(&self, name: &str, pattern: Pattern, duress_pin: DuressPin) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Name is required."));
        }

        let user = User::new(name, pattern, duress_pin);
        self.repository.insert_user(&user)?;

        self.log(LogEvent::new("user_registered").with_user(user.id));
        if user.pattern.has_duplicates() {
            self.log(LogEvent::new("weak_pattern").with_user(user.id));
        }

        Ok(user)
    }

    /// Register from raw caller input (`"r,c"` positions and PIN text)
    ///
    /// Checks run in order: name, pattern, duress PIN, uniqueness.
    pub fn register_raw<S: AsRef<str>>(&self, name: &str, positions: &[S], duress_pin: &str) -> Result<User> {
        if name.trim().is_empty() {
            return Err(Error::validation("Name is required."));
        }
        let pattern = Pattern::parse(positions)?;
        let duress_pin = DuressPin::parse(duress_pin)?;
        self.register(name, pattern, duress_pin)
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event);
        }
    }
}
