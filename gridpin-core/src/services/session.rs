//! Session controller - the ATM state machine
//!
//! Sessions live in a store keyed by [`SessionId`] and owned by the
//! controller. Each one moves through:
//!
//! ```text
//! Anonymous -> Enrolling -> Anonymous
//! Anonymous -> AwaitingPin -> AuthenticatedReal | AuthenticatedDuress
//! any state -> logout (session dropped)
//! ```
//!
//! Sessions untouched for longer than the idle timeout are dropped the
//! next time the store is accessed.
//!
//! The dynamic PIN and the real/duress mode stay inside the controller.
//! Everything handed back to the caller (receipts, balances, statements)
//! looks the same shape in both modes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::domain::{
    classify, Coordinate, DecoyBalance, DuressPin, Grid, MaskedUser, PatternSelection, PinBuffer,
    PinVerdict, SelectionChange, StatementLine, TransactionKind,
};
use crate::ports::UserRepository;
use crate::services::enrollment::EnrollmentService;
use crate::services::ledger::{LedgerService, Posting};
use crate::services::logging::{LogEvent, LoggingService};

const WRONG_STATE: &str = "operation not allowed in current session state";
const LOCKED_OUT: &str = "too many incorrect PIN attempts";

/// Opaque handle for one ATM session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Controller settings
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Hand the dynamic PIN back with the login challenge (demo only)
    pub reveal_dynamic_pin: bool,
    /// Wrong PINs allowed before the session is reset; `None` never locks out
    pub max_pin_attempts: Option<u32>,
    /// Fixed seed for grids and decoy balances
    pub rng_seed: Option<u64>,
    /// Drop sessions idle for this long; `None` keeps them until logout
    pub idle_timeout: Option<Duration>,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            reveal_dynamic_pin: config.reveal_dynamic_pin,
            max_pin_attempts: config.max_pin_attempts,
            rng_seed: config.rng_seed,
            idle_timeout: config.session_idle_timeout,
        }
    }
}

#[derive(Debug, Clone)]
enum SessionState {
    Anonymous,
    Enrolling {
        name: String,
        selection: PatternSelection,
    },
    AwaitingPin {
        user_id: Uuid,
        grid: Grid,
        dynamic_pin: String,
        buffer: PinBuffer,
        failed_attempts: u32,
    },
    AuthenticatedReal {
        user_id: Uuid,
    },
    AuthenticatedDuress {
        user_id: Uuid,
        decoy_balance: i64,
    },
}

/// Coarse session state, safe to show to whoever holds the session
///
/// Real and duress sessions both report `Authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    Enrolling,
    AwaitingPin,
    Authenticated,
}

/// Enrollment progress after a toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionStatus {
    pub change: SelectionChange,
    pub selected: Vec<Coordinate>,
    pub complete: bool,
}

/// What the ATM shows after a login request
///
/// The balance is withheld until the PIN has been classified, since the
/// mode is not known yet.
#[derive(Debug, Clone, Serialize)]
pub struct LoginChallenge {
    pub user_id: Uuid,
    pub name: String,
    pub grid: Grid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_pin: Option<String>,
}

/// Keypad display after a key press
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeypadStatus {
    pub masked: String,
    pub ready: bool,
}

/// Outcome of a PIN submission
///
/// On `Invalid` a fresh grid is issued and the keypad is cleared.
#[derive(Debug, Clone, Serialize)]
pub struct Authentication {
    pub verdict: PinVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_grid: Option<Grid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_pin: Option<String>,
}

/// Printed after a withdrawal or deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance: i64,
    pub timestamp: DateTime<Utc>,
}

/// Account summary for the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub name: String,
    pub balance: i64,
    pub history: Vec<StatementLine>,
}

struct Slot {
    state: SessionState,
    touched: Instant,
}

type SessionMap = HashMap<SessionId, Slot>;

#[derive(Clone, Copy)]
enum Mode {
    Real,
    Duress,
}

/// Owns every live session and routes its operations
pub struct SessionController {
    repository: Arc<dyn UserRepository>,
    enrollment: Arc<EnrollmentService>,
    ledger: Arc<LedgerService>,
    logger: Option<Arc<LoggingService>>,
    options: SessionOptions,
    rng: Mutex<StdRng>,
    sessions: Mutex<SessionMap>,
}

impl SessionController {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        enrollment: Arc<EnrollmentService>,
        ledger: Arc<LedgerService>,
        logger: Option<Arc<LoggingService>>,
        options: SessionOptions,
    ) -> Self {
        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            repository,
            enrollment,
            ledger,
            logger,
            options,
            rng: Mutex::new(rng),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new anonymous session
    pub fn open(&self) -> Result<SessionId> {
        let id = SessionId::new();
        self.sessions()?.insert(
            id,
            Slot {
                state: SessionState::Anonymous,
                touched: Instant::now(),
            },
        );
        Ok(id)
    }

    pub fn phase(&self, sid: SessionId) -> Result<SessionPhase> {
        let mut sessions = self.sessions()?;
        let phase = match lookup_mut(&mut sessions, sid)? {
            SessionState::Anonymous => SessionPhase::Anonymous,
            SessionState::Enrolling { .. } => SessionPhase::Enrolling,
            SessionState::AwaitingPin { .. } => SessionPhase::AwaitingPin,
            SessionState::AuthenticatedReal { .. } | SessionState::AuthenticatedDuress { .. } => {
                SessionPhase::Authenticated
            }
        };
        Ok(phase)
    }

    /// Return to `Anonymous` without dropping the session
    pub fn cancel(&self, sid: SessionId) -> Result<()> {
        let mut sessions = self.sessions()?;
        *lookup_mut(&mut sessions, sid)? = SessionState::Anonymous;
        Ok(())
    }

    /// Discard the session and everything in it
    pub fn logout(&self, sid: SessionId) -> Result<()> {
        self.sessions()?
            .remove(&sid)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("Session not found."))
    }

    // ==================== Enrollment ====================

    pub fn begin_enrollment(&self, sid: SessionId, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Name is required."));
        }

        let mut sessions = self.sessions()?;
        let state = lookup_mut(&mut sessions, sid)?;
        if !matches!(state, SessionState::Anonymous) {
            return Err(Error::validation(WRONG_STATE));
        }
        *state = SessionState::Enrolling {
            name: name.to_string(),
            selection: PatternSelection::new(),
        };
        Ok(())
    }

    /// Toggle one grid cell in the pattern being enrolled
    pub fn toggle_cell(&self, sid: SessionId, coord: Coordinate) -> Result<SelectionStatus> {
        let mut sessions = self.sessions()?;
        match lookup_mut(&mut sessions, sid)? {
            SessionState::Enrolling { selection, .. } => {
                let change = selection.toggle(coord)?;
                Ok(SelectionStatus {
                    change,
                    selected: selection.selected().to_vec(),
                    complete: selection.is_complete(),
                })
            }
            _ => Err(Error::validation(WRONG_STATE)),
        }
    }

    /// Finish enrollment with the chosen duress PIN
    ///
    /// On success the session returns to `Anonymous`. A taken name also
    /// resets it; any other failure keeps the selection so the caller can
    /// fix the PIN or pattern and retry.
    pub fn complete_enrollment(&self, sid: SessionId, duress_pin: &str) -> Result<MaskedUser> {
        let (name, selection) = {
            let mut sessions = self.sessions()?;
            match lookup_mut(&mut sessions, sid)? {
                SessionState::Enrolling { name, selection } => (name.clone(), selection.clone()),
                _ => return Err(Error::validation(WRONG_STATE)),
            }
        };

        let pattern = selection.finish()?;
        let duress_pin = DuressPin::parse(duress_pin)?;

        match self.enrollment.register(&name, pattern, duress_pin) {
            Ok(user) => {
                self.set_state(sid, SessionState::Anonymous)?;
                Ok(user.masked())
            }
            Err(Error::AlreadyExists) => {
                self.set_state(sid, SessionState::Anonymous)?;
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    // ==================== Login ====================

    /// Look the user up and issue a fresh grid
    pub fn login(&self, sid: SessionId, name: &str) -> Result<LoginChallenge> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Name is required."));
        }
        if !matches!(self.snapshot(sid)?, SessionState::Anonymous) {
            return Err(Error::validation(WRONG_STATE));
        }

        let user = self
            .repository
            .get_user_by_name(name)?
            .ok_or_else(|| Error::not_found("User not found."))?;

        let grid = self.fresh_grid()?;
        let dynamic_pin = user.pattern.derive_pin(&grid)?;

        {
            let mut sessions = self.sessions()?;
            let state = lookup_mut(&mut sessions, sid)?;
            // Another call may have moved the session on during the lookup
            if !matches!(state, SessionState::Anonymous) {
                return Err(Error::validation(WRONG_STATE));
            }
            *state = SessionState::AwaitingPin {
                user_id: user.id,
                grid: grid.clone(),
                dynamic_pin: dynamic_pin.clone(),
                buffer: PinBuffer::new(),
                failed_attempts: 0,
            };
        }
        self.log(LogEvent::new("login_started").with_session(sid).with_user(user.id));

        Ok(LoginChallenge {
            user_id: user.id,
            name: user.name,
            grid,
            dynamic_pin: self.options.reveal_dynamic_pin.then_some(dynamic_pin),
        })
    }

    pub fn press_digit(&self, sid: SessionId, digit: u8) -> Result<KeypadStatus> {
        self.with_buffer(sid, |buffer| buffer.push_digit(digit).map(|_| ()))
    }

    pub fn clear_pin(&self, sid: SessionId) -> Result<KeypadStatus> {
        self.with_buffer(sid, |buffer| {
            buffer.clear();
            Ok(())
        })
    }

    /// Replace the keypad contents with `entered` and submit
    pub fn authenticate(&self, sid: SessionId, entered: &str) -> Result<Authentication> {
        let mut sessions = self.sessions()?;
        match lookup_mut(&mut sessions, sid)? {
            SessionState::AwaitingPin { buffer, .. } => buffer.fill(entered)?,
            _ => return Err(Error::validation(WRONG_STATE)),
        }
        let (outcome, events) = self.classify_locked(&mut sessions, sid)?;
        drop(sessions);
        self.log_all(events);
        outcome
    }

    /// Classify the PIN on the keypad
    pub fn submit_pin(&self, sid: SessionId) -> Result<Authentication> {
        let mut sessions = self.sessions()?;
        let (outcome, events) = self.classify_locked(&mut sessions, sid)?;
        drop(sessions);
        self.log_all(events);
        outcome
    }

    /// Classify and move to the next state under one store lock, so two
    /// submissions on the same session cannot interleave. Events are
    /// returned for logging once the lock is released.
    fn classify_locked(
        &self,
        sessions: &mut SessionMap,
        sid: SessionId,
    ) -> Result<(Result<Authentication>, Vec<LogEvent>)> {
        let (user_id, entered, dynamic_pin, failed_attempts) = match lookup_mut(sessions, sid)? {
            SessionState::AwaitingPin {
                user_id,
                dynamic_pin,
                buffer,
                failed_attempts,
                ..
            } => (*user_id, buffer.clone(), dynamic_pin.clone(), *failed_attempts),
            _ => return Err(Error::validation(WRONG_STATE)),
        };
        if !entered.is_ready() {
            return Err(Error::validation("PIN must be exactly 4 digits."));
        }

        let user = self.ledger.user(user_id)?;
        let verdict = classify(entered.as_str(), &dynamic_pin, user.duress_pin.as_str());
        let authenticated = LogEvent::new("session_authenticated").with_session(sid).with_user(user_id);

        let (next, outcome, events) = match verdict {
            PinVerdict::Real => (
                SessionState::AuthenticatedReal { user_id },
                Ok(Authentication {
                    verdict,
                    retry_grid: None,
                    retry_pin: None,
                }),
                vec![authenticated],
            ),
            PinVerdict::Duress => (
                SessionState::AuthenticatedDuress {
                    user_id,
                    decoy_balance: DecoyBalance::draw(&mut *self.rng()?),
                },
                Ok(Authentication {
                    verdict,
                    retry_grid: None,
                    retry_pin: None,
                }),
                vec![
                    authenticated,
                    LogEvent::new("duress_alert").with_session(sid).with_user(user_id),
                ],
            ),
            PinVerdict::Invalid => {
                let failed_attempts = failed_attempts + 1;
                let rejected = vec![LogEvent::new("pin_rejected").with_session(sid).with_user(user_id)];

                if self.options.max_pin_attempts.is_some_and(|max| failed_attempts >= max) {
                    (SessionState::Anonymous, Err(Error::validation(LOCKED_OUT)), rejected)
                } else {
                    let grid = self.fresh_grid()?;
                    let dynamic_pin = user.pattern.derive_pin(&grid)?;
                    let retry_pin = self.options.reveal_dynamic_pin.then(|| dynamic_pin.clone());
                    (
                        SessionState::AwaitingPin {
                            user_id,
                            grid: grid.clone(),
                            dynamic_pin,
                            buffer: PinBuffer::new(),
                            failed_attempts,
                        },
                        Ok(Authentication {
                            verdict,
                            retry_grid: Some(grid),
                            retry_pin,
                        }),
                        rejected,
                    )
                }
            }
        };

        *lookup_mut(sessions, sid)? = next;
        Ok((outcome, events))
    }

    // ==================== Transactions ====================

    /// Balance to display: the real one, or the decoy under duress
    pub fn balance(&self, sid: SessionId) -> Result<i64> {
        match self.authenticated(sid)? {
            (user_id, Mode::Real) => Ok(self.ledger.user(user_id)?.balance),
            (_, Mode::Duress) => self.decoy_balance(sid),
        }
    }

    pub fn withdraw(&self, sid: SessionId, amount: i64) -> Result<Receipt> {
        validate_amount(amount)?;
        let (user_id, mode) = self.authenticated(sid)?;

        match mode {
            Mode::Real => {
                let posting = self.record_failure(sid, self.ledger.debit(user_id, amount, false))?;
                Ok(receipt(&posting, posting.new_balance))
            }
            Mode::Duress => {
                let posting = self.record_failure(sid, self.ledger.debit(user_id, amount, true))?;
                let shown = DecoyBalance::after_withdrawal(&mut *self.rng()?, amount);
                self.set_decoy(sid, shown)?;
                Ok(receipt(&posting, shown))
            }
        }
    }

    /// Deposits always credit the real ledger. Under duress the decoy
    /// grows by the deposited amount.
    pub fn deposit(&self, sid: SessionId, amount: i64) -> Result<Receipt> {
        validate_amount(amount)?;
        let (user_id, mode) = self.authenticated(sid)?;
        let posting = self.record_failure(sid, self.ledger.credit(user_id, amount))?;

        match mode {
            Mode::Real => Ok(receipt(&posting, posting.new_balance)),
            Mode::Duress => {
                let shown = self.decoy_balance(sid)?.saturating_add(amount);
                self.set_decoy(sid, shown)?;
                Ok(receipt(&posting, shown))
            }
        }
    }

    /// Name, displayed balance and statement. Under duress the statement
    /// is empty and the balance is the decoy.
    pub fn account_view(&self, sid: SessionId) -> Result<AccountView> {
        let (user_id, mode) = self.authenticated(sid)?;
        let user = self.ledger.user(user_id)?;
        match mode {
            Mode::Real => {
                let masked = user.masked();
                Ok(AccountView {
                    name: masked.name,
                    balance: masked.balance,
                    history: masked.transaction_history,
                })
            }
            Mode::Duress => Ok(AccountView {
                name: user.name,
                balance: self.decoy_balance(sid)?,
                history: Vec::new(),
            }),
        }
    }

    // ==================== Internals ====================

    fn sessions(&self) -> Result<MutexGuard<'_, SessionMap>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::database("session store lock poisoned"))?;
        if let Some(idle) = self.options.idle_timeout {
            sessions.retain(|_, slot| slot.touched.elapsed() < idle);
        }
        Ok(sessions)
    }

    fn rng(&self) -> Result<MutexGuard<'_, StdRng>> {
        self.rng
            .lock()
            .map_err(|_| Error::database("random source lock poisoned"))
    }

    fn fresh_grid(&self) -> Result<Grid> {
        Ok(Grid::generate(&mut *self.rng()?))
    }

    fn snapshot(&self, sid: SessionId) -> Result<SessionState> {
        let mut sessions = self.sessions()?;
        lookup_mut(&mut sessions, sid).map(|state| state.clone())
    }

    fn set_state(&self, sid: SessionId, state: SessionState) -> Result<()> {
        let mut sessions = self.sessions()?;
        *lookup_mut(&mut sessions, sid)? = state;
        Ok(())
    }

    fn with_buffer<F>(&self, sid: SessionId, f: F) -> Result<KeypadStatus>
    where
        F: FnOnce(&mut PinBuffer) -> Result<()>,
    {
        let mut sessions = self.sessions()?;
        match lookup_mut(&mut sessions, sid)? {
            SessionState::AwaitingPin { buffer, .. } => {
                f(buffer)?;
                Ok(KeypadStatus {
                    masked: buffer.masked(),
                    ready: buffer.is_ready(),
                })
            }
            _ => Err(Error::validation(WRONG_STATE)),
        }
    }

    fn authenticated(&self, sid: SessionId) -> Result<(Uuid, Mode)> {
        match self.snapshot(sid)? {
            SessionState::AuthenticatedReal { user_id } => Ok((user_id, Mode::Real)),
            SessionState::AuthenticatedDuress { user_id, .. } => Ok((user_id, Mode::Duress)),
            _ => Err(Error::validation(WRONG_STATE)),
        }
    }

    fn decoy_balance(&self, sid: SessionId) -> Result<i64> {
        match self.snapshot(sid)? {
            SessionState::AuthenticatedDuress { decoy_balance, .. } => Ok(decoy_balance),
            _ => Err(Error::validation(WRONG_STATE)),
        }
    }

    fn set_decoy(&self, sid: SessionId, shown: i64) -> Result<()> {
        let mut sessions = self.sessions()?;
        match lookup_mut(&mut sessions, sid)? {
            SessionState::AuthenticatedDuress { decoy_balance, .. } => {
                *decoy_balance = shown;
                Ok(())
            }
            _ => Err(Error::validation(WRONG_STATE)),
        }
    }

    fn record_failure(&self, sid: SessionId, result: Result<Posting>) -> Result<Posting> {
        if let Err(e) = &result {
            self.log(
                LogEvent::new("transaction_failed")
                    .with_session(sid)
                    .with_error(e.to_string()),
            );
        }
        result
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event);
        }
    }

    fn log_all(&self, events: Vec<LogEvent>) {
        for event in events {
            self.log(event);
        }
    }
}

/// Find a live session and mark it as used
fn lookup_mut(sessions: &mut SessionMap, sid: SessionId) -> Result<&mut SessionState> {
    let slot = sessions
        .get_mut(&sid)
        .ok_or_else(|| Error::not_found("Session not found."))?;
    slot.touched = Instant::now();
    Ok(&mut slot.state)
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::validation("Invalid amount."));
    }
    Ok(())
}

fn receipt(posting: &Posting, balance: i64) -> Receipt {
    Receipt {
        kind: posting.record.kind,
        amount: posting.record.amount,
        balance,
        timestamp: posting.record.timestamp,
    }
}
