//! Core domain entities
//!
//! All protocol and ledger entities are defined here. These are pure data
//! structures with validation logic - no I/O or external dependencies.
//! Randomness is always passed in by the caller.

pub mod decoy;
pub mod grid;
pub mod money;
pub mod pattern;
pub mod pin;
pub mod result;
pub mod speech;
mod transaction;
mod user;

pub use decoy::DecoyBalance;
pub use grid::{Coordinate, Grid, GRID_SIZE};
pub use money::format_rupees;
pub use pattern::{derive_pin, Pattern, PatternSelection, SelectionChange, PATTERN_LENGTH};
pub use pin::{classify, DuressPin, PinBuffer, PinVerdict, WEAK_PINS};
pub use speech::SpeechClip;
pub use transaction::{StatementLine, TransactionKind, TransactionRecord};
pub use user::{MaskedUser, User, DEFAULT_BALANCE};
