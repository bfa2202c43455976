//! Result and error types for the core library

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Display strings are surfaced verbatim to the ATM operator, so they are
/// phrased as user-facing messages rather than diagnostics.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("User with this name already exists.")]
    AlreadyExists,

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid grid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("This Duress PIN is too common. Please choose a different one.")]
    WeakDuressPin,

    #[error("Insufficient funds.")]
    InsufficientFunds,

    /// Worded like an ordinary card limit. `limit` is for the audit log only.
    #[error("Withdrawal limit exceeded for this card.")]
    DuressLimitExceeded { limit: i64 },

    #[error("{0}")]
    Collaborator(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How an error should be treated by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or malformed input, shown verbatim
    Validation,
    /// Unknown identity or session
    NotFound,
    /// Rule violation with a specific message, never retried
    BusinessRule,
    /// Advice or speech backend failure, never fatal to a session
    Collaborator,
    /// Storage, configuration or IO failure
    Internal,
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a collaborator error
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) | Error::InvalidCoordinate(_) => ErrorCategory::Validation,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::AlreadyExists
            | Error::InvalidPattern(_)
            | Error::WeakDuressPin
            | Error::InsufficientFunds
            | Error::DuressLimitExceeded { .. } => ErrorCategory::BusinessRule,
            Error::Collaborator(_) => ErrorCategory::Collaborator,
            Error::Database(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Success/data/error envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub category: Option<ErrorCategory>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            category: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            category: None,
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                let mut failed = Self::fail(e.to_string());
                failed.category = Some(e.category());
                failed
            }
        }
    }
}
