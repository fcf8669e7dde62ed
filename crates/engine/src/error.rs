//! The module contains the error the engine can throw.
//!
//! Errors fall in two families:
//!
//! - domain errors ([`InvalidRequest`], [`AccountNotFound`],
//!   [`InsufficientFunds`], ...) are terminal and carry a message that is safe
//!   to show to the caller;
//! - infrastructure errors ([`Persistence`], [`Processing`],
//!   [`IdentifierUnavailable`]) wrap a [`DbErr`]. The unit of work they happened
//!   in has been rolled back, so the whole operation can be retried.
//!
//!  [`InvalidRequest`]: EngineError::InvalidRequest
//!  [`AccountNotFound`]: EngineError::AccountNotFound
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`Persistence`]: EngineError::Persistence
//!  [`Processing`]: EngineError::Processing
//!  [`IdentifierUnavailable`]: EngineError::IdentifierUnavailable
use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

use crate::TransactionType;

/// Step of a balance movement that was running when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovementStage {
    Begin,
    BalanceMutation,
    JournalAppend,
    Commit,
}

impl fmt::Display for MovementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Begin => "begin",
            Self::BalanceMutation => "balance mutation",
            Self::JournalAppend => "journal append",
            Self::Commit => "commit",
        };
        f.write_str(label)
    }
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Account \"{0}\" not found!")]
    AccountNotFound(String),
    #[error("User \"{0}\" not found!")]
    UserNotFound(String),
    #[error("Transaction \"{0}\" not found!")]
    TransactionNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Insufficient locked funds: {0}")]
    InsufficientLockedFunds(String),
    #[error("Cannot allocate account number: {0}")]
    IdentifierUnavailable(#[source] DbErr),
    #[error("{operation} failed at {stage}: {source}")]
    Processing {
        operation: TransactionType,
        stage: MovementStage,
        #[source]
        source: DbErr,
    },
    #[error(transparent)]
    Persistence(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` when the failure is infrastructural and the whole
    /// operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Processing { .. } | Self::IdentifierUnavailable(_)
        )
    }

    /// Stable message for the caller.
    ///
    /// Store-specific detail never leaks through here; infrastructure errors
    /// are logged and replaced by a generic "try again later".
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) | Self::InvalidAmount(msg) => msg.clone(),
            Self::AccountNotFound(_) => "account not found".to_string(),
            Self::UserNotFound(_) => "user not found".to_string(),
            Self::TransactionNotFound(_) => "transaction not found".to_string(),
            Self::ExistingKey(what) => format!("{what} already exists"),
            Self::InsufficientFunds(_) => {
                "insufficient funds in account's available balance".to_string()
            }
            Self::InsufficientLockedFunds(_) => {
                "insufficient funds in account's locked balance".to_string()
            }
            Self::IdentifierUnavailable(err) => {
                tracing::error!("account number reservation failed: {err}");
                "we are having issues creating your account number. Please try again later"
                    .to_string()
            }
            Self::Processing {
                operation,
                stage,
                source,
            } => {
                tracing::error!(%operation, %stage, "unit of work aborted: {source}");
                format!(
                    "we are having issues processing your {}. Please try again later",
                    operation.noun()
                )
            }
            Self::Persistence(err) => {
                tracing::error!("database error: {err}");
                "we are having issues reaching your account. Please try again later".to_string()
            }
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidRequest(a), Self::InvalidRequest(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::AccountNotFound(a), Self::AccountNotFound(b)) => a == b,
            (Self::UserNotFound(a), Self::UserNotFound(b)) => a == b,
            (Self::TransactionNotFound(a), Self::TransactionNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InsufficientLockedFunds(a), Self::InsufficientLockedFunds(b)) => a == b,
            (Self::IdentifierUnavailable(a), Self::IdentifierUnavailable(b)) => {
                a.to_string() == b.to_string()
            }
            (
                Self::Processing {
                    operation: op_a,
                    stage: stage_a,
                    source: a,
                },
                Self::Processing {
                    operation: op_b,
                    stage: stage_b,
                    source: b,
                },
            ) => op_a == op_b && stage_a == stage_b && a.to_string() == b.to_string(),
            (Self::Persistence(a), Self::Persistence(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
