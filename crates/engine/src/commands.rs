//! Command structs for engine operations.
//!
//! These types group parameters for balance movements and account creation,
//! keeping call sites readable.

use serde::{Deserialize, Serialize};

use crate::{AccountType, MoneyCents, TransactionType};

/// Move `amount` on account `number`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementCmd {
    pub number: String,
    pub amount: MoneyCents,
    pub kind: TransactionType,
    /// Caller supplied session id. When set, replaying the same command
    /// returns the original journal entry instead of moving funds twice.
    pub session_id: Option<String>,
}

impl MovementCmd {
    #[must_use]
    pub fn new(number: impl Into<String>, amount: MoneyCents, kind: TransactionType) -> Self {
        Self {
            number: number.into(),
            amount,
            kind,
            session_id: None,
        }
    }

    #[must_use]
    pub fn deposit(number: impl Into<String>, amount: MoneyCents) -> Self {
        Self::new(number, amount, TransactionType::Deposit)
    }

    #[must_use]
    pub fn withdraw(number: impl Into<String>, amount: MoneyCents) -> Self {
        Self::new(number, amount, TransactionType::Withdrawal)
    }

    #[must_use]
    pub fn lock(number: impl Into<String>, amount: MoneyCents) -> Self {
        Self::new(number, amount, TransactionType::Lock)
    }

    #[must_use]
    pub fn unlock(number: impl Into<String>, amount: MoneyCents) -> Self {
        Self::new(number, amount, TransactionType::Unlock)
    }

    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Open an account for the user identified by `owner_key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccountCmd {
    pub owner_key: String,
    pub account_type: AccountType,
}

impl OpenAccountCmd {
    #[must_use]
    pub fn new(owner_key: impl Into<String>) -> Self {
        Self {
            owner_key: owner_key.into(),
            account_type: AccountType::default(),
        }
    }

    #[must_use]
    pub fn account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = account_type;
        self
    }
}
