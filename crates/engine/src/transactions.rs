//! Journal entries.
//!
//! A `Transaction` records one balance movement on one account. Entries are
//! written once, inside the unit of work that moved the balance, and never
//! updated afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{Account, EngineError, MoneyCents, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Lock,
    Unlock,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }

    /// Word used in user-facing messages ("processing your withdraw").
    pub fn noun(self) -> &'static str {
        match self {
            Self::Withdrawal => "withdraw",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "lock" => Ok(Self::Lock),
            "unlock" => Ok(Self::Unlock),
            other => Err(EngineError::InvalidRequest(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// Lifecycle marker. The engine only ever writes `Completed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::InvalidRequest(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(skip)]
    pub id: i32,
    /// Number of the account the movement applies to.
    pub number: String,
    pub amount: MoneyCents,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A not yet persisted, completed entry. `session_id` is left empty so
    /// that [`Transaction::derive_session_id`] fills it in.
    pub fn completed(number: impl Into<String>, amount: MoneyCents, kind: TransactionType) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            number: number.into(),
            amount,
            session_id: String::new(),
            kind,
            status: TransactionStatus::Completed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign a session id if none is set yet.
    ///
    /// The id is a BLAKE3 digest of the entry content plus a timing nonce,
    /// rendered as upper-case hex. Once set it is never recomputed.
    pub fn derive_session_id(&mut self) -> &str {
        if self.session_id.is_empty() {
            let nonce = Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_else(|| Utc::now().timestamp_micros());
            self.session_id = session_fingerprint(self, nonce);
        }
        &self.session_id
    }
}

fn session_fingerprint(entry: &Transaction, nonce: i64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&nonce.to_le_bytes());
    hasher.update(entry.number.as_bytes());
    hasher.update(&(entry.number.len() as u64).to_le_bytes());
    hasher.update(&entry.amount.cents().to_le_bytes());
    hasher.update(entry.kind.as_str().as_bytes());
    hasher.update(entry.status.as_str().as_bytes());
    hasher.update(entry.created_at.to_rfc3339().as_bytes());
    hasher.update(entry.updated_at.to_rfc3339().as_bytes());
    hex::encode_upper(hasher.finalize().as_bytes())
}

/// A journal entry joined with its account and the account owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub account: Option<Account>,
    #[serde(rename = "user")]
    pub owner: Option<User>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub number: String,
    pub amount: i64,
    #[sea_orm(unique)]
    pub session_id: String,
    #[sea_orm(column_name = "type")]
    pub kind: String,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::Number",
        to = "super::accounts::Column::Number",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::NotSet,
            number: ActiveValue::Set(tx.number.clone()),
            amount: ActiveValue::Set(tx.amount.cents()),
            session_id: ActiveValue::Set(tx.session_id.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            number: model.number,
            amount: MoneyCents::new(model.amount),
            session_id: model.session_id,
            kind: TransactionType::try_from(model.kind.as_str())?,
            status: TransactionStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
