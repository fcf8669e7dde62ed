//! The module contains the `Account` struct and its storage model.
//!
//! An account holds three balances:
//!
//! - `balance`: funds immediately available;
//! - `locked_balance`: funds on hold, unavailable for withdrawal;
//! - `ledger_balance`: total of record, always `balance + locked_balance`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, User};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Savings,
    Current,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Savings => "savings",
            Self::Current => "current",
        }
    }
}

impl TryFrom<&str> for AccountType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "savings" => Ok(Self::Savings),
            "current" => Ok(Self::Current),
            other => Err(EngineError::InvalidRequest(format!(
                "invalid account type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(skip)]
    pub id: i32,
    #[serde(skip)]
    pub owner: i32,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// External identifier, 10-digit zero-padded.
    pub number: String,
    pub balance: MoneyCents,
    pub locked_balance: MoneyCents,
    pub ledger_balance: MoneyCents,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// `true` when the three balances agree and none is negative.
    pub fn is_consistent(&self) -> bool {
        self.balance.cents() >= 0
            && self.locked_balance.cents() >= 0
            && self.balance.checked_add(self.locked_balance) == Some(self.ledger_balance)
    }
}

/// An account joined with its owner.
///
/// `owner` is `None` for orphaned rows, which callers treat as not found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    #[serde(flatten)]
    pub account: Account,
    #[serde(rename = "user")]
    pub owner: Option<User>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner: i32,
    #[sea_orm(column_name = "type")]
    pub account_type: String,
    #[sea_orm(unique)]
    pub number: String,
    pub balance: i64,
    pub locked_balance: i64,
    pub ledger_balance: i64,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::Owner",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// A fresh, empty and active account.
    pub(crate) fn open(
        owner: i32,
        account_type: AccountType,
        number: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActiveValue::NotSet,
            owner: ActiveValue::Set(owner),
            account_type: ActiveValue::Set(account_type.as_str().to_string()),
            number: ActiveValue::Set(number),
            balance: ActiveValue::Set(0),
            locked_balance: ActiveValue::Set(0),
            ledger_balance: ActiveValue::Set(0),
            active: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            owner: model.owner,
            account_type: AccountType::try_from(model.account_type.as_str())?,
            number: model.number,
            balance: MoneyCents::new(model.balance),
            locked_balance: MoneyCents::new(model.locked_balance),
            ledger_balance: MoneyCents::new(model.ledger_balance),
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
