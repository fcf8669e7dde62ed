//! Account number factory.
//!
//! Numbers come out of ranges reserved from a durable counter (`factory`
//! table). Reserving `step` numbers at a time keeps the store out of the hot
//! path: only one call in `step` touches the database.
//!
//! Ranges are disjoint across processes because the reservation is an atomic
//! upsert. Within a process the cursor/pointer pair is guarded by a mutex that
//! is never held across a store call. When two callers refill at the same
//! time, both ranges are used for their own caller's number and the newest
//! range wins the slot; the unused tail of the other one is a gap.

use std::sync::{Arc, Mutex, PoisonError};

use sea_orm::{
    ActiveValue, DatabaseConnection, TransactionTrait, entity::prelude::*,
    sea_query::OnConflict,
};

use crate::{EngineError, ResultEngine};

/// Counter key used for account numbers.
pub const ACCOUNT_NUMBER_KEY: &str = "account_number";

/// Default number of account numbers reserved per round trip.
pub const DEFAULT_STEP: i64 = 100;

/// Width of a rendered account number.
pub const ACCOUNT_NUMBER_WIDTH: usize = 10;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "factory")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Atomically add `step` to the counter `key` and return the new value.
///
/// The upsert and the read run in one store transaction: the row stays
/// write-locked until commit, so no concurrent reservation can slip between
/// them.
pub(crate) async fn shift_cursor(
    database: &DatabaseConnection,
    key: &str,
    step: i64,
) -> Result<i64, DbErr> {
    let db_tx = database.begin().await?;

    let row = ActiveModel {
        key: ActiveValue::Set(key.to_string()),
        value: ActiveValue::Set(step),
    };
    Entity::insert(row)
        .on_conflict(
            OnConflict::column(Column::Key)
                .value(Column::Value, Expr::col((Entity, Column::Value)).add(step))
                .to_owned(),
        )
        .exec_without_returning(&db_tx)
        .await?;

    let cursor = Entity::find_by_id(key.to_string())
        .one(&db_tx)
        .await?
        .map(|model| model.value)
        .ok_or_else(|| DbErr::RecordNotFound(format!("factory key {key}")))?;

    db_tx.commit().await?;
    Ok(cursor)
}

#[derive(Debug, Default)]
struct Range {
    /// Upper bound of the reserved range (inclusive).
    cursor: i64,
    /// Last number handed out.
    pointer: i64,
}

/// Hands out account numbers.
///
/// Cheap to clone; clones share the same reserved range.
#[derive(Clone, Debug)]
pub struct AccountNumberFactory {
    step: i64,
    range: Arc<Mutex<Range>>,
}

impl AccountNumberFactory {
    pub fn new(step: i64) -> ResultEngine<Self> {
        if step <= 0 {
            return Err(EngineError::InvalidRequest(
                "account number step must be > 0".to_string(),
            ));
        }
        Ok(Self {
            step,
            range: Arc::new(Mutex::new(Range::default())),
        })
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// Next account number, zero-padded to ten digits.
    pub async fn next(&self, database: &DatabaseConnection) -> ResultEngine<String> {
        if let Some(number) = self.take() {
            return Ok(format_number(number));
        }

        let cursor = shift_cursor(database, ACCOUNT_NUMBER_KEY, self.step)
            .await
            .map_err(EngineError::IdentifierUnavailable)?;
        tracing::debug!(cursor, step = self.step, "reserved account number range");

        let number = self.install(cursor);
        Ok(format_number(number))
    }

    /// Advance the pointer inside the current range, if any is left.
    fn take(&self) -> Option<i64> {
        let mut range = self.range.lock().unwrap_or_else(PoisonError::into_inner);
        if range.pointer == range.cursor {
            return None;
        }
        range.pointer += 1;
        Some(range.pointer)
    }

    /// Take the first number of a freshly reserved range ending at `cursor`.
    ///
    /// The rest of the range becomes the current one unless a newer range was
    /// installed meanwhile.
    fn install(&self, cursor: i64) -> i64 {
        let first = cursor - self.step + 1;
        let mut range = self.range.lock().unwrap_or_else(PoisonError::into_inner);
        if cursor > range.cursor {
            range.cursor = cursor;
            range.pointer = first;
        }
        first
    }
}

fn format_number(number: i64) -> String {
    format!("{number:0width$}", width = ACCOUNT_NUMBER_WIDTH)
}
