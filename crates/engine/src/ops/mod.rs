use sea_orm::{DatabaseConnection, DbErr, SqlErr};

use crate::{AccountNumberFactory, DEFAULT_STEP, EngineError, ResultEngine};

mod accounts;
mod journal;
mod ledger;
mod movements;
mod users;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::warn!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;

#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    numbers: AccountNumberFactory,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Account number factory shared by every clone of this engine.
    pub fn account_numbers(&self) -> &AccountNumberFactory {
        &self.numbers
    }
}

/// Trim a required identifier, rejecting blank input with `message`.
fn require_text(value: &str, message: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidRequest(message.to_string()));
    }
    Ok(trimmed.to_string())
}

/// `true` when `err` was raised by a unique index.
fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    step: i64,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            step: DEFAULT_STEP,
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// How many account numbers to reserve per counter round trip.
    pub fn account_number_step(mut self, step: i64) -> EngineBuilder {
        self.step = step;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            numbers: AccountNumberFactory::new(self.step)?,
        })
    }
}
