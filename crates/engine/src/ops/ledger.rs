//! Guarded balance mutations.
//!
//! Each movement is one `UPDATE accounts ... WHERE number = ? [AND guard]`
//! statement. The guard is evaluated by the store under the row's write lock,
//! in the same statement that writes, so two contenders on one account can
//! never both pass it. Zero affected rows means the guard failed.

use chrono::Utc;
use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*, sea_query::SimpleExpr};

use crate::{MoneyCents, TransactionType, accounts};

use super::Engine;

/// Outcome of a guarded mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Guard {
    Applied,
    Rejected,
}

fn plus(column: accounts::Column, cents: i64) -> SimpleExpr {
    Expr::col(column).add(cents)
}

fn minus(column: accounts::Column, cents: i64) -> SimpleExpr {
    Expr::col(column).sub(cents)
}

impl Engine {
    /// Apply `kind` for `amount` on account `number` inside `db_tx`.
    ///
    /// | kind       | balance | locked | ledger | guard              |
    /// |------------|---------|--------|--------|--------------------|
    /// | deposit    | +       |        | +      | none               |
    /// | withdrawal | -       |        | -      | `balance >= amount` |
    /// | lock       | -       | +      |        | `balance >= amount` |
    /// | unlock     | +       | -      |        | `locked >= amount`  |
    pub(super) async fn mutate_balance(
        &self,
        db_tx: &DatabaseTransaction,
        number: &str,
        kind: TransactionType,
        amount: MoneyCents,
    ) -> Result<Guard, DbErr> {
        use crate::accounts::Column::{Balance, LedgerBalance, LockedBalance};

        let cents = amount.cents();
        let update = accounts::Entity::update_many()
            .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(accounts::Column::Number.eq(number.to_string()));

        let update = match kind {
            TransactionType::Deposit => update
                .col_expr(Balance, plus(Balance, cents))
                .col_expr(LedgerBalance, plus(LedgerBalance, cents)),
            TransactionType::Withdrawal => update
                .col_expr(Balance, minus(Balance, cents))
                .col_expr(LedgerBalance, minus(LedgerBalance, cents))
                .filter(Balance.gte(cents)),
            TransactionType::Lock => update
                .col_expr(Balance, minus(Balance, cents))
                .col_expr(LockedBalance, plus(LockedBalance, cents))
                .filter(Balance.gte(cents)),
            TransactionType::Unlock => update
                .col_expr(LockedBalance, minus(LockedBalance, cents))
                .col_expr(Balance, plus(Balance, cents))
                .filter(LockedBalance.gte(cents)),
        };

        let result = update.exec(db_tx).await?;
        Ok(if result.rows_affected > 0 {
            Guard::Applied
        } else {
            Guard::Rejected
        })
    }
}
