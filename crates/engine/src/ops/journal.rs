//! Transaction journal: append and lookups.

use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{
    Account, ResultEngine, Transaction, TransactionDetails, User, accounts, transactions, users,
};

use super::Engine;

impl Engine {
    /// Persist `entry` inside the caller's unit of work.
    ///
    /// The stored row is read back, so the returned record is exactly what a
    /// later lookup returns.
    pub(super) async fn append_entry(
        &self,
        db_tx: &DatabaseTransaction,
        entry: &Transaction,
    ) -> Result<transactions::Model, DbErr> {
        transactions::ActiveModel::from(entry).insert(db_tx).await
    }

    /// Bare journal entry by session id, without joins.
    pub(super) async fn entry_by_session_id(
        &self,
        session_id: &str,
    ) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::SessionId.eq(session_id.to_string()))
            .one(&self.database)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    /// Journal entry with its account and owner.
    pub async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> ResultEngine<Option<TransactionDetails>> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::SessionId.eq(session_id.to_string()))
            .find_also_related(accounts::Entity)
            .all(&self.database)
            .await?;
        Ok(self.join_owners(rows).await?.into_iter().next())
    }

    /// History of account `number` in insertion order.
    pub async fn find_by_account_number(
        &self,
        number: &str,
    ) -> ResultEngine<Vec<TransactionDetails>> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::Number.eq(number.to_string()))
            .order_by_asc(transactions::Column::Id)
            .find_also_related(accounts::Entity)
            .all(&self.database)
            .await?;
        self.join_owners(rows).await
    }

    /// Attach account owners to journal rows with a single extra query.
    async fn join_owners(
        &self,
        rows: Vec<(transactions::Model, Option<accounts::Model>)>,
    ) -> ResultEngine<Vec<TransactionDetails>> {
        let mut owner_ids: Vec<i32> = rows
            .iter()
            .filter_map(|(_, account)| account.as_ref().map(|a| a.owner))
            .collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();

        let mut owners: HashMap<i32, User> = HashMap::new();
        if !owner_ids.is_empty() {
            for model in users::Entity::find()
                .filter(users::Column::Id.is_in(owner_ids))
                .all(&self.database)
                .await?
            {
                let user = User::try_from(model)?;
                owners.insert(user.id, user);
            }
        }

        rows.into_iter()
            .map(|(tx, account)| -> ResultEngine<TransactionDetails> {
                let account = account.map(Account::try_from).transpose()?;
                let owner = account
                    .as_ref()
                    .and_then(|a| owners.get(&a.owner))
                    .cloned();
                Ok(TransactionDetails {
                    transaction: Transaction::try_from(tx)?,
                    account,
                    owner,
                })
            })
            .collect()
    }

    /// Delete a journal entry. Only meant for test fixtures.
    pub async fn delete_transaction(&self, session_id: &str) -> ResultEngine<()> {
        transactions::Entity::delete_many()
            .filter(transactions::Column::SessionId.eq(session_id.to_string()))
            .exec(&self.database)
            .await?;
        Ok(())
    }
}
