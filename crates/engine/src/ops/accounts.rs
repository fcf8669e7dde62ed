use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    Account, AccountDetails, EngineError, OpenAccountCmd, ResultEngine, User, accounts,
    transactions,
};

use super::{Engine, require_text, with_tx};

impl Engine {
    /// Open an empty account for an existing user.
    pub async fn open_account(&self, cmd: OpenAccountCmd) -> ResultEngine<AccountDetails> {
        let owner_key = require_text(&cmd.owner_key, "please provide a valid user")?;
        let owner = self.require_owner(&owner_key).await?;

        let number = self.numbers.next(&self.database).await?;
        let model = accounts::ActiveModel::open(owner.id, cmd.account_type, number, Utc::now())
            .insert(&self.database)
            .await?;
        let account = Account::try_from(model)?;

        tracing::info!(
            number = %account.number,
            owner = %owner.key,
            kind = account.account_type.as_str(),
            "account opened"
        );
        Ok(AccountDetails {
            account,
            owner: Some(owner),
        })
    }

    /// Account `number` joined with its owner, `None` when there is no such
    /// account.
    pub async fn find_account(&self, number: &str) -> ResultEngine<Option<AccountDetails>> {
        let found = accounts::Entity::find()
            .filter(accounts::Column::Number.eq(number.to_string()))
            .find_also_related(crate::users::Entity)
            .one(&self.database)
            .await?;

        let Some((account, owner)) = found else {
            return Ok(None);
        };
        Ok(Some(AccountDetails {
            account: Account::try_from(account)?,
            owner: owner.map(User::try_from).transpose()?,
        }))
    }

    /// Resolve an account for an operation.
    ///
    /// An account whose owner cannot be found is reported exactly like a
    /// missing one.
    pub async fn search(&self, number: &str) -> ResultEngine<AccountDetails> {
        let number = require_text(number, "please provide a valid account number")?;
        match self.find_account(&number).await? {
            Some(details) if details.owner.is_some() => Ok(details),
            Some(_) => {
                tracing::warn!(%number, "account has no owner");
                Err(EngineError::AccountNotFound(number))
            }
            None => Err(EngineError::AccountNotFound(number)),
        }
    }

    /// All accounts of the user addressed by `owner_key`, oldest first.
    pub async fn accounts_by_owner(&self, owner_key: &str) -> ResultEngine<Vec<Account>> {
        let owner = self.require_owner(owner_key).await?;
        accounts::Entity::find()
            .filter(accounts::Column::Owner.eq(owner.id))
            .order_by_asc(accounts::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    /// Delete an account and its journal. Only meant for test fixtures.
    pub async fn delete_account(&self, number: &str) -> ResultEngine<()> {
        let number = number.trim().to_string();
        with_tx!(self, |db_tx| {
            let result: ResultEngine<()> = async {
                transactions::Entity::delete_many()
                    .filter(transactions::Column::Number.eq(number.clone()))
                    .exec(&db_tx)
                    .await?;
                accounts::Entity::delete_many()
                    .filter(accounts::Column::Number.eq(number.clone()))
                    .exec(&db_tx)
                    .await?;
                Ok(())
            }
            .await;
            result
        })
    }
}
