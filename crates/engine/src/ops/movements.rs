//! Deposit, withdraw, lock and unlock.
//!
//! Every movement runs as one unit of work: the guarded balance update and the
//! journal append share a single `DatabaseTransaction`, so either both are
//! committed or neither is.

use sea_orm::{DatabaseTransaction, DbErr, TransactionTrait};

use crate::{
    EngineError, MoneyCents, MovementCmd, MovementStage, ResultEngine, Transaction,
    TransactionDetails, TransactionType,
};

use super::{Engine, is_unique_violation, ledger::Guard, require_text};

fn processing(
    operation: TransactionType,
    stage: MovementStage,
) -> impl FnOnce(DbErr) -> EngineError {
    move |source| EngineError::Processing {
        operation,
        stage,
        source,
    }
}

/// A journal insert that lost a race on the session id index.
fn is_duplicate_append(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::Processing {
            stage: MovementStage::JournalAppend,
            source,
            ..
        } if is_unique_violation(source)
    )
}

/// Accept `existing` as the answer to a repeated request, or refuse to reuse
/// its session id for a different one.
fn replay(
    existing: Transaction,
    number: &str,
    kind: TransactionType,
    amount: MoneyCents,
) -> ResultEngine<Transaction> {
    if existing.number == number && existing.kind == kind && existing.amount == amount {
        tracing::debug!(session_id = %existing.session_id, "replayed movement");
        return Ok(existing);
    }
    Err(EngineError::InvalidRequest(
        "session id already used by another transaction".to_string(),
    ))
}

async fn roll_back(db_tx: DatabaseTransaction) {
    if let Err(err) = db_tx.rollback().await {
        tracing::warn!("rollback failed: {err}");
    }
}

impl Engine {
    /// Apply a balance movement and record it in the journal.
    ///
    /// Returns the committed journal entry. When `cmd` carries a session id
    /// that was already committed for the same number, kind and amount, the
    /// stored entry is returned and no funds move.
    pub async fn apply(&self, cmd: MovementCmd) -> ResultEngine<Transaction> {
        let MovementCmd {
            number,
            amount,
            kind,
            session_id,
        } = cmd;
        let number = require_text(&number, "please provide a valid account number")?;
        if !amount.is_positive() {
            return Err(EngineError::InvalidRequest(format!(
                "please provide a valid {} amount",
                kind.noun()
            )));
        }
        let session_id = session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        self.search(&number).await?;

        if let Some(id) = &session_id {
            if let Some(existing) = self.entry_by_session_id(id).await? {
                return replay(existing, &number, kind, amount);
            }
        }

        let mut entry = Transaction::completed(number, amount, kind);
        if let Some(id) = &session_id {
            entry.session_id = id.clone();
        }
        entry.derive_session_id();
        tracing::debug!(number = %entry.number, %kind, %amount, "applying movement");

        match self.commit_movement(&entry).await {
            Ok(committed) => {
                tracing::info!(
                    number = %committed.number,
                    %kind,
                    %amount,
                    session_id = %committed.session_id,
                    "movement committed"
                );
                Ok(committed)
            }
            Err(err) if session_id.is_some() && is_duplicate_append(&err) => {
                match self.entry_by_session_id(&entry.session_id).await? {
                    Some(existing) => replay(existing, &entry.number, kind, amount),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Run the unit of work for `entry`: guarded mutation, append, commit.
    async fn commit_movement(&self, entry: &Transaction) -> ResultEngine<Transaction> {
        let kind = entry.kind;
        let db_tx = self
            .database
            .begin()
            .await
            .map_err(processing(kind, MovementStage::Begin))?;

        let guard = match self
            .mutate_balance(&db_tx, &entry.number, kind, entry.amount)
            .await
        {
            Ok(guard) => guard,
            Err(source) => {
                roll_back(db_tx).await;
                return Err(processing(kind, MovementStage::BalanceMutation)(source));
            }
        };

        if guard == Guard::Rejected {
            roll_back(db_tx).await;
            tracing::warn!(number = %entry.number, %kind, amount = %entry.amount, "movement rejected");
            let number = entry.number.clone();
            return Err(match kind {
                TransactionType::Deposit => EngineError::AccountNotFound(number),
                TransactionType::Withdrawal | TransactionType::Lock => {
                    EngineError::InsufficientFunds(number)
                }
                TransactionType::Unlock => EngineError::InsufficientLockedFunds(number),
            });
        }

        let model = match self.append_entry(&db_tx, entry).await {
            Ok(model) => model,
            Err(source) => {
                roll_back(db_tx).await;
                return Err(processing(kind, MovementStage::JournalAppend)(source));
            }
        };

        db_tx
            .commit()
            .await
            .map_err(processing(kind, MovementStage::Commit))?;
        Transaction::try_from(model)
    }

    pub async fn deposit(&self, number: &str, amount: MoneyCents) -> ResultEngine<Transaction> {
        self.apply(MovementCmd::deposit(number, amount)).await
    }

    pub async fn withdraw(&self, number: &str, amount: MoneyCents) -> ResultEngine<Transaction> {
        self.apply(MovementCmd::withdraw(number, amount)).await
    }

    /// Move `amount` from the available to the locked balance.
    pub async fn lock(&self, number: &str, amount: MoneyCents) -> ResultEngine<Transaction> {
        self.apply(MovementCmd::lock(number, amount)).await
    }

    /// Move `amount` from the locked back to the available balance.
    pub async fn unlock(&self, number: &str, amount: MoneyCents) -> ResultEngine<Transaction> {
        self.apply(MovementCmd::unlock(number, amount)).await
    }

    /// Journal of account `number`, oldest first.
    pub async fn transactions(&self, number: &str) -> ResultEngine<Vec<TransactionDetails>> {
        let details = self.search(number).await?;
        self.find_by_account_number(&details.account.number).await
    }

    /// One journal entry by session id.
    pub async fn transaction(&self, session_id: &str) -> ResultEngine<TransactionDetails> {
        let session_id = require_text(session_id, "please provide a valid session id")?;
        self.find_by_session_id(&session_id)
            .await?
            .ok_or(EngineError::TransactionNotFound(session_id))
    }
}
