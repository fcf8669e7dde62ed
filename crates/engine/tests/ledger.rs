use std::path::PathBuf;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Account, Engine, EngineError, MoneyCents, MovementCmd, MovementStage, OpenAccountCmd,
    TransactionStatus, TransactionType, UserProfile,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Engine on a file database with a real connection pool, so that units of
/// work from different tasks overlap in the store.
async fn engine_with_file_db() -> (Engine, DatabaseConnection, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite:{}?mode=rwc", path.display()));
    options.max_connections(8).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db, path)
}

async fn remove_file_db(db: DatabaseConnection, path: PathBuf) {
    db.close().await.unwrap();
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

/// Register a customer and open an empty savings account, returning its number.
async fn open_account(engine: &Engine, email: &str) -> String {
    let user = engine
        .register_user(UserProfile::new("ada", "lovelace", email, 36))
        .await
        .unwrap();
    engine
        .open_account(OpenAccountCmd::new(&user.key))
        .await
        .unwrap()
        .account
        .number
}

/// Force the available balance of `number` without journaling it.
async fn seed_balance(db: &DatabaseConnection, number: &str, cents: i64) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE accounts SET balance = ?, locked_balance = 0, ledger_balance = ? WHERE number = ?",
        vec![cents.into(), cents.into(), number.into()],
    ))
    .await
    .unwrap();
}

async fn account(engine: &Engine, number: &str) -> Account {
    let account = engine.search(number).await.unwrap().account;
    assert!(account.is_consistent(), "inconsistent balances: {account:?}");
    account
}

#[tokio::test]
async fn deposit_credits_available_and_ledger_balance() {
    let (engine, _db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;

    let tx = engine.deposit(&number, MoneyCents::new(100)).await.unwrap();
    assert_eq!(tx.kind, TransactionType::Deposit);
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.amount, MoneyCents::new(100));

    let account = account(&engine, &number).await;
    assert_eq!(account.balance, MoneyCents::new(100));
    assert_eq!(account.ledger_balance, MoneyCents::new(100));
    assert_eq!(account.locked_balance, MoneyCents::ZERO);

    let history = engine.transactions(&number).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].transaction, tx);
}

#[tokio::test]
async fn lock_then_unlock_restores_available_balance() {
    let (engine, db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    seed_balance(&db, &number, 1000).await;

    engine.lock(&number, MoneyCents::new(200)).await.unwrap();
    let locked = account(&engine, &number).await;
    assert_eq!(locked.balance, MoneyCents::new(800));
    assert_eq!(locked.locked_balance, MoneyCents::new(200));
    assert_eq!(locked.ledger_balance, MoneyCents::new(1000));

    engine.unlock(&number, MoneyCents::new(200)).await.unwrap();
    let unlocked = account(&engine, &number).await;
    assert_eq!(unlocked.balance, MoneyCents::new(1000));
    assert_eq!(unlocked.locked_balance, MoneyCents::ZERO);

    let kinds = engine
        .transactions(&number)
        .await
        .unwrap()
        .into_iter()
        .map(|details| details.transaction.kind)
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec![TransactionType::Lock, TransactionType::Unlock]);
}

#[tokio::test]
async fn withdraw_beyond_balance_is_rejected_without_journal() {
    let (engine, db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    seed_balance(&db, &number, 50).await;

    let err = engine
        .withdraw(&number, MoneyCents::new(100))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InsufficientFunds(number.clone()));
    assert_eq!(
        err.user_message(),
        "insufficient funds in account's available balance"
    );

    assert_eq!(account(&engine, &number).await.balance, MoneyCents::new(50));
    assert!(engine.transactions(&number).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_account_number_is_not_found() {
    let (engine, _db) = engine_with_db().await;

    let err = engine.search("0000009999").await.unwrap_err();
    assert_eq!(err, EngineError::AccountNotFound("0000009999".to_string()));

    let err = engine
        .deposit("0000009999", MoneyCents::new(100))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AccountNotFound("0000009999".to_string()));
    assert_eq!(err.user_message(), "account not found");

    assert!(matches!(
        engine.transactions("0000009999").await,
        Err(EngineError::AccountNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_locks_never_overdraw() {
    let (engine, db, path) = engine_with_file_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    seed_balance(&db, &number, 1000).await;

    let handles = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let number = number.clone();
            tokio::spawn(async move { engine.lock(&number, MoneyCents::new(600)).await })
        })
        .collect::<Vec<_>>();

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EngineError::InsufficientFunds(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((succeeded, rejected), (1, 1));

    let account = account(&engine, &number).await;
    assert_eq!(account.balance, MoneyCents::new(400));
    assert_eq!(account.locked_balance, MoneyCents::new(600));
    assert_eq!(engine.transactions(&number).await.unwrap().len(), 1);

    remove_file_db(db, path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_contenders_lock_exactly_the_available_funds() {
    let (engine, db, path) = engine_with_file_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    seed_balance(&db, &number, 500).await;

    let handles = (0..10)
        .map(|_| {
            let engine = engine.clone();
            let number = number.clone();
            tokio::spawn(async move { engine.lock(&number, MoneyCents::new(100)).await })
        })
        .collect::<Vec<_>>();

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EngineError::InsufficientFunds(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((succeeded, rejected), (5, 5));

    let account = account(&engine, &number).await;
    assert_eq!(account.balance, MoneyCents::ZERO);
    assert_eq!(account.locked_balance, MoneyCents::new(500));
    assert_eq!(account.ledger_balance, MoneyCents::new(500));
    assert_eq!(engine.transactions(&number).await.unwrap().len(), 5);

    remove_file_db(db, path).await;
}

#[tokio::test]
async fn failed_journal_append_rolls_back_the_balance() {
    let (engine, db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    seed_balance(&db, &number, 1000).await;

    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "DROP TABLE transactions"))
        .await
        .unwrap();

    for (kind, result) in [
        (
            TransactionType::Deposit,
            engine.deposit(&number, MoneyCents::new(100)).await,
        ),
        (
            TransactionType::Lock,
            engine.lock(&number, MoneyCents::new(100)).await,
        ),
    ] {
        let err = result.unwrap_err();
        assert!(
            matches!(
                err,
                EngineError::Processing {
                    operation,
                    stage: MovementStage::JournalAppend,
                    ..
                } if operation == kind
            ),
            "unexpected error: {err:?}"
        );
        assert!(err.is_transient());
    }

    let account = account(&engine, &number).await;
    assert_eq!(account.balance, MoneyCents::new(1000));
    assert_eq!(account.locked_balance, MoneyCents::ZERO);
    assert_eq!(account.ledger_balance, MoneyCents::new(1000));
}

#[tokio::test]
async fn unlock_beyond_locked_balance_is_rejected() {
    let (engine, db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    seed_balance(&db, &number, 1000).await;
    engine.lock(&number, MoneyCents::new(100)).await.unwrap();

    let err = engine
        .unlock(&number, MoneyCents::new(101))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InsufficientLockedFunds(number.clone()));

    let account = account(&engine, &number).await;
    assert_eq!(account.balance, MoneyCents::new(900));
    assert_eq!(account.locked_balance, MoneyCents::new(100));
}

#[tokio::test]
async fn blank_number_and_non_positive_amount_are_invalid() {
    let (engine, _db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;

    assert_eq!(
        engine
            .deposit("   ", MoneyCents::new(100))
            .await
            .unwrap_err(),
        EngineError::InvalidRequest("please provide a valid account number".to_string())
    );
    assert_eq!(
        engine.withdraw(&number, MoneyCents::ZERO).await.unwrap_err(),
        EngineError::InvalidRequest("please provide a valid withdraw amount".to_string())
    );
    assert!(matches!(
        engine.lock(&number, MoneyCents::new(-5)).await,
        Err(EngineError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn orphaned_account_is_reported_missing() {
    let (engine, _db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    engine.delete_user("ada@example.com").await.unwrap();

    let found = engine.find_account(&number).await.unwrap().unwrap();
    assert!(found.owner.is_none());

    assert_eq!(
        engine.search(&number).await.unwrap_err(),
        EngineError::AccountNotFound(number.clone())
    );
    assert_eq!(
        engine
            .deposit(&number, MoneyCents::new(100))
            .await
            .unwrap_err(),
        EngineError::AccountNotFound(number.clone())
    );
}

#[tokio::test]
async fn committed_entry_is_found_by_session_id() {
    let (engine, _db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;

    let tx = engine.deposit(&number, MoneyCents::new(250)).await.unwrap();
    assert_eq!(tx.session_id.len(), 64);

    let details = engine.transaction(&tx.session_id).await.unwrap();
    assert_eq!(details.transaction, tx);
    assert_eq!(details.account.unwrap().number, number);
    assert_eq!(details.owner.unwrap().email, "ada@example.com");

    assert_eq!(
        engine.transaction("MISSING").await.unwrap_err(),
        EngineError::TransactionNotFound("MISSING".to_string())
    );
    assert!(matches!(
        engine.transaction(" ").await,
        Err(EngineError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn replayed_session_id_moves_funds_once() {
    let (engine, _db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;

    let cmd = MovementCmd::deposit(&number, MoneyCents::new(300)).session_id("req-42");
    let first = engine.apply(cmd.clone()).await.unwrap();
    let second = engine.apply(cmd).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.session_id, "req-42");

    assert_eq!(account(&engine, &number).await.balance, MoneyCents::new(300));
    assert_eq!(engine.transactions(&number).await.unwrap().len(), 1);

    let err = engine
        .apply(MovementCmd::withdraw(&number, MoneyCents::new(300)).session_id("req-42"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidRequest("session id already used by another transaction".to_string())
    );
    assert_eq!(account(&engine, &number).await.balance, MoneyCents::new(300));
}

#[tokio::test]
async fn history_follows_commit_order_and_skips_rejections() {
    let (engine, _db) = engine_with_db().await;
    let number = open_account(&engine, "ada@example.com").await;
    let other = open_account(&engine, "grace@example.com").await;

    engine.deposit(&number, MoneyCents::new(500)).await.unwrap();
    engine.deposit(&other, MoneyCents::new(10)).await.unwrap();
    engine.lock(&number, MoneyCents::new(200)).await.unwrap();
    engine
        .withdraw(&number, MoneyCents::new(400))
        .await
        .unwrap_err();
    engine.withdraw(&number, MoneyCents::new(300)).await.unwrap();

    let history = engine.transactions(&number).await.unwrap();
    let entries = history
        .iter()
        .map(|d| (d.transaction.kind, d.transaction.amount.cents()))
        .collect::<Vec<_>>();
    assert_eq!(
        entries,
        vec![
            (TransactionType::Deposit, 500),
            (TransactionType::Lock, 200),
            (TransactionType::Withdrawal, 300),
        ]
    );
    assert!(history.iter().all(|d| d.transaction.number == number));

    let account = account(&engine, &number).await;
    assert_eq!(account.balance, MoneyCents::ZERO);
    assert_eq!(account.locked_balance, MoneyCents::new(200));
    assert_eq!(account.ledger_balance, MoneyCents::new(200));
}

#[tokio::test]
async fn duplicate_email_cannot_register_twice() {
    let (engine, _db) = engine_with_db().await;
    engine
        .register_user(UserProfile::new("ada", "lovelace", "ada@example.com", 36))
        .await
        .unwrap();

    let err = engine
        .register_user(UserProfile::new("Ada", "King", " ADA@example.com ", 40))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_keep_one_user_per_email() {
    let (engine, db, path) = engine_with_file_db().await;

    let handles = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .register_user(UserProfile::new("ada", "lovelace", "ada@example.com", 30 + i))
                    .await
            })
        })
        .collect::<Vec<_>>();

    let mut registered = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => registered += 1,
            Err(EngineError::ExistingKey(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(registered, 1);

    remove_file_db(db, path).await;
}

#[tokio::test]
async fn accounts_need_a_registered_owner() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .open_account(OpenAccountCmd::new("unknown-key"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::UserNotFound("unknown-key".to_string()));

    let user = engine
        .register_user(UserProfile::new("ada", "lovelace", "ada@example.com", 36))
        .await
        .unwrap();
    let first = engine.open_account(OpenAccountCmd::new(&user.key)).await.unwrap();
    let second = engine.open_account(OpenAccountCmd::new(&user.key)).await.unwrap();
    assert_eq!(first.owner.as_ref().map(|u| u.id), Some(user.id));

    let numbers = engine
        .accounts_by_owner(&user.key)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.number)
        .collect::<Vec<_>>();
    assert_eq!(numbers, vec![first.account.number, second.account.number]);
}
