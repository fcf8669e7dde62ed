//! Ledger transaction engine.
//!
//! The engine owns the write path to account balances and to the transaction
//! journal. Every balance movement (deposit, withdrawal, lock, unlock) runs in
//! its own database transaction:
//!
//! 1. the account is resolved and the request validated;
//! 2. the balance is changed by a single conditional `UPDATE` whose `WHERE`
//!    clause carries the fund-sufficiency guard;
//! 3. a journal entry is appended;
//! 4. the unit of work commits, or is rolled back as a whole.
//!
//! Account numbers come from [`AccountNumberFactory`], which reserves ranges
//! from a durable counter.
//!
//! ```no_run
//! # async fn run(db: sea_orm::DatabaseConnection) -> Result<(), engine::EngineError> {
//! use engine::{Engine, MoneyCents, MovementCmd, OpenAccountCmd, UserProfile};
//!
//! let engine = Engine::builder().database(db).build().await?;
//! let user = engine
//!     .register_user(UserProfile::new("Ada", "Lovelace", "ada@example.com", 36))
//!     .await?;
//! let account = engine.open_account(OpenAccountCmd::new(&user.key)).await?;
//! let tx = engine
//!     .apply(MovementCmd::deposit(&account.account.number, MoneyCents::from_units(100)))
//!     .await?;
//! println!("{}", tx.session_id);
//! # Ok(())
//! # }
//! ```

pub use accounts::{Account, AccountDetails, AccountType};
pub use commands::{MovementCmd, OpenAccountCmd};
pub use envelope::Envelope;
pub use error::{EngineError, MovementStage};
pub use factory::{ACCOUNT_NUMBER_KEY, ACCOUNT_NUMBER_WIDTH, AccountNumberFactory, DEFAULT_STEP};
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder};
pub use transactions::{Transaction, TransactionDetails, TransactionStatus, TransactionType};
pub use users::{MIN_AGE, Role, User, UserProfile};

mod accounts;
mod commands;
mod envelope;
mod error;
mod factory;
mod money;
mod ops;
mod transactions;
mod users;

type ResultEngine<T> = Result<T, EngineError>;
