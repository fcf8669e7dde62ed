use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{
    AccountType, Engine, Envelope, MoneyCents, MovementCmd, OpenAccountCmd, UserProfile,
};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;

mod settings;

#[derive(Parser, Debug)]
#[command(name = "zeina")]
#[command(about = "Ledger transaction engine: accounts, balance movements and their journal")]
struct Cli {
    /// Database connection string, overrides `database.url` from the settings.
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Account(Account),
    /// Credit an account.
    Deposit(MovementArgs),
    /// Debit the available balance of an account.
    Withdraw(MovementArgs),
    /// Move funds from the available to the locked balance.
    Lock(MovementArgs),
    /// Move funds from the locked back to the available balance.
    Unlock(MovementArgs),
    /// Journal of an account, oldest first.
    Transactions { number: String },
    /// One journal entry by session id.
    Transaction { session_id: String },
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Register(UserRegisterArgs),
}

#[derive(Args, Debug)]
struct UserRegisterArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    age: i32,
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Open(AccountOpenArgs),
    Show { number: String },
    List {
        #[arg(long)]
        owner: String,
    },
}

#[derive(Args, Debug)]
struct AccountOpenArgs {
    /// Key of the owning user.
    #[arg(long)]
    owner: String,
    #[arg(long = "type", default_value = "savings", value_parser = parse_account_type)]
    account_type: AccountType,
}

#[derive(Args, Debug)]
struct MovementArgs {
    number: String,
    /// Amount in units, e.g. `12.50`.
    amount: MoneyCents,
    /// Reuse this session id to make retries idempotent.
    #[arg(long)]
    session_id: Option<String>,
}

impl MovementArgs {
    fn into_cmd(self, build: fn(String, MoneyCents) -> MovementCmd) -> MovementCmd {
        let cmd = build(self.number, self.amount);
        match self.session_id {
            Some(session_id) => cmd.session_id(session_id),
            None => cmd,
        }
    }
}

fn parse_account_type(raw: &str) -> Result<AccountType, String> {
    AccountType::try_from(raw.to_lowercase().as_str()).map_err(|err| err.user_message())
}

/// Print the envelope as JSON and report whether it carried data.
fn render<T: Serialize>(envelope: Envelope<T>) -> Result<bool, Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.status)
}

async fn movement(engine: &Engine, cmd: MovementCmd) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let message = format!("{} successful", cmd.kind.noun());
    render(Envelope::from_result(engine.apply(cmd).await, message))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "zeina={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli.database_url.unwrap_or(settings.database.url);
    let db = sea_orm::Database::connect(&url).await?;
    Migrator::up(&db, None).await?;
    tracing::debug!(%url, "database ready");

    let engine = Engine::builder()
        .database(db)
        .account_number_step(settings.factory.step)
        .build()
        .await?;

    let ok = match cli.command {
        Command::User(User {
            command: UserCommand::Register(args),
        }) => {
            let profile = UserProfile::new(args.first_name, args.last_name, args.email, args.age);
            render(Envelope::from_result(
                engine.register_user(profile).await,
                "user registered",
            ))?
        }
        Command::Account(Account {
            command: AccountCommand::Open(args),
        }) => {
            let cmd = OpenAccountCmd::new(args.owner).account_type(args.account_type);
            render(Envelope::from_result(
                engine.open_account(cmd).await,
                "account opened",
            ))?
        }
        Command::Account(Account {
            command: AccountCommand::Show { number },
        }) => render(Envelope::from_result(
            engine.search(&number).await,
            "account found",
        ))?,
        Command::Account(Account {
            command: AccountCommand::List { owner },
        }) => render(Envelope::from_result(
            engine.accounts_by_owner(&owner).await,
            "accounts found",
        ))?,
        Command::Deposit(args) => {
            movement(&engine, args.into_cmd(|n, a| MovementCmd::deposit(n, a))).await?
        }
        Command::Withdraw(args) => {
            movement(&engine, args.into_cmd(|n, a| MovementCmd::withdraw(n, a))).await?
        }
        Command::Lock(args) => movement(&engine, args.into_cmd(|n, a| MovementCmd::lock(n, a))).await?,
        Command::Unlock(args) => {
            movement(&engine, args.into_cmd(|n, a| MovementCmd::unlock(n, a))).await?
        }
        Command::Transactions { number } => render(Envelope::from_result(
            engine.transactions(&number).await,
            "transactions found",
        ))?,
        Command::Transaction { session_id } => render(Envelope::from_result(
            engine.transaction(&session_id).await,
            "transaction found",
        ))?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
