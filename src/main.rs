use clap::Parser;
use expense_sync::args::{Args, Command, Common, DeleteSubcommand, InsertSubcommand};
use expense_sync::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let common = args.common();

    // This allows for running the program without a real expense service. When
    // EXPENSES_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Http.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init => commands::init(common.expenses_home(), common.base_url())
            .await?
            .print(),

        Command::Login(login_args) => commands::login(&load(common).await?, mode, login_args)
            .await?
            .print(),

        Command::Logout => commands::logout(&load(common).await?, mode).await?.print(),

        Command::Status => commands::status(&load(common).await?).await?.print(),

        Command::Show(show_args) => commands::show(&load(common).await?, mode, show_args)
            .await?
            .print(),

        Command::Insert(insert_args) => {
            let config = load(common).await?;
            match insert_args.entity() {
                InsertSubcommand::Category(args) => {
                    commands::insert_category(&config, mode, args)
                        .await?
                        .print()
                }
                InsertSubcommand::Expense(args) => {
                    commands::insert_expense(&config, mode, args)
                        .await?
                        .print()
                }
            }
        }

        Command::Delete(delete_args) => {
            let config = load(common).await?;
            match delete_args.entity() {
                DeleteSubcommand::Category(args) => {
                    commands::delete_category(&config, mode, args)
                        .await?
                        .print()
                }
                DeleteSubcommand::Expense(args) => {
                    commands::delete_expense(&config, mode, args)
                        .await?
                        .print()
                }
            }
        }
    };
    Ok(())
}

/// Loads `config.json` and applies the --base-url override.
async fn load(common: &Common) -> Result<Config> {
    let config = Config::load(common.expenses_home().path()).await?;
    match common.base_url() {
        Some(base_url) => config.with_base_url(base_url),
        None => Ok(config),
    }
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and binary only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
