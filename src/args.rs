//! These structs provide the CLI interface for the expenses CLI.

use crate::model::ExpenseDraft;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// expenses: A command-line client for a personal expense-tracking service.
///
/// Sign in with `expenses login`, then add categories and expenses and see where your money went
/// with `expenses show`. Run `expenses init` once first to create the data directory.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and the configuration file.
    ///
    /// The service URL is taken from --base-url (or EXPENSES_BASE_URL) and defaults to
    /// http://localhost:8081.
    Init,
    /// Sign in and store the session.
    Login(LoginArgs),
    /// Sign out and delete the stored session.
    Logout,
    /// Show whether you are signed in.
    Status,
    /// Show totals per category, or the expenses in one category.
    Show(ShowArgs),
    /// Add a category or an expense.
    Insert(InsertArgs),
    /// Delete a category or an expense.
    Delete(DeleteArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration and session are held. Defaults to ~/expenses
    #[arg(long, env = "EXPENSES_HOME", default_value_t = default_expenses_home())]
    expenses_home: DisplayPath,

    /// The URL of the expense service. Overrides the one in config.json.
    #[arg(long, env = "EXPENSES_BASE_URL")]
    base_url: Option<String>,
}

impl Common {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expenses_home(&self) -> &DisplayPath {
        &self.expenses_home
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

/// (Not shown): Args for the `expenses login` command.
#[derive(Debug, Parser, Clone)]
pub struct LoginArgs {
    #[arg(long, short)]
    username: String,

    #[arg(long, short, env = "EXPENSES_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginArgs {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// (Not shown): Args for the `expenses show` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct ShowArgs {
    /// List the expenses in this category instead of the summary.
    #[arg(long, short)]
    category: Option<String>,
}

impl ShowArgs {
    pub fn new(category: Option<String>) -> Self {
        Self { category }
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// (Not shown): Args for the `expenses insert` command.
#[derive(Debug, Parser, Clone)]
pub struct InsertArgs {
    #[command(subcommand)]
    entity: InsertSubcommand,
}

impl InsertArgs {
    pub fn entity(&self) -> &InsertSubcommand {
        &self.entity
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum InsertSubcommand {
    /// Add a category.
    Category(CategoryArgs),
    /// Add an expense.
    Expense(InsertExpenseArgs),
}

/// (Not shown): Names one category.
#[derive(Debug, Parser, Clone)]
pub struct CategoryArgs {
    name: String,
}

impl CategoryArgs {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// (Not shown): Args for `expenses insert expense`.
#[derive(Debug, Parser, Clone)]
pub struct InsertExpenseArgs {
    /// The amount, e.g. 12.50 or $1,200.
    #[arg(long, short)]
    amount: String,

    #[arg(long, short)]
    description: String,

    /// Defaults to the first category.
    #[arg(long, short)]
    category: Option<String>,

    /// YYYY-MM-DD. Defaults to now.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// HH:MM or HH:MM:SS, local time. Only used together with --date; defaults to noon.
    #[arg(long, value_parser = parse_time)]
    time: Option<NaiveTime>,
}

impl InsertExpenseArgs {
    pub fn new(amount: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            description: description.into(),
            category: None,
            date: None,
            time: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate, time: Option<NaiveTime>) -> Self {
        self.date = Some(date);
        self.time = time;
        self
    }

    /// The unvalidated expense these arguments describe.
    pub fn draft(&self) -> ExpenseDraft {
        let mut draft = ExpenseDraft::new(&self.amount, &self.description);
        if let Some(category) = &self.category {
            draft = draft.category(category);
        }
        if let Some(date) = self.date {
            draft = draft.date(date);
        }
        if let Some(time) = self.time {
            draft = draft.time(time);
        }
        draft
    }
}

/// (Not shown): Args for the `expenses delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    #[command(subcommand)]
    entity: DeleteSubcommand,
}

impl DeleteArgs {
    pub fn entity(&self) -> &DeleteSubcommand {
        &self.entity
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum DeleteSubcommand {
    /// Delete a category and the expenses in it.
    Category(CategoryArgs),
    /// Delete an expense.
    Expense(DeleteExpenseArgs),
}

/// (Not shown): Args for `expenses delete expense`.
#[derive(Debug, Parser, Clone)]
pub struct DeleteExpenseArgs {
    /// The expense ID, as shown by `expenses show --category`.
    id: String,
}

impl DeleteExpenseArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| format!("Invalid time '{s}': {e}"))
}

fn default_expenses_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expenses"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expenses-home or EXPENSES_HOME instead of relying on the \
                default directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("expenses")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
