pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod session;
pub mod tracker;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::Config;
pub use error::{ApiError, Error, Result};
pub use tracker::ExpenseTracker;
