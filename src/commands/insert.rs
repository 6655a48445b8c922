use crate::api::Mode;
use crate::args::{CategoryArgs, InsertExpenseArgs};
use crate::commands::Out;
use crate::model::Amount;
use crate::tracker::ExpenseTracker;
use crate::{Config, Result};

/// Adds a category. Returns the categories as they are after the reload.
pub async fn insert_category(
    config: &Config,
    mode: Mode,
    args: &CategoryArgs,
) -> Result<Out<Vec<String>>> {
    let tracker = ExpenseTracker::open(config, mode).await?;
    tracker.add_category(args.name()).await?;
    let names: Vec<String> = tracker
        .snapshot()
        .await
        .categories()
        .iter()
        .map(str::to_string)
        .collect();
    Ok(Out::new(
        format!("Added category '{}'", args.name().trim()),
        names,
    ))
}

/// Adds an expense. The categories are loaded first so that a missing or differently cased
/// category resolves the same way it would on the dashboard. Returns the new grand total.
pub async fn insert_expense(
    config: &Config,
    mode: Mode,
    args: &InsertExpenseArgs,
) -> Result<Out<Amount>> {
    let tracker = ExpenseTracker::open(config, mode).await?;
    tracker.initialize_session().await?;
    let draft = args.draft();
    tracker.add_expense(&draft).await?;
    let total = tracker.grand_total().await;
    Ok(Out::new(
        format!(
            "Added expense '{}', total spending is now {total}",
            draft.description.trim()
        ),
        total,
    ))
}
