use crate::api::Mode;
use crate::args::{CategoryArgs, DeleteExpenseArgs};
use crate::commands::Out;
use crate::model::Amount;
use crate::tracker::ExpenseTracker;
use crate::{Config, Result};

/// Deletes a category, matched case-insensitively, together with its expenses.
pub async fn delete_category(
    config: &Config,
    mode: Mode,
    args: &CategoryArgs,
) -> Result<Out<Vec<String>>> {
    let tracker = ExpenseTracker::open(config, mode).await?;
    tracker.initialize_session().await?;
    tracker.delete_category(args.name()).await?;
    let names: Vec<String> = tracker
        .snapshot()
        .await
        .categories()
        .iter()
        .map(str::to_string)
        .collect();
    Ok(Out::new(
        format!("Deleted category '{}'", args.name().trim()),
        names,
    ))
}

/// Deletes one expense by ID. Returns the new grand total.
pub async fn delete_expense(
    config: &Config,
    mode: Mode,
    args: &DeleteExpenseArgs,
) -> Result<Out<Amount>> {
    let tracker = ExpenseTracker::open(config, mode).await?;
    tracker.delete_expense(args.id()).await?;
    let total = tracker.grand_total().await;
    Ok(Out::new(
        format!(
            "Deleted expense {}, total spending is now {total}",
            args.id().trim()
        ),
        total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_delete_category() {
        let env = TestEnv::new().await;
        env.signed_in_tracker().await;
        let out = delete_category(&env.config(), Mode::Test, &CategoryArgs::new("gas & fuel"))
            .await
            .unwrap();
        let names = out.structure().unwrap();
        assert_eq!(names.len(), 4);
        assert!(!names.iter().any(|n| n == "Gas & Fuel"));
    }

    #[tokio::test]
    async fn test_delete_expense() {
        let env = TestEnv::new().await;
        env.signed_in_tracker().await;
        let out = delete_expense(&env.config(), Mode::Test, &DeleteExpenseArgs::new("5"))
            .await
            .unwrap();
        assert_eq!(
            out.structure().copied(),
            Some(Amount::from_str("231.79").unwrap())
        );
    }

    #[tokio::test]
    async fn test_delete_missing_expense() {
        let env = TestEnv::new().await;
        env.signed_in_tracker().await;
        let err = delete_expense(&env.config(), Mode::Test, &DeleteExpenseArgs::new("99"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Expense not found");
    }
}
