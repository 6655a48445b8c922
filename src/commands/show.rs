use crate::api::Mode;
use crate::args::ShowArgs;
use crate::commands::Out;
use crate::model::{Amount, CategorySummary, Expense, Snapshot};
use crate::tracker::ExpenseTracker;
use crate::{Config, Result};
use anyhow::bail;
use serde::Serialize;
use std::fmt::Write;

/// What `expenses show` prints: the per-category summaries, or one category's expenses.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub grand_total: Amount,
    pub categories: Vec<CategorySummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expenses: Vec<Expense>,
}

/// Loads the signed-in user's data and summarizes it. Only categories with expenses are listed.
pub async fn show(config: &Config, mode: Mode, args: &ShowArgs) -> Result<Out<Dashboard>> {
    let tracker = ExpenseTracker::open(config, mode).await?;
    tracker.reload().await?;
    let snapshot = tracker.snapshot().await;
    match args.category() {
        None => Ok(summary(&snapshot)),
        Some(name) => category(&snapshot, name),
    }
}

fn summary(snapshot: &Snapshot) -> Out<Dashboard> {
    let categories = snapshot.active_summaries();
    let grand_total = snapshot.grand_total();
    let width = name_width(categories.iter().map(|c| c.name.as_str()));

    let mut message = String::new();
    if categories.is_empty() {
        message.push_str("No expenses yet\n");
    }
    for c in &categories {
        let _ = writeln!(
            message,
            "{:<width$}  {:>4}  {:>12}",
            c.name,
            c.count,
            c.total.to_string()
        );
    }
    let _ = write!(
        message,
        "{:<width$}  {:>4}  {:>12}",
        "Total",
        snapshot.expenses().len(),
        grand_total.to_string()
    );

    Out::new(
        message,
        Dashboard {
            grand_total,
            categories,
            expenses: Vec::new(),
        },
    )
}

fn category(snapshot: &Snapshot, name: &str) -> Result<Out<Dashboard>> {
    let Some(display) = snapshot.categories().resolve(name) else {
        bail!("There is no category named '{name}'");
    };
    let expenses: Vec<Expense> = snapshot.expenses_for_category(display).cloned().collect();
    let total = snapshot.total_for_category(display);
    let width = name_width(expenses.iter().map(Expense::description));

    let mut message = format!("{display}\n");
    for e in &expenses {
        let date = e
            .timestamp()
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            message,
            "  {:>6}  {:<10}  {:<width$}  {:>12}",
            e.id(),
            date,
            e.description(),
            e.amount().to_string()
        );
    }
    let _ = write!(message, "  {} expenses, {total}", expenses.len());

    Ok(Out::new(
        message,
        Dashboard {
            grand_total: snapshot.grand_total(),
            categories: vec![CategorySummary {
                name: display.to_string(),
                count: expenses.len(),
                total,
            }],
            expenses,
        },
    ))
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|n| n.chars().count()).max().unwrap_or(0).max(5)
}
