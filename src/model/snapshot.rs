use crate::model::{same_category, Amount, CategoryMap, Expense};
use serde::Serialize;

/// The in-memory view of one user's data: the canonical categories and every expense, plus the
/// status of the most recent operation. A reload replaces the categories and expenses together.
///
/// All aggregate queries are computed from `expenses` when called.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub(crate) categories: CategoryMap,
    pub(crate) expenses: Vec<Expense>,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
}

/// One row of the dashboard: a category with its expense count and total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub count: usize,
    pub total: Amount,
}

impl Snapshot {
    pub fn new(categories: CategoryMap, expenses: Vec<Expense>) -> Self {
        Self {
            categories,
            expenses,
            loading: false,
            error: None,
        }
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The message of the last failed operation, cleared when the next reload starts.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The expenses filed under `name` (case-insensitive), in the order they were loaded. Each
    /// call returns a fresh iterator.
    pub fn expenses_for_category<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Expense> + 'a {
        self.expenses
            .iter()
            .filter(move |e| same_category(e.category(), name))
    }

    pub fn count_for_category(&self, name: &str) -> usize {
        self.expenses_for_category(name).count()
    }

    /// Zero for a category that is unknown or has no expenses.
    pub fn total_for_category(&self, name: &str) -> Amount {
        self.expenses_for_category(name).map(Expense::amount).sum()
    }

    pub fn grand_total(&self) -> Amount {
        self.expenses.iter().map(Expense::amount).sum()
    }

    /// One summary per known category, in category order.
    pub fn summaries(&self) -> Vec<CategorySummary> {
        self.categories
            .iter()
            .map(|name| CategorySummary {
                name: name.to_string(),
                count: self.count_for_category(name),
                total: self.total_for_category(name),
            })
            .collect()
    }

    /// The summaries of categories that have at least one expense.
    pub fn active_summaries(&self) -> Vec<CategorySummary> {
        self.summaries()
            .into_iter()
            .filter(|s| s.count > 0)
            .collect()
    }
}
