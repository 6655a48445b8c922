//! Wire shapes returned by the expense service, decoded once at the boundary.
//!
//! The service is inconsistent: expenses grouped by category arrive either as an array of
//! `{category | categoryName, expenses}` objects or as an object keyed by category name, under one
//! of two different top-level keys. Categories arrive as an array of names or as an object whose
//! keys are the names. Everything downstream of this module sees one shape only.

use crate::model::Expense;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// The body of `GET /expenses`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensesResponse {
    #[serde(default)]
    category_wise_expenses: Option<ExpensesPayload>,
    #[serde(default)]
    expense_category_wise_list: Option<ExpensesPayload>,
}

impl ExpensesResponse {
    /// The first of the two known keys that is present and non-null wins.
    pub fn into_payload(self) -> ExpensesPayload {
        self.category_wise_expenses
            .or(self.expense_category_wise_list)
            .unwrap_or_default()
    }
}

/// Expenses grouped by category, in either of the two shapes the service produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpensesPayload {
    /// `[{"category": "Food", "expenses": [...]}, ...]`
    List(Vec<CategoryEntry>),
    /// `{"Food": [...], ...}`, in the order the service sent the keys.
    Map(Vec<(String, Vec<Expense>)>),
}

impl Default for ExpensesPayload {
    fn default() -> Self {
        ExpensesPayload::Map(Vec::new())
    }
}

impl ExpensesPayload {
    /// Flattens either shape into `(category name, expenses)` groups. A list entry without any
    /// category name yields `None`.
    pub fn into_groups(self) -> Vec<(Option<String>, Vec<Expense>)> {
        match self {
            ExpensesPayload::List(entries) => entries
                .into_iter()
                .map(|entry| {
                    let name = entry.name().map(str::to_string);
                    (name, entry.expenses.0)
                })
                .collect(),
            ExpensesPayload::Map(groups) => groups
                .into_iter()
                .map(|(name, expenses)| (Some(name), expenses))
                .collect(),
        }
    }
}

impl<'de> Deserialize<'de> for ExpensesPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Array(items) => {
                let entries = items
                    .into_iter()
                    .map(serde_json::from_value::<CategoryEntry>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(D::Error::custom)?;
                Ok(ExpensesPayload::List(entries))
            }
            Value::Object(map) => {
                let groups = map
                    .into_iter()
                    .map(|(name, value)| {
                        let list = ExpenseList::from_value(value);
                        (name, list.0)
                    })
                    .collect();
                Ok(ExpensesPayload::Map(groups))
            }
            Value::Null => Ok(ExpensesPayload::default()),
            other => Err(D::Error::custom(format!(
                "expected an array or object of category expenses, got {other}"
            ))),
        }
    }
}

/// One element of the array-shaped payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEntry {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    category_name: Option<String>,
    #[serde(default)]
    expenses: ExpenseList,
}

impl CategoryEntry {
    /// `category` wins over `categoryName` unless it is empty.
    pub fn name(&self) -> Option<&str> {
        self.category
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.category_name.as_deref().filter(|s| !s.is_empty()))
    }
}

/// A list of expenses that tolerates absence: `null`, a missing key or any non-array value is an
/// empty list. Elements that do not decode as an expense (no amount, a negative amount, not an
/// object) are skipped with a warning, so one bad record does not hide the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseList(Vec<Expense>);

impl ExpenseList {
    fn from_value(value: Value) -> Self {
        let Value::Array(items) = value else {
            return Self::default();
        };
        let expenses = items
            .into_iter()
            .enumerate()
            .filter_map(|(ix, item)| match serde_json::from_value::<Expense>(item) {
                Ok(expense) => Some(expense),
                Err(e) => {
                    warn!("Skipping malformed expense at position {ix}: {e}");
                    None
                }
            })
            .collect();
        Self(expenses)
    }
}

impl<'de> Deserialize<'de> for ExpenseList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ExpenseList::from_value(value))
    }
}

/// The body of `GET /users`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    categories: Option<CategoryNames>,
}

impl UserResponse {
    pub fn into_category_names(self) -> Vec<String> {
        match self.categories {
            Some(CategoryNames::List(names)) => names,
            Some(CategoryNames::Keys(map)) => map.into_iter().map(|(k, _)| k).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CategoryNames {
    List(Vec<String>),
    Keys(serde_json::Map<String, Value>),
}
