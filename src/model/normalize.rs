//! Reconciles an `/expenses` payload with the canonical category mapping.

use crate::model::{CategoryMap, Expense, ExpensesPayload};
use tracing::{debug, warn};

/// Keys that some payloads repeat inside each expense. The resolved category replaces them.
const CATEGORY_KEYS: &[&str] = &["category", "categoryName"];

/// The result of normalizing one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Every expense in the payload, in payload order, tagged with its display category name.
    pub expenses: Vec<Expense>,
    /// The display names of the categories that appeared in the payload, in payload order.
    pub found: Vec<String>,
}

/// Flattens `payload` into expenses tagged with canonical category names.
///
/// A category already in `categories` (compared case-insensitively) keeps its existing casing.
/// An unknown category is registered in `categories` under the casing it arrived with, so later
/// groups in the same payload resolve to it as well. Categories missing from the payload stay in
/// `categories`. Groups with no expenses still count as found.
pub fn normalize(payload: ExpensesPayload, categories: &mut CategoryMap) -> Normalized {
    let mut out = Normalized::default();

    for (name, expenses) in payload.into_groups() {
        let Some(name) = name else {
            warn!(
                "Skipping {} expense(s) listed without a category name",
                expenses.len()
            );
            continue;
        };

        let resolved = categories.resolve_or_register(&name);
        if resolved != name {
            debug!("Category '{name}' resolved to '{resolved}'");
        }
        if !out.found.contains(&resolved) {
            out.found.push(resolved.clone());
        }

        out.expenses.extend(expenses.into_iter().map(|mut expense| {
            for key in CATEGORY_KEYS {
                expense.other_fields.remove(*key);
            }
            expense.category = resolved.clone();
            expense
        }));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExpensesResponse;
    use std::str::FromStr;

    fn payload(json: &str) -> ExpensesPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_single_map_entry_with_empty_known_categories() {
        let mut categories = CategoryMap::new();
        let result = normalize(
            payload(r#"{"Food": [{"id": "1", "amount": 12.5, "description": "Lunch"}]}"#),
            &mut categories,
        );

        assert_eq!(result.expenses.len(), 1);
        let expense = &result.expenses[0];
        assert_eq!(expense.id(), "1");
        assert_eq!(expense.category(), "Food");
        assert_eq!(expense.description(), "Lunch");
        assert_eq!(result.found, vec!["Food"]);
        assert_eq!(categories.iter().collect::<Vec<_>>(), vec!["Food"]);
    }

    #[test]
    fn test_both_shapes_normalize_identically() {
        let map = payload(
            r#"{
                "food": [{"id": "1", "amount": 12.5, "description": "Lunch"},
                         {"id": "2", "amount": 3, "description": "Coffee"}],
                "Rent": [{"id": "3", "amount": 900, "description": "March"}],
                "Gym": []
            }"#,
        );
        let list = payload(
            r#"[
                {"category": "food", "expenses": [
                    {"id": "1", "amount": 12.5, "description": "Lunch"},
                    {"id": "2", "amount": 3, "description": "Coffee"}]},
                {"categoryName": "Rent", "expenses": [
                    {"id": "3", "amount": 900, "description": "March"}]},
                {"category": "Gym", "expenses": []}
            ]"#,
        );

        let mut known_a = CategoryMap::from_names(["Food"]);
        let mut known_b = CategoryMap::from_names(["Food"]);
        let a = normalize(map, &mut known_a);
        let b = normalize(list, &mut known_b);

        assert_eq!(a, b);
        assert_eq!(known_a, known_b);
        assert_eq!(a.found, vec!["Food", "Rent", "Gym"]);
        assert!(a.expenses[..2].iter().all(|e| e.category() == "Food"));
    }

    #[test]
    fn test_known_casing_wins_and_nothing_is_duplicated() {
        let mut categories = CategoryMap::from_names(["Food", "Travel"]);
        let result = normalize(
            payload(r#"{"FOOD": [{"id": "1", "amount": 1}], "food": [{"id": "2", "amount": 2}]}"#),
            &mut categories,
        );
        assert_eq!(result.found, vec!["Food"]);
        assert!(result.expenses.iter().all(|e| e.category() == "Food"));
        // Travel was not in the payload but stays known
        assert_eq!(categories.iter().collect::<Vec<_>>(), vec!["Food", "Travel"]);
    }

    #[test]
    fn test_first_seen_casing_within_one_payload() {
        let mut categories = CategoryMap::new();
        let result = normalize(
            payload(r#"[{"category": "coffee", "expenses": [{"id": "1", "amount": 1}]},
                        {"category": "Coffee", "expenses": [{"id": "2", "amount": 1}]}]"#),
            &mut categories,
        );
        assert_eq!(result.found, vec!["coffee"]);
        assert_eq!(result.expenses[1].category(), "coffee");
        assert_eq!(categories.len(), 1);
    }

    #[test]
    fn test_category_fields_inside_expenses_are_replaced() {
        let mut categories = CategoryMap::from_names(["Food"]);
        let result = normalize(
            payload(r#"{"food": [{"id": "1", "amount": 1, "category": "food", "categoryName": "x",
                "note": "kept"}]}"#),
            &mut categories,
        );
        let expense = &result.expenses[0];
        assert_eq!(expense.category(), "Food");
        assert!(!expense.other_fields().contains_key("category"));
        assert!(!expense.other_fields().contains_key("categoryName"));
        assert!(expense.other_fields().contains_key("note"));
    }

    #[test]
    fn test_unnamed_group_is_skipped() {
        let mut categories = CategoryMap::new();
        let result = normalize(
            payload(r#"[{"expenses": [{"id": "1", "amount": 1}]},
                        {"category": "Food", "expenses": [{"id": "2", "amount": 4}]}]"#),
            &mut categories,
        );
        assert_eq!(result.expenses.len(), 1);
        assert_eq!(result.expenses[0].id(), "2");
        assert_eq!(result.found, vec!["Food"]);
    }

    #[test]
    fn test_empty_response() {
        let mut categories = CategoryMap::from_names(["Food"]);
        let response: ExpensesResponse = serde_json::from_str("{}").unwrap();
        let result = normalize(response.into_payload(), &mut categories);
        assert!(result.expenses.is_empty());
        assert!(result.found.is_empty());
        assert_eq!(categories.len(), 1);
    }

    #[test]
    fn test_amounts_survive_normalization() {
        let mut categories = CategoryMap::new();
        let result = normalize(
            payload(r#"{"Food": [{"id": "1", "amount": 0.1}, {"id": "2", "amount": 0.2}]}"#),
            &mut categories,
        );
        let total: rust_decimal::Decimal = result.expenses.iter().map(|e| e.amount().value()).sum();
        assert_eq!(total, rust_decimal::Decimal::from_str("0.3").unwrap());
    }
}
