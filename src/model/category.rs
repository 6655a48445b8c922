use serde::Serialize;
use std::collections::HashMap;

/// The canonical category mapping: one entry per case-insensitive category name, exposed under
/// the first casing that was seen for it. Iteration follows registration order.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CategoryMap {
    names: Vec<String>,
    /// Lowercase name -> position in `names`.
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from display names. Later names that differ only in case from an earlier one
    /// are dropped.
    pub fn from_names<S>(names: impl IntoIterator<Item = S>) -> Self
    where
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for name in names {
            map.resolve_or_register(name.as_ref());
        }
        map
    }

    /// Returns the display casing registered for `name`, if any.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.index
            .get(&lookup_key(name))
            .map(|&ix| self.names[ix].as_str())
    }

    /// Returns the display casing registered for `name`, registering `name` as-is when it is new.
    pub fn resolve_or_register(&mut self, name: &str) -> String {
        let key = lookup_key(name);
        if let Some(&ix) = self.index.get(&key) {
            return self.names[ix].clone();
        }
        self.index.insert(key, self.names.len());
        self.names.push(name.to_string());
        name.to_string()
    }

    /// Adds every name that is not already known. Known names keep their existing casing.
    pub fn merge<S>(&mut self, names: impl IntoIterator<Item = S>)
    where
        S: AsRef<str>,
    {
        for name in names {
            self.resolve_or_register(name.as_ref());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&lookup_key(name))
    }

    pub fn first(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// True when `a` and `b` name the same category.
pub fn same_category(a: &str, b: &str) -> bool {
    a == b || lookup_key(a) == lookup_key(b)
}

fn lookup_key(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_casing_wins() {
        let mut map = CategoryMap::new();
        assert_eq!(map.resolve_or_register("Food"), "Food");
        assert_eq!(map.resolve_or_register("food"), "Food");
        assert_eq!(map.resolve_or_register("FOOD"), "Food");
        assert_eq!(map.len(), 1);
        assert_eq!(map.resolve("fOoD"), Some("Food"));
    }

    #[test]
    fn test_from_names_dedupes_and_keeps_order() {
        let map = CategoryMap::from_names(["Travel", "Food", "travel", "Rent"]);
        let names: Vec<&str> = map.iter().collect();
        assert_eq!(names, vec!["Travel", "Food", "Rent"]);
        assert_eq!(map.first(), Some("Travel"));
    }

    #[test]
    fn test_merge_preserves_existing() {
        let mut map = CategoryMap::from_names(["Food", "Rent"]);
        map.merge(["FOOD", "Gym"]);
        let names: Vec<&str> = map.iter().collect();
        assert_eq!(names, vec!["Food", "Rent", "Gym"]);
    }

    #[test]
    fn test_unknown_category() {
        let map = CategoryMap::from_names(["Food"]);
        assert!(!map.contains("Fuel"));
        assert_eq!(map.resolve("Fuel"), None);
        assert!(CategoryMap::new().first().is_none());
    }

    #[test]
    fn test_same_category() {
        assert!(same_category("Coffee", "cOFFEE"));
        assert!(!same_category("Coffee", "Coffees"));
    }

    #[test]
    fn test_serializes_as_display_names() {
        let map = CategoryMap::from_names(["Food", "food", "Rent"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"["Food","Rent"]"#);
    }
}
