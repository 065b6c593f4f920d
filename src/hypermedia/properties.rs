//! Normalized entity property bags
//!
//! Entity payloads reach the engine flattened to dotted-and-indexed keys:
//! `Items(0).Sku -> "A1"`, `Items(1).Sku -> "B2"`. Indexing is 0-based and
//! reflects repetition order as supplied by the caller; the engine never
//! reorders. Values are `string | null`; a null contributes nothing to a
//! link but keeps the key visible to cardinality scans.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Path-parameter bindings already extracted from the concrete request path.
pub type PathParams = BTreeMap<String, String>;

/// Matches an index suffix such as `(0)` inside a normalized key.
const INDEX_PATTERN: &str = r"\((\d+)\)";

fn index_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(INDEX_PATTERN).expect("valid index pattern"))
}

/// A normalized property bag: dotted-and-indexed keys to optional values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, Option<String>>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key with an optional value.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.insert(key.into(), value);
    }

    /// Insert a key with a concrete value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Some(value.into()));
    }

    /// Non-null value for a key, if present.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.0.iter()
    }

    /// Entries carrying a concrete value, as owned pairs.
    pub fn resolved_entries(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
    }

    /// Merge path parameters into the bag. Entity keys win on collision.
    pub fn with_path_params(mut self, params: &PathParams) -> Self {
        for (k, v) in params {
            self.0.entry(k.clone()).or_insert_with(|| Some(v.clone()));
        }
        self
    }

    /// Strip every `(n)` index suffix from a key: `Items(1).Sku` -> `Items.Sku`.
    pub fn strip_indices(key: &str) -> String {
        index_regex().replace_all(key, "").into_owned()
    }

    /// The value of the last `(n)` suffix in a key, if any.
    pub fn last_index(key: &str) -> Option<usize> {
        index_regex()
            .captures_iter(key)
            .last()
            .and_then(|caps| caps[1].parse().ok())
    }

    /// Keys whose index-stripped form equals the given dotted field name,
    /// ascending by repetition index.
    ///
    /// `matching_fields("Items.Sku")` over `{Items(1).Sku, Items(0).Sku}`
    /// yields `[Items(0).Sku, Items(1).Sku]`.
    pub fn matching_fields(&self, dotted: &str) -> Vec<String> {
        let mut matches: Vec<(Vec<usize>, String)> = self
            .0
            .keys()
            .filter(|key| Self::strip_indices(key) == dotted)
            .map(|key| {
                let indices = index_regex()
                    .captures_iter(key)
                    .filter_map(|caps| caps[1].parse().ok())
                    .collect();
                (indices, key.clone())
            })
            .collect();
        matches.sort();
        matches.into_iter().map(|(_, key)| key).collect()
    }

    /// Highest repetition index among keys matching the dotted field name.
    pub fn max_index(&self, dotted: &str) -> Option<usize> {
        self.matching_fields(dotted)
            .iter()
            .filter_map(|key| Self::last_index(key))
            .max()
    }

    /// Flatten a JSON document into normalized dotted-and-indexed keys.
    ///
    /// Objects nest with dots, arrays index their parent key, scalars
    /// stringify, nulls stay null.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut bag = Self::new();
        flatten_json(value, "", &mut bag);
        bag
    }
}

impl FromIterator<(String, Option<String>)> for PropertyBag {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn flatten_json(value: &serde_json::Value, prefix: &str, bag: &mut PropertyBag) {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let child = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_json(inner, &child, bag);
            }
        }
        Value::Array(items) => {
            for (i, inner) in items.iter().enumerate() {
                flatten_json(inner, &format!("{}({})", prefix, i), bag);
            }
        }
        Value::Null => bag.insert(prefix, None),
        Value::String(s) => bag.insert(prefix, Some(s.clone())),
        other => bag.insert(prefix, Some(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_and_last_index() {
        assert_eq!(PropertyBag::strip_indices("Items(1).Sku"), "Items.Sku");
        assert_eq!(PropertyBag::strip_indices("Order.id"), "Order.id");
        assert_eq!(PropertyBag::last_index("Items(3).Sku"), Some(3));
        assert_eq!(PropertyBag::last_index("Order.id"), None);
    }

    #[test]
    fn test_matching_fields_in_index_order() {
        let mut bag = PropertyBag::new();
        bag.set("Items(10).Sku", "K");
        bag.set("Items(2).Sku", "C");
        bag.set("Items(0).Sku", "A");
        bag.set("Items(0).Qty", "1");

        assert_eq!(
            bag.matching_fields("Items.Sku"),
            vec!["Items(0).Sku", "Items(2).Sku", "Items(10).Sku"]
        );
        assert_eq!(bag.max_index("Items.Sku"), Some(10));
        assert_eq!(bag.max_index("Items.Missing"), None);
    }

    #[test]
    fn test_unindexed_key_matches_itself() {
        let mut bag = PropertyBag::new();
        bag.set("Order.id", "7");
        assert_eq!(bag.matching_fields("Order.id"), vec!["Order.id"]);
    }

    #[test]
    fn test_from_json_flattening() {
        let bag = PropertyBag::from_json(&json!({
            "id": 42,
            "Customer": { "name": "Ada" },
            "Items": [ { "Sku": "A1" }, { "Sku": "B2" } ],
            "Tags": ["x", "y"],
            "note": null,
        }));

        assert_eq!(bag.value("id"), Some("42"));
        assert_eq!(bag.value("Customer.name"), Some("Ada"));
        assert_eq!(bag.value("Items(0).Sku"), Some("A1"));
        assert_eq!(bag.value("Items(1).Sku"), Some("B2"));
        assert_eq!(bag.value("Tags(1)"), Some("y"));
        assert!(bag.contains_key("note"));
        assert_eq!(bag.value("note"), None);
    }

    #[test]
    fn test_with_path_params() {
        let mut bag = PropertyBag::new();
        bag.set("id", "entity-wins");
        let mut params = PathParams::new();
        params.insert("id".to_string(), "path".to_string());
        params.insert("noteId".to_string(), "9".to_string());

        let merged = bag.with_path_params(&params);
        assert_eq!(merged.value("id"), Some("entity-wins"));
        assert_eq!(merged.value("noteId"), Some("9"));
    }
}
