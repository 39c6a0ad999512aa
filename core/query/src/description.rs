//! FILENAME: core/query/src/description.rs
//! PURPOSE: The flat key -> value mapping handed to data sources.
//! CONTEXT: Every piece of table state (filters, paging, sort, search, hidden
//! columns) contributes a fragment; the fragments are merged in a fixed order
//! into one description. Keys are kept sorted so two descriptions built from
//! the same state compare and serialize identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::QueryValue;

// ============================================================================
// RESERVED KEYS
// ============================================================================

/// 1-based page number.
pub const PAGE_KEY: &str = "page";
pub const PAGE_SIZE_KEY: &str = "page_size";
pub const SORT_BY_KEY: &str = "sort_by";
pub const SORT_ORDER_KEY: &str = "sort_order";
/// Default key for free-text search.
pub const SEARCH_KEY: &str = "search";
pub const HIDDEN_COLUMNS_KEY: &str = "hidden_columns";

/// Prefix of the key written by an existence filter.
pub const EXISTENCE_PREFIX: &str = "has_";

/// Key an existence filter on `attribute` writes to.
pub fn existence_key(attribute: &str) -> String {
    format!("{}{}", EXISTENCE_PREFIX, attribute)
}

// ============================================================================
// QUERY DESCRIPTION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryDescription {
    entries: BTreeMap<String, QueryValue>,
}

impl QueryDescription {
    pub fn new() -> Self {
        QueryDescription {
            entries: BTreeMap::new(),
        }
    }

    /// Single-entry description, the usual shape of a filter fragment.
    pub fn single(key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        let mut query = QueryDescription::new();
        query.insert(key, value);
        query
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<QueryValue> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(QueryValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(QueryValue::as_int)
    }

    /// Boolean entry. The strings "true"/"false" are accepted as well.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            QueryValue::Bool(b) => Some(*b),
            QueryValue::Text(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Entry as a list; a scalar entry counts as a one-element list.
    pub fn get_list(&self, key: &str) -> Option<Vec<QueryValue>> {
        self.get(key).map(QueryValue::to_list)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into self. Keys present in both take the value from `other`.
    pub fn merge(&mut self, other: &QueryDescription) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Fold fragments left to right; later fragments win on key collisions.
    pub fn merged<'a, I>(fragments: I) -> QueryDescription
    where
        I: IntoIterator<Item = &'a QueryDescription>,
    {
        let mut query = QueryDescription::new();
        for fragment in fragments {
            query.merge(fragment);
        }
        query
    }

    /// Copy of this description without the given keys.
    pub fn without_keys(&self, keys: &[&str]) -> QueryDescription {
        QueryDescription {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<QueryDescription, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for QueryDescription {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        QueryDescription {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
