//! FILENAME: core/query/src/value.rs
//! PURPOSE: Primitive values carried by a query description.
//! CONTEXT: Data sources only ever see strings, numbers, booleans and flat
//! arrays of those, so that is all a QueryValue can hold.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value in a query description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Flat array of primitives (nested lists are not part of the contract).
    List(Vec<QueryValue>),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Whole floats and numeric strings are accepted since a
    /// description restored from a URL or JSON may carry either.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            QueryValue::Int(n) => Some(*n),
            QueryValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            QueryValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[QueryValue]> {
        match self {
            QueryValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Values of a list, or the value itself as a one-element list.
    pub fn to_list(&self) -> Vec<QueryValue> {
        match self {
            QueryValue::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Int(n) => write!(f, "{}", n),
            QueryValue::Float(x) => write!(f, "{}", x),
            QueryValue::Text(s) => write!(f, "{}", s),
            QueryValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Bool(b)
    }
}

impl From<i64> for QueryValue {
    fn from(n: i64) -> Self {
        QueryValue::Int(n)
    }
}

/// Counts beyond `i64::MAX` saturate.
impl From<usize> for QueryValue {
    fn from(n: usize) -> Self {
        QueryValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for QueryValue {
    fn from(x: f64) -> Self {
        QueryValue::Float(x)
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Text(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Text(s)
    }
}

impl<V: Into<QueryValue>> From<Vec<V>> for QueryValue {
    fn from(items: Vec<V>) -> Self {
        QueryValue::List(items.into_iter().map(Into::into).collect())
    }
}
