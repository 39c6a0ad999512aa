//! FILENAME: core/table-engine/src/field.rs
//! PURPOSE: Pure mapping from an entity to a typed value and its display string.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

// ============================================================================
// FIELD VALUE
// ============================================================================

/// Typed value extracted from an entity for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// True for values that should not count as "this column has data".
    /// `false` and `0` are data, blank text and empty lists are not.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(FieldValue::is_empty),
            _ => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(true) => "Yes".to_string(),
            FieldValue::Bool(false) => "No".to_string(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::List(items) => items
                .iter()
                .filter(|v| !v.is_empty())
                .map(FieldValue::display)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

// ============================================================================
// FIELD
// ============================================================================

type Extractor<T> = Arc<dyn Fn(&T) -> FieldValue + Send + Sync>;
type Formatter<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Describes how one attribute of `T` is read and displayed.
pub struct Field<T> {
    pub name: String,
    pub label: String,
    pub required: bool,
    optional: bool,
    value: Extractor<T>,
    display: Option<Formatter<T>>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Field {
            name: self.name.clone(),
            label: self.label.clone(),
            required: self.required,
            optional: self.optional,
            value: Arc::clone(&self.value),
            display: self.display.clone(),
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .finish()
    }
}

impl<T> Field<T> {
    /// Field with an arbitrary extractor. Not required, therefore optional.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        value: impl Fn(&T) -> FieldValue + Send + Sync + 'static,
    ) -> Self {
        Field {
            name: name.into(),
            label: label.into(),
            required: false,
            optional: true,
            value: Arc::new(value),
            display: None,
        }
    }

    pub fn text(
        name: impl Into<String>,
        label: impl Into<String>,
        get: impl Fn(&T) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Field::new(name, label, move |e| FieldValue::from(get(e)))
    }

    pub fn number(
        name: impl Into<String>,
        label: impl Into<String>,
        get: impl Fn(&T) -> Option<f64> + Send + Sync + 'static,
    ) -> Self {
        Field::new(name, label, move |e| {
            get(e).map(FieldValue::Number).unwrap_or(FieldValue::Null)
        })
    }

    pub fn boolean(
        name: impl Into<String>,
        label: impl Into<String>,
        get: impl Fn(&T) -> Option<bool> + Send + Sync + 'static,
    ) -> Self {
        Field::new(name, label, move |e| {
            get(e).map(FieldValue::Bool).unwrap_or(FieldValue::Null)
        })
    }

    pub fn date(
        name: impl Into<String>,
        label: impl Into<String>,
        get: impl Fn(&T) -> Option<NaiveDate> + Send + Sync + 'static,
    ) -> Self {
        Field::new(name, label, move |e| {
            get(e).map(FieldValue::Date).unwrap_or(FieldValue::Null)
        })
    }

    pub fn list(
        name: impl Into<String>,
        label: impl Into<String>,
        get: impl Fn(&T) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        Field::new(name, label, move |e| {
            FieldValue::List(get(e).into_iter().map(FieldValue::Text).collect())
        })
    }

    /// Required fields are always shown and never optional.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self.optional = !required;
        self
    }

    /// Mark whether the column may be hidden when no data is present.
    /// Ignored for required fields.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional && !self.required;
        self
    }

    pub fn with_display(mut self, display: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.display = Some(Arc::new(display));
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn value(&self, entity: &T) -> FieldValue {
        (self.value)(entity)
    }

    pub fn display(&self, entity: &T) -> String {
        match &self.display {
            Some(display) => display(entity),
            None => self.value(entity).display(),
        }
    }

    /// True if the field holds data for `entity`.
    pub fn has_value(&self, entity: &T) -> bool {
        !self.value(entity).is_empty()
    }
}
