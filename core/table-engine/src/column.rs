//! FILENAME: core/table-engine/src/column.rs
//! PURPOSE: Columns and the ordered, name-unique column set of one table.
//! CONTEXT: A column binds a Field to its ColumnFilter and a visibility flag.
//! The set derives two fragments from all of its columns: the names of the
//! explicitly hidden columns, and the merged filter fragment. Both are
//! deduplicated cells, so a click that does not change either value never
//! reaches the frame.

use std::fmt;

use query::QueryDescription;
use rustc_hash::FxHashMap;

use crate::cell::Observable;
use crate::error::{ConfigError, SourceError, TableError, TableResult};
use crate::field::Field;
use crate::filter::{ColumnFilter, Filter};

// ============================================================================
// COLUMN
// ============================================================================

pub struct Column<T> {
    field: Field<T>,
    filter: ColumnFilter,
    hidden: Observable<bool>,
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.field.name)
            .field("hidden", &self.hidden.get())
            .field("filterable", &self.filter.is_filterable())
            .finish()
    }
}

impl<T> Column<T> {
    /// Column without filters.
    pub fn new(field: Field<T>) -> Self {
        let filter = ColumnFilter::none(field.name.clone());
        Column {
            field,
            filter,
            hidden: Observable::new(false),
        }
    }

    /// Replace the column filter. The filter is keyed by its own name, which
    /// normally equals the column name.
    pub fn with_filter(mut self, filter: impl Into<ColumnFilter>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn hidden_by_default(self) -> Self {
        self.hidden.set(true);
        self
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn label(&self) -> &str {
        &self.field.label
    }

    pub fn field(&self) -> &Field<T> {
        &self.field
    }

    pub fn filter(&self) -> &ColumnFilter {
        &self.filter
    }

    pub fn is_required(&self) -> bool {
        self.field.required
    }

    pub fn is_optional(&self) -> bool {
        self.field.is_optional()
    }

    pub fn hidden(&self) -> &Observable<bool> {
        &self.hidden
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set_if_changed(hidden);
    }

    pub fn hide(&self) {
        self.set_hidden(true);
    }

    pub fn show(&self) {
        self.set_hidden(false);
    }

    /// An explicitly hidden column is never shown. Otherwise a non-optional
    /// column is always shown, and an optional one only when some row has a
    /// value for it or the data source reports the field as present.
    pub fn is_shown(&self, rows: &[T], reported: Option<&[String]>) -> bool {
        if self.is_hidden() {
            return false;
        }
        if !self.is_optional() {
            return true;
        }
        if reported.map_or(false, |names| names.iter().any(|n| n == self.name())) {
            return true;
        }
        rows.iter().any(|row| self.field.has_value(row))
    }
}

// ============================================================================
// COLUMN SET
// ============================================================================

pub struct ColumnSet<T> {
    columns: Vec<Column<T>>,
    index: FxHashMap<String, usize>,
    hidden_names: Observable<Vec<String>>,
    filter_fragment: Observable<QueryDescription>,
    any_filter_set: Observable<bool>,
}

impl<T> fmt::Debug for ColumnSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.columns.iter()).finish()
    }
}

impl<T> ColumnSet<T> {
    /// Fails if two columns share a name.
    pub fn new(columns: Vec<Column<T>>) -> Result<Self, ConfigError> {
        let mut index = FxHashMap::default();
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.name().to_string(), i).is_some() {
                return Err(ConfigError::DuplicateColumn(column.name().to_string()));
            }
        }

        let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
        let hidden_flags: Vec<Observable<bool>> =
            columns.iter().map(|c| c.hidden.clone()).collect();
        let hidden_names = Observable::combine(&hidden_flags, move |flags: &[bool]| {
            names
                .iter()
                .zip(flags)
                .filter(|(_, hidden)| **hidden)
                .map(|(name, _)| name.clone())
                .collect::<Vec<String>>()
        });

        let fragments: Vec<Observable<QueryDescription>> =
            columns.iter().map(|c| c.filter.fragment().clone()).collect();
        let filter_fragment = Observable::combine(&fragments, |fs: &[QueryDescription]| {
            QueryDescription::merged(fs)
        });

        let flags: Vec<Observable<bool>> =
            columns.iter().map(|c| c.filter.is_set().clone()).collect();
        let any_filter_set = Observable::combine(&flags, |fs: &[bool]| fs.iter().any(|f| *f));

        Ok(ColumnSet {
            columns,
            index,
            hidden_names,
            filter_fragment,
            any_filter_set,
        })
    }

    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn column(&self, name: &str) -> TableResult<&Column<T>> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub fn filter(&self, name: &str) -> TableResult<&ColumnFilter> {
        self.column(name).map(Column::filter)
    }

    /// Names of the explicitly hidden columns, in column order.
    pub fn hidden_names(&self) -> &Observable<Vec<String>> {
        &self.hidden_names
    }

    /// All column filter fragments merged.
    pub fn filter_fragment(&self) -> &Observable<QueryDescription> {
        &self.filter_fragment
    }

    pub fn any_filter_set(&self) -> &Observable<bool> {
        &self.any_filter_set
    }

    pub fn clear_all_filters(&self) {
        for column in &self.columns {
            column.filter.clear();
        }
    }

    /// Names of the columns that should be displayed for `rows`.
    pub fn visible_names(&self, rows: &[T], reported: Option<&[String]>) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_shown(rows, reported))
            .map(|c| c.name().to_string())
            .collect()
    }

    pub async fn restore_filters(&self, query: &QueryDescription) -> Result<(), SourceError> {
        for column in &self.columns {
            column.filter.restore(query).await?;
        }
        Ok(())
    }
}
