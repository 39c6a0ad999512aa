//! FILENAME: core/table-engine/src/filter/mod.rs
//! PURPOSE: Column filters.
//! CONTEXT: Three independent primitives (pattern, values, existence) each
//! hold their own state and publish a query fragment plus an "is set" flag.
//! A ColumnFilter bundles whichever primitives one attribute supports and
//! merges their fragments; all present fragments apply together (AND).

pub mod existence;
pub mod pattern;
pub mod values;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use query::QueryDescription;

use crate::cell::Observable;
use crate::error::{ConfigError, SourceError};

pub use existence::ExistenceFilter;
pub use pattern::PatternFilter;
pub use values::{FilterOption, OptionLookup, OptionSource, ValuesFilter};

/// Behaviour shared by every filter, primitive or composite.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Attribute the filter applies to.
    fn name(&self) -> &str;

    /// Query fragment for the current state; `{}` when unset.
    fn fragment(&self) -> &Observable<QueryDescription>;

    fn is_set(&self) -> &Observable<bool>;

    fn clear(&self);

    /// Rehydrate the filter state from a serialized query description.
    async fn restore(&self, query: &QueryDescription) -> Result<(), SourceError>;
}

// ============================================================================
// COMPOSITE FILTER
// ============================================================================

/// Up to one filter of each kind for a single attribute.
pub struct ColumnFilter {
    name: String,
    pattern: Option<Arc<PatternFilter>>,
    values: Option<Arc<ValuesFilter>>,
    existence: Option<Arc<ExistenceFilter>>,
    fragment: Observable<QueryDescription>,
    is_set: Observable<bool>,
}

impl fmt::Debug for ColumnFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnFilter")
            .field("name", &self.name)
            .field("pattern", &self.pattern.is_some())
            .field("values", &self.values.is_some())
            .field("existence", &self.existence.is_some())
            .field("fragment", &self.fragment.get())
            .finish()
    }
}

impl ColumnFilter {
    /// Start a composite for `name`; primitives are added on the builder and
    /// wired together once, in `build()`.
    pub fn builder(name: impl Into<String>) -> ColumnFilterBuilder {
        ColumnFilterBuilder {
            name: name.into(),
            pattern: None,
            values: None,
            existence: None,
        }
    }

    /// Filter with no primitives; its fragment is always empty.
    pub fn none(name: impl Into<String>) -> Self {
        ColumnFilter::new(name, None, None, None)
    }

    pub fn new(
        name: impl Into<String>,
        pattern: Option<PatternFilter>,
        values: Option<ValuesFilter>,
        existence: Option<ExistenceFilter>,
    ) -> Self {
        let name = name.into();
        let pattern = pattern.map(Arc::new);
        let values = values.map(Arc::new);
        let existence = existence.map(Arc::new);

        // Fixed order: pattern, values, existence.
        let mut parts: Vec<Arc<dyn Filter>> = Vec::new();
        if let Some(p) = &pattern {
            parts.push(p.clone());
        }
        if let Some(v) = &values {
            parts.push(v.clone());
        }
        if let Some(e) = &existence {
            parts.push(e.clone());
        }

        let fragments: Vec<Observable<QueryDescription>> =
            parts.iter().map(|p| p.fragment().clone()).collect();
        let flags: Vec<Observable<bool>> = parts.iter().map(|p| p.is_set().clone()).collect();

        let fragment = Observable::combine(&fragments, |fs: &[QueryDescription]| {
            QueryDescription::merged(fs)
        });
        let is_set = Observable::combine(&flags, |fs: &[bool]| fs.iter().any(|f| *f));

        ColumnFilter {
            name,
            pattern,
            values,
            existence,
            fragment,
            is_set,
        }
    }

    pub fn pattern(&self) -> Option<&PatternFilter> {
        self.pattern.as_deref()
    }

    pub fn values(&self) -> Option<&ValuesFilter> {
        self.values.as_deref()
    }

    pub fn existence(&self) -> Option<&ExistenceFilter> {
        self.existence.as_deref()
    }

    /// True if the attribute supports any kind of filtering.
    pub fn is_filterable(&self) -> bool {
        self.pattern.is_some() || self.values.is_some() || self.existence.is_some()
    }
}

/// Collects the primitives of one `ColumnFilter`.
pub struct ColumnFilterBuilder {
    name: String,
    pattern: Option<PatternFilter>,
    values: Option<ValuesFilter>,
    existence: Option<ExistenceFilter>,
}

impl ColumnFilterBuilder {
    pub fn with_pattern(mut self) -> Self {
        self.pattern = Some(PatternFilter::new(self.name.clone()));
        self
    }

    pub fn with_values(mut self, source: OptionSource) -> Result<Self, ConfigError> {
        self.values = Some(ValuesFilter::new(self.name.clone(), source)?);
        Ok(self)
    }

    pub fn with_existence(mut self) -> Self {
        self.existence = Some(ExistenceFilter::new(self.name.clone()));
        self
    }

    pub fn build(self) -> ColumnFilter {
        ColumnFilter::new(self.name, self.pattern, self.values, self.existence)
    }
}

impl From<ColumnFilterBuilder> for ColumnFilter {
    fn from(builder: ColumnFilterBuilder) -> Self {
        builder.build()
    }
}

#[async_trait]
impl Filter for ColumnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fragment(&self) -> &Observable<QueryDescription> {
        &self.fragment
    }

    fn is_set(&self) -> &Observable<bool> {
        &self.is_set
    }

    fn clear(&self) {
        if let Some(p) = &self.pattern {
            p.clear();
        }
        if let Some(v) = &self.values {
            v.clear();
        }
        if let Some(e) = &self.existence {
            e.clear();
        }
    }

    async fn restore(&self, query: &QueryDescription) -> Result<(), SourceError> {
        if let Some(p) = &self.pattern {
            p.restore(query).await?;
        }
        if let Some(v) = &self.values {
            v.restore(query).await?;
        }
        if let Some(e) = &self.existence {
            e.restore(query).await?;
        }
        Ok(())
    }
}
