//! FILENAME: core/table-engine/src/filter/existence.rs
//! PURPOSE: Tri-state "has a value / has no value / don't care" filter.

use async_trait::async_trait;
use query::{existence_key, QueryDescription};

use crate::cell::Observable;
use crate::error::SourceError;
use crate::filter::Filter;

pub struct ExistenceFilter {
    name: String,
    key: String,
    exists: Observable<Option<bool>>,
    fragment: Observable<QueryDescription>,
    is_set: Observable<bool>,
}

impl ExistenceFilter {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = existence_key(&name);
        let exists: Observable<Option<bool>> = Observable::new(None);

        let fragment_key = key.clone();
        let fragment = exists.map(move |state: &Option<bool>| match state {
            Some(flag) => QueryDescription::single(fragment_key.clone(), *flag),
            None => QueryDescription::new(),
        });
        let is_set = exists.map(|state: &Option<bool>| state.is_some());

        ExistenceFilter {
            name,
            key,
            exists,
            fragment,
            is_set,
        }
    }

    /// `Some(true)`: must have a value, `Some(false)`: must be empty, `None`: unset.
    pub fn set(&self, exists: Option<bool>) {
        self.exists.set(exists);
    }

    pub fn exists(&self) -> Option<bool> {
        self.exists.get()
    }

    /// The `has_<attribute>` key this filter writes.
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl Filter for ExistenceFilter {
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
        self.exists.set_if_changed(None);
    }

    async fn restore(&self, query: &QueryDescription) -> Result<(), SourceError> {
        self.exists.set_if_changed(query.get_bool(&self.key));
        Ok(())
    }
}
