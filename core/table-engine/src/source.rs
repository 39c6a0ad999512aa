//! FILENAME: core/table-engine/src/source.rs
//! PURPOSE: The collaborators a frame talks to, and the identity its rows carry.

use std::fmt;

use async_trait::async_trait;
use query::QueryDescription;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// A row with a stable identity, so cached rows can be updated and removed
/// in place.
pub trait Entity: Clone + PartialEq + Send + Sync + 'static {
    type Id: PartialEq + fmt::Debug + Send + Sync;

    fn id(&self) -> Self::Id;
}

/// Result of one fetch. Paginated sources report the total size of the
/// filtered set; a plain list is its own total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fetched<T> {
    Page { items: Vec<T>, total_count: usize },
    List(Vec<T>),
}

impl<T> Fetched<T> {
    pub fn into_parts(self) -> (Vec<T>, usize) {
        match self {
            Fetched::Page { items, total_count } => (items, total_count),
            Fetched::List(items) => {
                let total = items.len();
                (items, total)
            }
        }
    }
}

/// Loads the rows described by a query description.
#[async_trait]
pub trait DataSource<T: Send>: Send + Sync {
    async fn fetch(&self, query: &QueryDescription) -> Result<Fetched<T>, SourceError>;
}

/// Reports which fields hold a value anywhere in the filtered data set.
#[async_trait]
pub trait FieldDiscovery: Send + Sync {
    async fn present_fields(&self, query: &QueryDescription) -> Result<Vec<String>, SourceError>;
}
