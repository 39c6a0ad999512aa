//! FILENAME: core/table-engine/src/filter/values.rs
//! PURPOSE: Multi-value selection filter on one attribute.
//! CONTEXT: The selection is an ordered set of labeled options. Only the raw
//! values travel in the query description, so restoring a filter from a
//! description needs a reverse lookup to get the labels back. That lookup is
//! asynchronous and may race with a newer restore or a direct user edit:
//! every request is tagged with a sequence number and only the newest one may
//! commit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use query::{QueryDescription, QueryValue};
use serde::{Deserialize, Serialize};

use crate::cell::Observable;
use crate::error::{ConfigError, SourceError};
use crate::filter::pattern::wildcard_match;
use crate::filter::Filter;
use crate::{log_debug, log_warn};

/// Pause before an option search runs, so keystroke bursts collapse.
pub const OPTION_SEARCH_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: QueryValue,
    pub label: String,
}

impl FilterOption {
    pub fn new(value: impl Into<QueryValue>, label: impl Into<String>) -> Self {
        FilterOption {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Option whose label is the raw value itself.
    pub fn raw(value: QueryValue) -> Self {
        let label = value.to_string();
        FilterOption { value, label }
    }
}

/// Remote option provider (e.g. users or issues looked up on a server).
#[async_trait]
pub trait OptionLookup: Send + Sync {
    /// Options whose label matches `text`, at most `limit` of them.
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<FilterOption>, SourceError>;

    /// Resolve raw values back to labeled options. Unknown values may be omitted.
    async fn lookup(&self, values: &[QueryValue]) -> Result<Vec<FilterOption>, SourceError>;
}

#[derive(Clone)]
pub enum OptionSource {
    Static(Vec<FilterOption>),
    Remote(Arc<dyn OptionLookup>),
}

impl std::fmt::Debug for OptionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionSource::Static(options) => f.debug_tuple("Static").field(options).finish(),
            OptionSource::Remote(_) => f.write_str("Remote"),
        }
    }
}

pub struct ValuesFilter {
    name: String,
    source: OptionSource,
    selection: Observable<Vec<FilterOption>>,
    fragment: Observable<QueryDescription>,
    is_set: Observable<bool>,
    /// Bumped by every selection write; a pending lookup only commits if it
    /// still holds the latest ticket.
    write_seq: AtomicU64,
    search_seq: AtomicU64,
    search_debounce: Duration,
}

impl ValuesFilter {
    pub fn new(name: impl Into<String>, source: OptionSource) -> Result<Self, ConfigError> {
        let name = name.into();
        if let OptionSource::Static(options) = &source {
            if options.is_empty() {
                return Err(ConfigError::MissingFilterOptions(name));
            }
        }

        let selection: Observable<Vec<FilterOption>> = Observable::new(Vec::new());
        let key = name.clone();
        let fragment = selection.map(move |selected: &Vec<FilterOption>| {
            if selected.is_empty() {
                QueryDescription::new()
            } else {
                let values: Vec<QueryValue> = selected.iter().map(|o| o.value.clone()).collect();
                QueryDescription::single(key.clone(), QueryValue::List(values))
            }
        });
        let is_set = selection.map(|selected: &Vec<FilterOption>| !selected.is_empty());

        Ok(ValuesFilter {
            name,
            source,
            selection,
            fragment,
            is_set,
            write_seq: AtomicU64::new(0),
            search_seq: AtomicU64::new(0),
            search_debounce: OPTION_SEARCH_DEBOUNCE,
        })
    }

    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }

    pub fn source(&self) -> &OptionSource {
        &self.source
    }

    pub fn selection(&self) -> Vec<FilterOption> {
        self.selection.get()
    }

    pub fn selection_cell(&self) -> &Observable<Vec<FilterOption>> {
        &self.selection
    }

    pub fn selected_values(&self) -> Vec<QueryValue> {
        self.selection
            .with(|s| s.iter().map(|o| o.value.clone()).collect())
    }

    pub fn is_selected(&self, value: &QueryValue) -> bool {
        self.selection.with(|s| s.iter().any(|o| &o.value == value))
    }

    /// Add `option` unless an option with the same value is already selected.
    pub fn select(&self, option: FilterOption) -> bool {
        self.next_ticket();
        self.selection.update(|selected| {
            if !selected.iter().any(|o| o.value == option.value) {
                selected.push(option);
            }
        })
    }

    /// Remove the option with the same value as `option`, if selected.
    pub fn deselect(&self, option: &FilterOption) -> bool {
        self.next_ticket();
        self.selection
            .update(|selected| selected.retain(|o| o.value != option.value))
    }

    /// Replace the whole selection (duplicates by value are dropped).
    pub fn set_selection(&self, options: Vec<FilterOption>) {
        self.next_ticket();
        self.selection.set_if_changed(dedup_by_value(options));
    }

    /// Replace the selection from raw values, resolving their labels through
    /// the option source. Returns `Ok(false)` when a newer write superseded
    /// this one before the lookup finished; the stale result is dropped, and
    /// so is a stale lookup error.
    pub async fn set_raw_values(&self, values: Vec<QueryValue>) -> Result<bool, SourceError> {
        let ticket = self.next_ticket();

        let resolved = if values.is_empty() {
            Ok(Vec::new())
        } else {
            match &self.source {
                OptionSource::Static(options) => Ok(options
                    .iter()
                    .filter(|o| values.contains(&o.value))
                    .cloned()
                    .collect()),
                OptionSource::Remote(lookup) => lookup.lookup(&values).await,
            }
        };

        // A superseded write is dropped whether its lookup succeeded or not.
        if self.write_seq.load(Ordering::SeqCst) != ticket {
            log_debug!(
                "FILTER",
                "dropped stale value lookup for '{}' (ticket {}, ok={})",
                self.name,
                ticket,
                resolved.is_ok()
            );
            return Ok(false);
        }
        let resolved = resolved?;

        // Keep the caller's order; values the source does not know keep
        // their raw form as label.
        let options: Vec<FilterOption> = values
            .into_iter()
            .map(|value| {
                resolved
                    .iter()
                    .find(|o| o.value == value)
                    .cloned()
                    .unwrap_or_else(|| FilterOption::raw(value))
            })
            .collect();

        self.selection.set_if_changed(dedup_by_value(options));
        Ok(true)
    }

    /// Options matching `text`, after a short debounce. Returns `Ok(None)`
    /// when a newer search started in the meantime.
    pub async fn search_options(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Option<Vec<FilterOption>>, SourceError> {
        let ticket = self.search_seq.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.search_debounce).await;
        if self.search_seq.load(Ordering::SeqCst) != ticket {
            return Ok(None);
        }

        let options = match &self.source {
            OptionSource::Static(options) => options
                .iter()
                .filter(|o| wildcard_match(text.trim(), &o.label))
                .take(limit)
                .cloned()
                .collect(),
            OptionSource::Remote(lookup) => match lookup.search(text, limit).await {
                Ok(options) => options,
                Err(e) => {
                    log_warn!("FILTER", "option search for '{}' failed: {}", self.name, e);
                    return Err(e);
                }
            },
        };

        if self.search_seq.load(Ordering::SeqCst) != ticket {
            return Ok(None);
        }
        Ok(Some(options))
    }

    fn next_ticket(&self) -> u64 {
        self.write_seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn dedup_by_value(options: Vec<FilterOption>) -> Vec<FilterOption> {
    let mut out: Vec<FilterOption> = Vec::with_capacity(options.len());
    for option in options {
        if !out.iter().any(|o| o.value == option.value) {
            out.push(option);
        }
    }
    out
}

#[async_trait]
impl Filter for ValuesFilter {
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
        self.next_ticket();
        self.selection.set_if_changed(Vec::new());
    }

    async fn restore(&self, query: &QueryDescription) -> Result<(), SourceError> {
        let values = query.get_list(&self.name).unwrap_or_default();
        self.set_raw_values(values).await.map(|_| ())
    }
}
